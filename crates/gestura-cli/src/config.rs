//! Reads/writes `~/.gestura/config.toml`.

use gestura_runtime::CrossedHandsPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted user configuration stored in `~/.gestura/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the recorded tracking session to replay.
    #[serde(default = "default_replay_script")]
    pub replay_script: String,

    /// Per-topic event bus channel capacity.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// What crossing both hands past the opposite hips does.
    #[serde(default)]
    pub crossed_hands_policy: CrossedHandsPolicy,
}

fn default_replay_script() -> String {
    "replay.json".to_string()
}
fn default_bus_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replay_script: default_replay_script(),
            bus_capacity: default_bus_capacity(),
            crossed_hands_policy: CrossedHandsPolicy::default(),
        }
    }
}

/// Return the path to `~/.gestura/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".gestura").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `GESTURA_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `GESTURA_REPLAY_SCRIPT` | `replay_script` |
/// | `GESTURA_BUS_CAPACITY` | `bus_capacity` |
/// | `GESTURA_CROSSED_HANDS_POLICY` | `crossed_hands_policy` (`end_session` or `shutdown`) |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("GESTURA_REPLAY_SCRIPT") {
        cfg.replay_script = v;
    }
    if let Ok(v) = std::env::var("GESTURA_BUS_CAPACITY")
        && let Ok(capacity) = v.parse::<usize>() {
            cfg.bus_capacity = capacity;
        }
    if let Ok(v) = std::env::var("GESTURA_CROSSED_HANDS_POLICY") {
        match v.as_str() {
            "end_session" => cfg.crossed_hands_policy = CrossedHandsPolicy::EndSession,
            "shutdown" => cfg.crossed_hands_policy = CrossedHandsPolicy::Shutdown,
            _ => {}
        }
    }
}

/// Save the config to disk, creating `~/.gestura/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Restrict the config directory to the owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Write the file with owner-only read/write (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
