//! `gestura-cli` – gesture pipeline demo client
//!
//! This binary replays a recorded tracking session through the full gesture
//! pipeline.  It:
//!
//! 1. Checks for `~/.gestura/config.toml`; writes the defaults when the file
//!    is absent.
//! 2. Loads the configured replay script (a fatal error when missing or
//!    malformed).
//! 3. Subscribes to all three event-bus topics and prints every published
//!    event with per-topic colouring.
//! 4. Intercepts **Ctrl-C** to raise the stop flag; the in-flight frame
//!    completes before the loop exits.

mod config;

use std::sync::atomic::Ordering;
use std::time::Duration;

use colored::Colorize;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use gestura_middleware::{EventBus, Topic, TopicReceiver};
use gestura_runtime::{
    OrchestratorConfig, ReplayProvider, SessionOrchestrator, init_tracing,
};
use gestura_types::{Event, GestureEvent};

fn main() {
    // Structured logging first; the Tokio runtime is created afterwards so
    // the simple OTLP exporter stays safe to initialise.
    let _guard = init_tracing("gestura");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── Replay script ─────────────────────────────────────────────────────
    // A missing or malformed script is the fatal-initialization path: report
    // once and exit, never a panic.
    let provider = match ReplayProvider::from_path(&cfg.replay_script) {
        Ok(provider) => {
            println!("  Replaying {}", cfg.replay_script.bold());
            provider
        }
        Err(e) => {
            println!("{}: {}", "Fatal".red().bold(), e);
            std::process::exit(1);
        }
    };

    // ── Event bus and subscribers ─────────────────────────────────────────
    let bus = EventBus::new(cfg.bus_capacity);
    let lifecycle = bus.subscribe_to(Topic::Lifecycle);
    let gesture = bus.subscribe_to(Topic::Gesture);
    let status = bus.subscribe_to(Topic::Status);

    let mut orchestrator = SessionOrchestrator::new(
        provider,
        bus,
        OrchestratorConfig {
            crossed_hands_policy: cfg.crossed_hands_policy,
        },
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let stop = orchestrator.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping after this frame …".yellow().bold());
        stop.store(true, Ordering::Release);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    println!();
    println!("  {} to start a gesture session.", "'Wave'".bold().cyan());
    println!();

    // ── Poll loop ─────────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            println!("{}: {}", "Fatal".red().bold(), e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        tokio::spawn(print_topic(lifecycle));
        tokio::spawn(print_topic(gesture));
        tokio::spawn(print_topic(status));

        let result = orchestrator.run().await;
        // Let the printer tasks drain what is still buffered.
        tokio::time::sleep(Duration::from_millis(50)).await;
        result
    });

    match result {
        Ok(()) => {
            println!();
            println!("  {} Session replay finished.", "✓".green().bold());
        }
        Err(e) => {
            println!();
            println!("{}: {}", "Tracking fault".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Print every event arriving on one topic until the bus shuts down.
async fn print_topic(mut rx: TopicReceiver) {
    loop {
        match rx.recv().await {
            Ok(event) => println!("{}", render(&event)),
            Err(RecvError::Lagged(n)) => {
                warn!(topic = ?rx.topic(), dropped = n, "subscriber lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// One coloured line per event.
fn render(event: &Event) -> String {
    let stamp = event.timestamp.format("%H:%M:%S%.3f");
    let text = match &event.payload {
        GestureEvent::NewUser(id) => format!("new user {id}").cyan(),
        GestureEvent::LostUser(id) => format!("lost user {id}").cyan(),
        GestureEvent::LookingForPose(id) => format!("user {id}: looking for pose").cyan().dimmed(),
        GestureEvent::Calibrating(id) => format!("user {id}: calibrating").cyan().dimmed(),
        GestureEvent::UserSteady(id) => format!("user {id}: steady").blue(),
        GestureEvent::UserNotSteady(id) => format!("user {id}: moving").blue().dimmed(),
        GestureEvent::NavigationSessionStart(id) => {
            format!("user {id}: navigation session started").green().bold()
        }
        GestureEvent::NavigationSessionEnd(id) => {
            format!("user {id}: navigation session ended").green().bold()
        }
        GestureEvent::NavigationGesture(c) => {
            format!("navigation {:?}/{:?}", c.plane, c.quadrant).green()
        }
        GestureEvent::PointingCoordinates { user, x, y, z } => {
            format!("user {user}: pointing at ({x}, {y}, {z})").magenta()
        }
        GestureEvent::ShutdownRequested(id) => {
            format!("user {id}: shutdown requested").red().bold()
        }
        GestureEvent::Message(m) => m.to_string().dimmed(),
    };
    format!("  [{stamp}] {text}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____         _                  "#.bold().cyan());
    println!("{}", r#"  / ___/__ ___ / /___ _________ _  "#.bold().cyan());
    println!("{}", r#" / (_ / -_|_-</ __/ // / __/ _ `/  "#.bold().cyan());
    println!("{}", r#" \___/\__/___/\__/\_,_/_/  \_,_/   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "gestura".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Skeletal gesture protocol core");
    println!();
}
