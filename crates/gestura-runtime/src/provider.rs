//! Perception provider contract.
//!
//! Depth acquisition, skeletal tracking, pose-based calibration and the
//! wave-to-start/steady classifiers live in an external provider this core
//! never reimplements.  [`TrackingProvider`] is their boundary.
//!
//! The provider's own concurrency contract is untrusted: its lifecycle and
//! posture callbacks may fire on arbitrary execution contexts.  They
//! therefore never touch gesture state directly – the provider queues them
//! internally and the poll worker collects the queue once per frame via
//! [`TrackingProvider::drain_callbacks`], keeping every state mutation on a
//! single writer.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use gestura_types::{
    CalibrationStatus, Confidence, GestureError, JointId, JointSample, Point3, UserId,
};
use serde::{Deserialize, Serialize};

/// Result of blocking on the next sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// A new frame is available; joint queries now reflect it.
    Ready,
    /// The provider has no further frames; the loop shuts down cleanly.
    EndOfStream,
}

/// Lifecycle and posture callbacks, delivered to the poll worker in the
/// order the provider observed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderCallback {
    NewUser(UserId),
    LostUser(UserId),
    PoseDetected(UserId),
    CalibrationComplete(UserId, CalibrationStatus),
    SessionStart,
    SessionEnd,
    Steady(UserId),
    NotSteady(UserId),
}

/// Requests the core sends back to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRequest {
    PoseDetection(UserId),
    Calibration(UserId),
}

/// Abstract contract of the perception provider.
///
/// `wait_for_frame` is the poll loop's only suspension point; every other
/// method is synchronous and reads the frame made current by the last
/// `Ready` result.
#[async_trait]
pub trait TrackingProvider: Send {
    /// Block until the provider reports the next frame.
    ///
    /// # Errors
    ///
    /// Any error here is fatal for the poll loop (reported once, no retry).
    async fn wait_for_frame(&mut self) -> Result<FrameStatus, GestureError>;

    /// Collect all callbacks queued since the previous drain.
    fn drain_callbacks(&mut self) -> Vec<ProviderCallback>;

    /// Users the provider reports on the current frame.
    fn user_ids(&self) -> Vec<UserId>;

    fn is_tracking(&self, user: UserId) -> bool;

    fn is_calibrating(&self, user: UserId) -> bool;

    /// Current projected position and confidence of one joint.
    fn joint_position(&self, user: UserId, joint: JointId) -> Result<JointSample, GestureError>;

    /// Whether new users must strike a calibration pose before calibrating.
    fn requires_calibration_pose(&self) -> bool;

    fn start_pose_detection(&mut self, user: UserId);

    fn request_calibration(&mut self, user: UserId);
}

// ---------------------------------------------------------------------------
// Replay provider
// ---------------------------------------------------------------------------

/// One user's snapshot within a replay frame.
///
/// Joints map to `[x, y, z, confidence]` in raw provider coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayUser {
    pub id: UserId,
    #[serde(default)]
    pub tracking: bool,
    #[serde(default)]
    pub calibrating: bool,
    #[serde(default)]
    pub joints: HashMap<JointId, [f32; 4]>,
}

/// One recorded sensor frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayFrame {
    #[serde(default)]
    pub callbacks: Vec<ProviderCallback>,
    #[serde(default)]
    pub users: Vec<ReplayUser>,
}

/// A recorded tracking session: the provider behaviour flags plus the frame
/// sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Whether this provider profile requires a calibration pose.
    #[serde(default)]
    pub needs_pose: bool,
    /// Fail `wait_for_frame` when this zero-based frame index is reached,
    /// simulating a structural provider error.
    #[serde(default)]
    pub fail_at_frame: Option<usize>,
    #[serde(default)]
    pub frames: Vec<ReplayFrame>,
}

/// [`TrackingProvider`] backed by a [`ReplayScript`].
///
/// Drives the full contract from recorded data; used by the orchestrator
/// tests and the demo client.
#[derive(Debug)]
pub struct ReplayProvider {
    script: ReplayScript,
    /// Index of the next frame to serve.
    cursor: usize,
    pending: Vec<ProviderCallback>,
    requests: Vec<ProviderRequest>,
}

impl ReplayProvider {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            script,
            cursor: 0,
            pending: Vec::new(),
            requests: Vec::new(),
        }
    }

    /// Load a JSON script from disk.
    ///
    /// # Errors
    ///
    /// [`GestureError::Init`] when the file is missing or not a valid
    /// script – the fatal-initialization path of the core.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GestureError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            GestureError::Init(format!("cannot read replay script {}: {e}", path.display()))
        })?;
        let script: ReplayScript = serde_json::from_str(&raw).map_err(|e| {
            GestureError::Init(format!("invalid replay script {}: {e}", path.display()))
        })?;
        Ok(Self::new(script))
    }

    /// Pose-detection and calibration requests the core has issued so far.
    pub fn requests(&self) -> &[ProviderRequest] {
        &self.requests
    }

    /// The frame made current by the last `Ready` result, if any.
    fn current_frame(&self) -> Option<&ReplayFrame> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.script.frames.get(i))
    }

    fn user(&self, id: UserId) -> Option<&ReplayUser> {
        self.current_frame()
            .and_then(|f| f.users.iter().find(|u| u.id == id))
    }
}

#[async_trait]
impl TrackingProvider for ReplayProvider {
    async fn wait_for_frame(&mut self) -> Result<FrameStatus, GestureError> {
        if self.script.fail_at_frame == Some(self.cursor) {
            return Err(GestureError::Provider {
                call: "wait_for_frame".to_string(),
                details: "scripted provider failure".to_string(),
            });
        }
        match self.script.frames.get(self.cursor) {
            Some(frame) => {
                self.pending = frame.callbacks.clone();
                self.cursor += 1;
                Ok(FrameStatus::Ready)
            }
            None => Ok(FrameStatus::EndOfStream),
        }
    }

    fn drain_callbacks(&mut self) -> Vec<ProviderCallback> {
        std::mem::take(&mut self.pending)
    }

    fn user_ids(&self) -> Vec<UserId> {
        self.current_frame()
            .map(|f| f.users.iter().map(|u| u.id).collect())
            .unwrap_or_default()
    }

    fn is_tracking(&self, user: UserId) -> bool {
        self.user(user).is_some_and(|u| u.tracking)
    }

    fn is_calibrating(&self, user: UserId) -> bool {
        self.user(user).is_some_and(|u| u.calibrating)
    }

    fn joint_position(&self, user: UserId, joint: JointId) -> Result<JointSample, GestureError> {
        let record = self.user(user).ok_or_else(|| GestureError::Provider {
            call: "joint_position".to_string(),
            details: format!("user {user} is not present on the current frame"),
        })?;
        let [x, y, z, confidence] = *record
            .joints
            .get(&joint)
            .ok_or(GestureError::MissingJoint { user, joint })?;
        Ok(JointSample {
            joint,
            position: Point3::truncate(x, y, z),
            confidence: Confidence::from_raw(confidence),
        })
    }

    fn requires_calibration_pose(&self) -> bool {
        self.script.needs_pose
    }

    fn start_pose_detection(&mut self, user: UserId) {
        self.requests.push(ProviderRequest::PoseDetection(user));
    }

    fn request_calibration(&mut self, user: UserId) {
        self.requests.push(ProviderRequest::Calibration(user));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_user_script() -> ReplayScript {
        let mut joints = HashMap::new();
        joints.insert(JointId::LeftHand, [100.9, 250.0, 500.0, 1.0]);
        joints.insert(JointId::RightHand, [300.0, 260.0, 520.0, 0.0]);
        ReplayScript {
            needs_pose: true,
            fail_at_frame: None,
            frames: vec![ReplayFrame {
                callbacks: vec![ProviderCallback::NewUser(1)],
                users: vec![ReplayUser {
                    id: 1,
                    tracking: true,
                    calibrating: false,
                    joints,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn frames_are_served_in_order_then_end_of_stream() {
        let mut provider = ReplayProvider::new(one_user_script());
        assert_eq!(provider.wait_for_frame().await.unwrap(), FrameStatus::Ready);
        assert_eq!(
            provider.wait_for_frame().await.unwrap(),
            FrameStatus::EndOfStream
        );
    }

    #[tokio::test]
    async fn callbacks_drain_once() {
        let mut provider = ReplayProvider::new(one_user_script());
        provider.wait_for_frame().await.unwrap();
        assert_eq!(
            provider.drain_callbacks(),
            vec![ProviderCallback::NewUser(1)]
        );
        assert!(provider.drain_callbacks().is_empty());
    }

    #[tokio::test]
    async fn joint_position_truncates_and_maps_confidence() {
        let mut provider = ReplayProvider::new(one_user_script());
        provider.wait_for_frame().await.unwrap();

        let left = provider.joint_position(1, JointId::LeftHand).unwrap();
        assert_eq!(left.position, Point3::new(100, 250, 500));
        assert_eq!(left.confidence, Confidence::Full);

        // Zero raw confidence marks a depth dropout.
        let right = provider.joint_position(1, JointId::RightHand).unwrap();
        assert_eq!(right.confidence, Confidence::Zero);
    }

    #[tokio::test]
    async fn missing_joint_is_reported() {
        let mut provider = ReplayProvider::new(one_user_script());
        provider.wait_for_frame().await.unwrap();
        let result = provider.joint_position(1, JointId::LeftFoot);
        assert_eq!(
            result,
            Err(GestureError::MissingJoint {
                user: 1,
                joint: JointId::LeftFoot
            })
        );
    }

    #[tokio::test]
    async fn queries_before_first_frame_see_nothing() {
        let provider = ReplayProvider::new(one_user_script());
        assert!(provider.user_ids().is_empty());
        assert!(!provider.is_tracking(1));
        assert!(!provider.is_calibrating(1));
    }

    #[tokio::test]
    async fn calibration_flag_follows_the_current_frame() {
        let mut script = one_user_script();
        script.frames[0].users[0].tracking = false;
        script.frames[0].users[0].calibrating = true;
        script.frames.push(ReplayFrame {
            callbacks: vec![],
            users: vec![ReplayUser {
                id: 1,
                tracking: true,
                calibrating: false,
                joints: HashMap::new(),
            }],
        });
        let mut provider = ReplayProvider::new(script);

        provider.wait_for_frame().await.unwrap();
        assert!(provider.is_calibrating(1));
        assert!(!provider.is_tracking(1));
        // Unreported users never calibrate.
        assert!(!provider.is_calibrating(2));

        // The next frame flips the user to tracking.
        provider.wait_for_frame().await.unwrap();
        assert!(!provider.is_calibrating(1));
        assert!(provider.is_tracking(1));
    }

    #[tokio::test]
    async fn scripted_failure_surfaces_as_provider_error() {
        let mut script = one_user_script();
        script.fail_at_frame = Some(0);
        let mut provider = ReplayProvider::new(script);
        let result = provider.wait_for_frame().await;
        assert!(matches!(result, Err(GestureError::Provider { .. })));
    }

    #[test]
    fn requests_are_recorded_in_order() {
        let mut provider = ReplayProvider::new(one_user_script());
        provider.start_pose_detection(1);
        provider.request_calibration(1);
        assert_eq!(
            provider.requests(),
            &[
                ProviderRequest::PoseDetection(1),
                ProviderRequest::Calibration(1)
            ]
        );
    }

    #[test]
    fn script_roundtrips_through_json() {
        let script = one_user_script();
        let json = serde_json::to_string(&script).unwrap();
        let back: ReplayScript = serde_json::from_str(&json).unwrap();
        assert_eq!(back.frames.len(), 1);
        assert_eq!(back.frames[0].users[0].id, 1);
        assert!(back.needs_pose);
    }

    #[test]
    fn from_path_reports_fatal_init_errors() {
        let result = ReplayProvider::from_path("/nonexistent/replay.json");
        assert!(matches!(result, Err(GestureError::Init(_))));

        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").expect("write");
        let result = ReplayProvider::from_path(&path);
        assert!(matches!(result, Err(GestureError::Init(_))));
    }
}
