use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier the perception provider assigns to a tracked person.
pub type UserId = u32;

/// A position in projected image space, integer-truncated from the
/// provider's floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Point3 {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Truncate a raw floating-point provider position into image space.
    pub fn truncate(x: f32, y: f32, z: f32) -> Self {
        Self {
            x: x as i32,
            y: y as i32,
            z: z as i32,
        }
    }

    /// Euclidean distance from `other` in the XY image plane only; the depth
    /// axis does not contribute.
    pub fn xy_distance(&self, other: &Point3) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }
}

/// Skeleton joints queried from the provider on every frame for every
/// tracked user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointId {
    Head,
    Neck,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftHand,
    RightHand,
    Torso,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftFoot,
    RightFoot,
}

impl JointId {
    /// Every joint refreshed per frame, in query order.
    pub const ALL: [JointId; 15] = [
        JointId::Head,
        JointId::Neck,
        JointId::LeftShoulder,
        JointId::RightShoulder,
        JointId::LeftElbow,
        JointId::RightElbow,
        JointId::LeftHand,
        JointId::RightHand,
        JointId::Torso,
        JointId::LeftHip,
        JointId::RightHip,
        JointId::LeftKnee,
        JointId::RightKnee,
        JointId::LeftFoot,
        JointId::RightFoot,
    ];
}

/// Binary joint confidence.  `Zero` when the raw depth reading at the joint
/// was exactly zero (sensor dropout); `Full` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Zero,
    Full,
}

impl Confidence {
    /// Collapse the provider's raw confidence value to the binary scale.
    pub fn from_raw(raw: f32) -> Self {
        if raw <= 0.0 {
            Confidence::Zero
        } else {
            Confidence::Full
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Confidence::Full)
    }
}

/// One joint observation for one user on the current frame.  Overwritten
/// every frame; no history is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointSample {
    pub joint: JointId,
    pub position: Point3,
    pub confidence: Confidence,
}

/// Gesture mode derived fresh every frame from the active subject's current
/// hand and hip samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureMode {
    /// Both hands raised above hip level.
    Navigation,
    /// Left hand below the hip, right hand above it.
    Pointing,
    /// Anything else, including frames with joint dropout.
    None,
}

/// Depth bucket of a navigation coordinate, relative to the anchored
/// movement space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plane {
    Backward,
    Pov,
    Forward,
}

/// Lateral bucket of a navigation coordinate.  Only meaningful on the
/// [`Plane::Pov`] plane; forced to `Center` elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quadrant {
    UpLeft,
    Up,
    UpRight,
    Left,
    Center,
    Right,
    DownLeft,
    Down,
    DownRight,
}

/// Discrete navigation coordinate: depth plane × lateral quadrant.
/// A value type, recomputed every frame; it has no lifecycle of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub plane: Plane,
    pub quadrant: Quadrant,
}

impl Coordinate {
    pub fn new(plane: Plane, quadrant: Quadrant) -> Self {
        Self { plane, quadrant }
    }
}

/// Outcome the provider reports for a finished calibration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationStatus {
    Ok,
    /// The user deliberately aborted; no retry is attempted.
    ManualAbort,
    /// Any other failure; pose detection or calibration is retried.
    Failed,
}

/// Envelope for everything published on the event bus.  Subscribers receive
/// immutable copies and never gain access to internal gesture state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "gestura-runtime::orchestrator"
    pub source: String,
    pub payload: GestureEvent,
}

/// Everything the gesture core reports to external subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GestureEvent {
    /// Human-readable status or error text.
    Message(String),
    NewUser(UserId),
    LostUser(UserId),
    LookingForPose(UserId),
    Calibrating(UserId),
    UserSteady(UserId),
    UserNotSteady(UserId),
    NavigationSessionStart(UserId),
    NavigationSessionEnd(UserId),
    NavigationGesture(Coordinate),
    PointingCoordinates { user: UserId, x: i32, y: i32, z: i32 },
    /// The active subject crossed both hands past the opposite hips while
    /// the crossed-hands policy asks for a clean shutdown.
    ShutdownRequested(UserId),
}

/// Global error type spanning provider setup, per-frame provider calls and
/// geometry policy failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GestureError {
    #[error("tracking initialization failed: {0}")]
    Init(String),

    #[error("provider call {call} failed: {details}")]
    Provider { call: String, details: String },

    #[error("cannot anchor movement space: hands coincide (span would be zero)")]
    DegenerateAnchor,

    #[error("no sample for joint {joint:?} of user {user}")]
    MissingJoint { user: UserId, joint: JointId },

    #[error("event channel error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_truncates_toward_zero() {
        let p = Point3::truncate(100.9, 250.2, 499.999);
        assert_eq!(p, Point3::new(100, 250, 499));
    }

    #[test]
    fn xy_distance_ignores_depth() {
        let a = Point3::new(0, 0, 0);
        let b = Point3::new(3, 4, 1000);
        assert!((a.xy_distance(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_zero_only_for_depth_dropout() {
        assert_eq!(Confidence::from_raw(0.0), Confidence::Zero);
        assert_eq!(Confidence::from_raw(-1.0), Confidence::Zero);
        assert_eq!(Confidence::from_raw(0.5), Confidence::Full);
        assert!(Confidence::Full.is_usable());
        assert!(!Confidence::Zero.is_usable());
    }

    #[test]
    fn joint_list_covers_all_required_joints() {
        assert_eq!(JointId::ALL.len(), 15);
        assert!(JointId::ALL.contains(&JointId::LeftHand));
        assert!(JointId::ALL.contains(&JointId::RightHip));
    }

    #[test]
    fn gesture_event_roundtrip() {
        let event = Event {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: "gestura-runtime::orchestrator".to_string(),
            payload: GestureEvent::NavigationGesture(Coordinate::new(
                Plane::Pov,
                Quadrant::UpLeft,
            )),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.payload, event.payload);
    }

    #[test]
    fn pointing_payload_roundtrip() {
        let payload = GestureEvent::PointingCoordinates {
            user: 3,
            x: 300,
            y: 260,
            z: 520,
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: GestureEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn gesture_error_display() {
        let err = GestureError::Provider {
            call: "joint_position".to_string(),
            details: "device unplugged".to_string(),
        };
        assert!(err.to_string().contains("joint_position"));

        let err2 = GestureError::MissingJoint {
            user: 7,
            joint: JointId::LeftHip,
        };
        assert!(err2.to_string().contains('7'));
        assert!(GestureError::DegenerateAnchor.to_string().contains("span"));
    }
}
