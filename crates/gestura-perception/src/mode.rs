//! Gesture mode classifier.
//!
//! A pure function of the active subject's current left-hand, right-hand and
//! left-hip samples.  Evaluated once per frame while a wave session is
//! active; never evaluated for users still searching for a pose or
//! calibrating.

use gestura_types::{GestureMode, JointSample};

/// Classify the current hand/hip geometry into a [`GestureMode`].
///
/// - Both hands above hip level → [`GestureMode::Navigation`].
/// - Left hand below the hip while the right is above it →
///   [`GestureMode::Pointing`].
/// - Anything else → [`GestureMode::None`].
///
/// A sample with zero confidence means the sensor lost the joint on this
/// frame; dropout never classifies, so the result is `None`.
pub fn classify_mode(
    left_hand: &JointSample,
    right_hand: &JointSample,
    left_hip: &JointSample,
) -> GestureMode {
    if !left_hand.confidence.is_usable()
        || !right_hand.confidence.is_usable()
        || !left_hip.confidence.is_usable()
    {
        return GestureMode::None;
    }

    let hip_y = left_hip.position.y;
    let left_raised = left_hand.position.y > hip_y;
    let right_raised = right_hand.position.y > hip_y;

    match (left_raised, right_raised) {
        (true, true) => GestureMode::Navigation,
        (false, true) if left_hand.position.y < hip_y => GestureMode::Pointing,
        _ => GestureMode::None,
    }
}
