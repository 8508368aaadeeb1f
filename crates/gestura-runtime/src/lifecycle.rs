//! User lifecycle tracker.
//!
//! Tracks each reported user through
//! `Unseen → LookingForPose → Calibrating → Tracking`, with `Lost` reachable
//! from every state.  Each transition produces exactly one lifecycle event
//! and, where the provider has to act, one [`ProviderRequest`]; no-ops
//! (unknown users, manual aborts) produce neither.
//!
//! The tracker owns the per-user joint maps and the active-subject mark.
//! It performs no I/O of its own – the orchestrator publishes the returned
//! events and forwards the requests, keeping the tracker trivially testable.

use std::collections::HashMap;

use gestura_types::{CalibrationStatus, GestureEvent, JointId, JointSample, UserId};
use tracing::{debug, info};

use crate::provider::ProviderRequest;

/// Per-user position in the calibration pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// The provider has not reported this user (the implicit start state).
    Unseen,
    LookingForPose,
    Calibrating,
    Tracking,
    /// Terminal; the joint map has been discarded.
    Lost,
}

/// State and current joint snapshot of one reported user.
#[derive(Debug)]
pub struct UserRecord {
    pub id: UserId,
    pub state: LifecycleState,
    /// Overwritten every frame while `Tracking`; cleared on `Lost`.
    pub joints: HashMap<JointId, JointSample>,
}

/// The single event (and optional provider request) a transition yields.
#[derive(Debug, PartialEq)]
pub struct Transition {
    pub event: GestureEvent,
    pub request: Option<ProviderRequest>,
}

/// Tracks lifecycle state for every user the provider has reported.
#[derive(Debug, Default)]
pub struct UserLifecycleTracker {
    users: HashMap<UserId, UserRecord>,
    active: Option<UserId>,
}

impl UserLifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single user currently treated as the source of gesture input.
    pub fn active_subject(&self) -> Option<UserId> {
        self.active
    }

    pub fn state_of(&self, id: UserId) -> LifecycleState {
        self.users
            .get(&id)
            .map(|r| r.state)
            .unwrap_or(LifecycleState::Unseen)
    }

    pub fn is_tracking(&self, id: UserId) -> bool {
        self.state_of(id) == LifecycleState::Tracking
    }

    pub fn sample(&self, id: UserId, joint: JointId) -> Option<&JointSample> {
        self.users.get(&id).and_then(|r| r.joints.get(&joint))
    }

    /// Mutable joint map of a `Tracking` user, for the per-frame refresh.
    pub fn joints_mut(&mut self, id: UserId) -> Option<&mut HashMap<JointId, JointSample>> {
        self.users
            .get_mut(&id)
            .filter(|r| r.state == LifecycleState::Tracking)
            .map(|r| &mut r.joints)
    }

    /// Mark `id` as the active subject if it is tracking.  The most recently
    /// steady or calibrated user wins.
    pub fn set_active_if_tracking(&mut self, id: UserId) -> bool {
        if self.is_tracking(id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Provider reported a new user.
    ///
    /// Goes to `LookingForPose` when the provider requires a calibration
    /// pose, otherwise straight to `Calibrating`.
    pub fn on_new_user(&mut self, id: UserId, needs_pose: bool) -> Transition {
        let (state, request) = if needs_pose {
            (LifecycleState::LookingForPose, ProviderRequest::PoseDetection(id))
        } else {
            (LifecycleState::Calibrating, ProviderRequest::Calibration(id))
        };
        debug!(user = id, ?state, "new user");
        self.users.insert(
            id,
            UserRecord {
                id,
                state,
                joints: HashMap::new(),
            },
        );
        Transition {
            event: GestureEvent::NewUser(id),
            request: Some(request),
        }
    }

    /// Provider detected the calibration pose; move on to calibration.
    pub fn on_pose_detected(&mut self, id: UserId) -> Option<Transition> {
        let record = self.users.get_mut(&id)?;
        if record.state != LifecycleState::LookingForPose {
            return None;
        }
        record.state = LifecycleState::Calibrating;
        debug!(user = id, "pose detected; calibrating");
        Some(Transition {
            event: GestureEvent::Calibrating(id),
            request: Some(ProviderRequest::Calibration(id)),
        })
    }

    /// Provider finished a calibration attempt.
    ///
    /// `Ok` allocates the joint map, enters `Tracking` and marks this user
    /// as the active subject.  `ManualAbort` is a no-op.  Any other failure
    /// retries pose detection or calibration per the same rule as
    /// [`on_new_user`][Self::on_new_user].
    pub fn on_calibration_complete(
        &mut self,
        id: UserId,
        status: CalibrationStatus,
        needs_pose: bool,
    ) -> Option<Transition> {
        let record = self.users.get_mut(&id)?;
        match status {
            CalibrationStatus::Ok => {
                record.state = LifecycleState::Tracking;
                record.joints = HashMap::new();
                self.active = Some(id);
                info!(user = id, "calibration complete; tracking");
                Some(Transition {
                    event: GestureEvent::Message(format!("tracking user {id}")),
                    request: None,
                })
            }
            CalibrationStatus::ManualAbort => None,
            CalibrationStatus::Failed => {
                if needs_pose {
                    record.state = LifecycleState::LookingForPose;
                    debug!(user = id, "calibration failed; retrying pose detection");
                    Some(Transition {
                        event: GestureEvent::LookingForPose(id),
                        request: Some(ProviderRequest::PoseDetection(id)),
                    })
                } else {
                    record.state = LifecycleState::Calibrating;
                    debug!(user = id, "calibration failed; retrying calibration");
                    Some(Transition {
                        event: GestureEvent::Calibrating(id),
                        request: Some(ProviderRequest::Calibration(id)),
                    })
                }
            }
        }
    }

    /// Provider lost the user.  Discards the joint map; the record stays
    /// terminal at `Lost` until the provider reports the id again.
    pub fn on_lost_user(&mut self, id: UserId) -> Option<Transition> {
        let record = self.users.get_mut(&id)?;
        if record.state == LifecycleState::Lost {
            return None;
        }
        record.state = LifecycleState::Lost;
        record.joints = HashMap::new();
        if self.active == Some(id) {
            self.active = None;
        }
        info!(user = id, "user lost");
        Some(Transition {
            event: GestureEvent::LostUser(id),
            request: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gestura_types::{Confidence, Point3};

    fn calibrated_tracker(id: UserId) -> UserLifecycleTracker {
        let mut tracker = UserLifecycleTracker::new();
        tracker.on_new_user(id, true);
        tracker.on_pose_detected(id);
        tracker.on_calibration_complete(id, CalibrationStatus::Ok, true);
        tracker
    }

    #[test]
    fn new_user_with_pose_requirement_looks_for_pose() {
        let mut tracker = UserLifecycleTracker::new();
        let t = tracker.on_new_user(1, true);
        assert_eq!(t.event, GestureEvent::NewUser(1));
        assert_eq!(t.request, Some(ProviderRequest::PoseDetection(1)));
        assert_eq!(tracker.state_of(1), LifecycleState::LookingForPose);
    }

    #[test]
    fn new_user_without_pose_requirement_calibrates_directly() {
        let mut tracker = UserLifecycleTracker::new();
        let t = tracker.on_new_user(1, false);
        assert_eq!(t.event, GestureEvent::NewUser(1));
        assert_eq!(t.request, Some(ProviderRequest::Calibration(1)));
        assert_eq!(tracker.state_of(1), LifecycleState::Calibrating);
    }

    #[test]
    fn pose_detected_requests_calibration() {
        let mut tracker = UserLifecycleTracker::new();
        tracker.on_new_user(1, true);
        let t = tracker.on_pose_detected(1).expect("transition");
        assert_eq!(t.event, GestureEvent::Calibrating(1));
        assert_eq!(t.request, Some(ProviderRequest::Calibration(1)));
        assert_eq!(tracker.state_of(1), LifecycleState::Calibrating);
    }

    #[test]
    fn pose_detected_for_unknown_or_calibrating_user_is_a_noop() {
        let mut tracker = UserLifecycleTracker::new();
        assert!(tracker.on_pose_detected(7).is_none());

        tracker.on_new_user(1, false); // already Calibrating
        assert!(tracker.on_pose_detected(1).is_none());
    }

    #[test]
    fn calibration_ok_starts_tracking_and_marks_active() {
        // Scenario D: Unseen → LookingForPose → Calibrating → Tracking.
        let tracker = calibrated_tracker(1);
        assert_eq!(tracker.state_of(1), LifecycleState::Tracking);
        assert_eq!(tracker.active_subject(), Some(1));
    }

    #[test]
    fn calibration_ok_emits_one_message_and_allocates_joints() {
        let mut tracker = UserLifecycleTracker::new();
        tracker.on_new_user(1, false);
        let t = tracker
            .on_calibration_complete(1, CalibrationStatus::Ok, false)
            .expect("transition");
        assert!(matches!(t.event, GestureEvent::Message(_)));
        assert!(t.request.is_none());
        assert!(tracker.joints_mut(1).is_some());
    }

    #[test]
    fn manual_abort_is_a_noop() {
        let mut tracker = UserLifecycleTracker::new();
        tracker.on_new_user(1, false);
        let t = tracker.on_calibration_complete(1, CalibrationStatus::ManualAbort, false);
        assert!(t.is_none());
        assert_eq!(tracker.state_of(1), LifecycleState::Calibrating);
    }

    #[test]
    fn calibration_failure_retries_per_pose_rule() {
        let mut tracker = UserLifecycleTracker::new();
        tracker.on_new_user(1, true);
        tracker.on_pose_detected(1);
        let t = tracker
            .on_calibration_complete(1, CalibrationStatus::Failed, true)
            .expect("transition");
        assert_eq!(t.event, GestureEvent::LookingForPose(1));
        assert_eq!(t.request, Some(ProviderRequest::PoseDetection(1)));
        assert_eq!(tracker.state_of(1), LifecycleState::LookingForPose);

        let mut tracker = UserLifecycleTracker::new();
        tracker.on_new_user(2, false);
        let t = tracker
            .on_calibration_complete(2, CalibrationStatus::Failed, false)
            .expect("transition");
        assert_eq!(t.event, GestureEvent::Calibrating(2));
        assert_eq!(t.request, Some(ProviderRequest::Calibration(2)));
    }

    #[test]
    fn lost_user_discards_joints_and_clears_active() {
        let mut tracker = calibrated_tracker(1);
        tracker.joints_mut(1).unwrap().insert(
            JointId::LeftHand,
            JointSample {
                joint: JointId::LeftHand,
                position: Point3::new(1, 2, 3),
                confidence: Confidence::Full,
            },
        );

        let t = tracker.on_lost_user(1).expect("transition");
        assert_eq!(t.event, GestureEvent::LostUser(1));
        assert_eq!(tracker.state_of(1), LifecycleState::Lost);
        assert_eq!(tracker.active_subject(), None);
        assert!(tracker.sample(1, JointId::LeftHand).is_none());
        // Lost is terminal – a second report is a no-op.
        assert!(tracker.on_lost_user(1).is_none());
    }

    #[test]
    fn losing_an_inactive_user_keeps_the_active_subject() {
        let mut tracker = calibrated_tracker(1);
        tracker.on_new_user(2, true);
        tracker.on_lost_user(2);
        assert_eq!(tracker.active_subject(), Some(1));
    }

    #[test]
    fn most_recently_calibrated_user_wins_active() {
        let mut tracker = calibrated_tracker(1);
        tracker.on_new_user(2, false);
        tracker.on_calibration_complete(2, CalibrationStatus::Ok, false);
        assert_eq!(tracker.active_subject(), Some(2));

        // A steady report from the older user takes it back.
        assert!(tracker.set_active_if_tracking(1));
        assert_eq!(tracker.active_subject(), Some(1));
    }

    #[test]
    fn set_active_rejects_non_tracking_users() {
        let mut tracker = UserLifecycleTracker::new();
        tracker.on_new_user(1, true);
        assert!(!tracker.set_active_if_tracking(1));
        assert_eq!(tracker.active_subject(), None);
    }

    #[test]
    fn joints_mut_only_for_tracking_users() {
        let mut tracker = UserLifecycleTracker::new();
        tracker.on_new_user(1, true);
        assert!(tracker.joints_mut(1).is_none());
    }

    #[test]
    fn reappearing_user_restarts_the_pipeline() {
        let mut tracker = calibrated_tracker(1);
        tracker.on_lost_user(1);
        let t = tracker.on_new_user(1, true);
        assert_eq!(t.event, GestureEvent::NewUser(1));
        assert_eq!(tracker.state_of(1), LifecycleState::LookingForPose);
    }
}
