//! Session orchestrator – the per-frame poll loop.
//!
//! One dedicated worker drives the whole gesture pipeline.  Each tick:
//!
//! 1. **Wait** – block on the provider for the next sensor frame (the only
//!    suspension point).
//! 2. **Apply** – drain the provider's serialized callback queue and run the
//!    lifecycle/posture transitions; every transition publishes exactly one
//!    event.
//! 3. **Refresh** – overwrite the joint snapshot of every tracking user;
//!    notify for users still searching for a pose or calibrating.
//! 4. **Classify** – while the wave session is active, recompute the gesture
//!    mode of the active subject; leaving navigation discards the movement
//!    space.
//! 5. **Anchor / read** – a posture that just steadied anchors a new
//!    [`MovementSpace`] (navigation) or discards the existing one (any other
//!    mode); every navigation frame with a space emits a coordinate, every
//!    pointing frame emits the right-hand position.
//! 6. **Terminate** – hands crossed past the opposite hips either end the
//!    gesture session or request a clean shutdown, per
//!    [`CrossedHandsPolicy`].
//!
//! The worker is the sole writer of joint snapshots, posture state, the
//! active-subject mark and the movement space.  Subscribers only ever see
//! immutable event copies.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gestura_middleware::EventBus;
use gestura_perception::{MovementSpace, SpaceReading, classify_mode};
use gestura_types::{GestureError, GestureEvent, GestureMode, JointId, JointSample, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::lifecycle::{LifecycleState, Transition, UserLifecycleTracker};
use crate::provider::{FrameStatus, ProviderCallback, ProviderRequest, TrackingProvider};

/// Source tag stamped on every event this loop publishes.
const SOURCE: &str = "gestura-runtime::orchestrator";

/// Externally supplied posture classification of the active subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureState {
    /// No posture callback received yet.
    Unknown,
    Steady,
    Moving,
}

/// Where the poll loop currently is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    Idle,
    Running,
    /// Clean exit: stop signal, end of stream, or shutdown request honoured.
    Stopped,
    /// A provider error ended the loop permanently.
    Faulted,
}

/// What to do when the active subject crosses both hands past the opposite
/// hips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossedHandsPolicy {
    /// End the current gesture session only.
    #[default]
    EndSession,
    /// Publish a shutdown request and stop the loop after this frame.
    Shutdown,
}

/// Tunables for [`SessionOrchestrator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfig {
    pub crossed_hands_policy: CrossedHandsPolicy,
}

/// The poll loop.  Owns the provider, the lifecycle tracker, the posture and
/// gesture-mode state and the anchored movement space.
pub struct SessionOrchestrator<P: TrackingProvider> {
    provider: P,
    bus: EventBus,
    tracker: UserLifecycleTracker,
    posture: PostureState,
    /// The external wave-to-start gate; gesture modes are only evaluated
    /// while it is open.
    wave_session: bool,
    mode: GestureMode,
    space: Option<MovementSpace>,
    policy: CrossedHandsPolicy,
    stop: Arc<AtomicBool>,
    status: LoopStatus,
}

impl<P: TrackingProvider> SessionOrchestrator<P> {
    pub fn new(provider: P, bus: EventBus, config: OrchestratorConfig) -> Self {
        Self {
            provider,
            bus,
            tracker: UserLifecycleTracker::new(),
            posture: PostureState::Unknown,
            wave_session: false,
            mode: GestureMode::None,
            space: None,
            policy: config.crossed_hands_policy,
            stop: Arc::new(AtomicBool::new(false)),
            status: LoopStatus::Idle,
        }
    }

    /// Shared flag that requests a stop; the in-flight frame always
    /// completes before the stop is honoured.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn status(&self) -> LoopStatus {
        self.status
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Drive the poll loop until the provider runs dry, a stop is requested
    /// or a provider error faults the loop.
    ///
    /// # Errors
    ///
    /// Returns the provider error that faulted the loop; it has already been
    /// reported once as a terminal [`GestureEvent::Message`].
    pub async fn run(&mut self) -> Result<(), GestureError> {
        self.status = LoopStatus::Running;
        info!("poll loop started");
        loop {
            if self.stop.load(Ordering::Acquire) {
                info!("stop requested; poll loop ending");
                self.status = LoopStatus::Stopped;
                return Ok(());
            }
            match self.provider.wait_for_frame().await {
                Ok(FrameStatus::Ready) => {
                    if let Err(e) = self.frame() {
                        return Err(self.fault(e));
                    }
                }
                Ok(FrameStatus::EndOfStream) => {
                    info!("provider end of stream; poll loop ending");
                    self.status = LoopStatus::Stopped;
                    return Ok(());
                }
                Err(e) => return Err(self.fault(e)),
            }
        }
    }

    /// Report a fatal runtime error once and stop permanently.
    fn fault(&mut self, e: GestureError) -> GestureError {
        error!(error = %e, "fatal provider error; poll loop faulted");
        self.emit(GestureEvent::Message(format!("fatal tracking error: {e}")));
        self.status = LoopStatus::Faulted;
        e
    }

    /// One full frame iteration (steps 2–6 of the module docs).
    fn frame(&mut self) -> Result<(), GestureError> {
        let mut became_steady = false;
        for callback in self.provider.drain_callbacks() {
            self.apply_callback(callback, &mut became_steady);
        }

        self.refresh_joints()?;
        self.update_mode();

        if became_steady {
            self.handle_steady();
        }

        self.per_frame_outputs();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Callback application
    // -------------------------------------------------------------------------

    fn apply_callback(&mut self, callback: ProviderCallback, became_steady: &mut bool) {
        match callback {
            ProviderCallback::NewUser(id) => {
                let needs_pose = self.provider.requires_calibration_pose();
                let t = self.tracker.on_new_user(id, needs_pose);
                self.apply_transition(t);
            }
            ProviderCallback::LostUser(id) => {
                let was_active = self.tracker.active_subject() == Some(id);
                if let Some(t) = self.tracker.on_lost_user(id) {
                    self.apply_transition(t);
                }
                if was_active {
                    // The gesture state belonged to this user.
                    self.mode = GestureMode::None;
                    self.space = None;
                }
            }
            ProviderCallback::PoseDetected(id) => {
                if let Some(t) = self.tracker.on_pose_detected(id) {
                    self.apply_transition(t);
                }
            }
            ProviderCallback::CalibrationComplete(id, status) => {
                let needs_pose = self.provider.requires_calibration_pose();
                if let Some(t) = self.tracker.on_calibration_complete(id, status, needs_pose) {
                    self.apply_transition(t);
                }
            }
            ProviderCallback::SessionStart => {
                self.wave_session = true;
                info!("wave session started");
                self.emit(GestureEvent::Message("wave session started".to_string()));
            }
            ProviderCallback::SessionEnd => {
                self.wave_session = false;
                self.mode = GestureMode::None;
                self.space = None;
                info!("wave session ended");
                self.emit(GestureEvent::Message("wave session ended".to_string()));
            }
            ProviderCallback::Steady(id) => {
                self.tracker.set_active_if_tracking(id);
                if self.posture != PostureState::Steady {
                    *became_steady = true;
                }
                self.posture = PostureState::Steady;
                self.emit(GestureEvent::UserSteady(id));
            }
            ProviderCallback::NotSteady(id) => {
                self.posture = PostureState::Moving;
                self.emit(GestureEvent::UserNotSteady(id));
            }
        }
    }

    fn apply_transition(&mut self, transition: Transition) {
        self.emit(transition.event);
        match transition.request {
            Some(ProviderRequest::PoseDetection(id)) => self.provider.start_pose_detection(id),
            Some(ProviderRequest::Calibration(id)) => self.provider.request_calibration(id),
            None => {}
        }
    }

    // -------------------------------------------------------------------------
    // Per-frame state refresh
    // -------------------------------------------------------------------------

    /// Overwrite every tracking user's joint snapshot; users still in the
    /// calibration pipeline get their per-frame notification instead.
    fn refresh_joints(&mut self) -> Result<(), GestureError> {
        for id in self.provider.user_ids() {
            if self.tracker.is_tracking(id) && self.provider.is_tracking(id) {
                for joint in JointId::ALL {
                    let sample = self.provider.joint_position(id, joint)?;
                    if let Some(joints) = self.tracker.joints_mut(id) {
                        joints.insert(joint, sample);
                    }
                }
            } else {
                match self.tracker.state_of(id) {
                    LifecycleState::LookingForPose => {
                        self.emit(GestureEvent::LookingForPose(id));
                    }
                    LifecycleState::Calibrating => {
                        self.emit(GestureEvent::Calibrating(id));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Recompute the gesture mode of the active subject; only evaluated
    /// while the wave session is open.
    fn update_mode(&mut self) {
        let new_mode = if self.wave_session {
            self.active_mode_inputs()
                .map(|(left, right, hip)| classify_mode(&left, &right, &hip))
                .unwrap_or(GestureMode::None)
        } else {
            GestureMode::None
        };

        if new_mode != self.mode {
            debug!(from = ?self.mode, to = ?new_mode, "gesture mode changed");
            if self.mode == GestureMode::Navigation {
                // Invariant: a movement space exists only in navigation mode.
                self.space = None;
            }
            self.mode = new_mode;
        }
    }

    /// A posture transition to steady either anchors a fresh movement space
    /// (navigation, none yet) or discards the existing one (any other mode).
    fn handle_steady(&mut self) {
        match self.mode {
            GestureMode::Navigation if self.space.is_none() => {
                let Some((left, right)) = self.hands() else {
                    return;
                };
                match MovementSpace::anchor(left.position, right.position) {
                    Ok(space) => {
                        self.space = Some(space);
                        if let Some(id) = self.tracker.active_subject() {
                            self.emit(GestureEvent::NavigationSessionStart(id));
                        }
                    }
                    Err(e) => {
                        // Stay in the no-frame state until the hands separate.
                        warn!(error = %e, "rejecting movement-space anchor");
                    }
                }
            }
            GestureMode::Navigation => {
                // An existing space is left untouched.
            }
            _ => {
                self.space = None;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Per-frame outputs
    // -------------------------------------------------------------------------

    fn per_frame_outputs(&mut self) {
        let Some(id) = self.tracker.active_subject() else {
            return;
        };

        match self.mode {
            GestureMode::Navigation => {
                if let (Some(space), Some((left, right))) = (self.space, self.hands()) {
                    match space.read(left.position, right.position) {
                        SpaceReading::Coordinate(coordinate) => {
                            self.emit(GestureEvent::NavigationGesture(coordinate));
                        }
                        SpaceReading::NavigationEnded => {
                            self.space = None;
                            self.emit(GestureEvent::NavigationSessionEnd(id));
                        }
                    }
                }
            }
            GestureMode::Pointing => {
                if let Some(right) = self.tracker.sample(id, JointId::RightHand) {
                    let p = right.position;
                    self.emit(GestureEvent::PointingCoordinates {
                        user: id,
                        x: p.x,
                        y: p.y,
                        z: p.z,
                    });
                }
            }
            GestureMode::None => {}
        }

        if self.wave_session {
            self.check_crossed_hands(id);
        }
    }

    /// Hands crossed past the opposite hips terminate the gesture session or
    /// the whole loop, depending on policy.  Never an abrupt process exit.
    ///
    /// In projected image space the right hip sits at greater X than the
    /// left; "crossed" means each hand has passed the opposite hip on the X
    /// axis.
    fn check_crossed_hands(&mut self, id: UserId) {
        let Some((left_hand, right_hand)) = self.hands() else {
            return;
        };
        let (Some(left_hip), Some(right_hip)) = (
            self.tracker.sample(id, JointId::LeftHip).copied(),
            self.tracker.sample(id, JointId::RightHip).copied(),
        ) else {
            return;
        };
        if !left_hip.confidence.is_usable() || !right_hip.confidence.is_usable() {
            return;
        }

        let crossed = left_hand.position.x > right_hip.position.x
            && right_hand.position.x < left_hip.position.x;
        if !crossed {
            return;
        }

        match self.policy {
            CrossedHandsPolicy::EndSession => {
                if self.space.take().is_some() {
                    info!(user = id, "hands crossed; ending navigation session");
                    self.emit(GestureEvent::NavigationSessionEnd(id));
                }
            }
            CrossedHandsPolicy::Shutdown => {
                info!(user = id, "hands crossed; requesting shutdown");
                self.emit(GestureEvent::ShutdownRequested(id));
                self.stop.store(true, Ordering::Release);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Current confident hand samples of the active subject.
    fn hands(&self) -> Option<(JointSample, JointSample)> {
        let id = self.tracker.active_subject()?;
        let left = self.tracker.sample(id, JointId::LeftHand)?;
        let right = self.tracker.sample(id, JointId::RightHand)?;
        if !left.confidence.is_usable() || !right.confidence.is_usable() {
            return None;
        }
        Some((*left, *right))
    }

    /// The three samples the mode classifier needs, if all are present.
    fn active_mode_inputs(&self) -> Option<(JointSample, JointSample, JointSample)> {
        let id = self.tracker.active_subject()?;
        if !self.tracker.is_tracking(id) {
            return None;
        }
        let left = *self.tracker.sample(id, JointId::LeftHand)?;
        let right = *self.tracker.sample(id, JointId::RightHand)?;
        let hip = *self.tracker.sample(id, JointId::LeftHip)?;
        Some((left, right, hip))
    }

    fn emit(&self, payload: GestureEvent) {
        // Best-effort publish – no subscribers is not an error.
        let _ = self.bus.emit(SOURCE, payload);
    }
}
