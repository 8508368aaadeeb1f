//! `gestura-runtime` – the gesture pipeline engine.
//!
//! Hosts the single-writer poll loop that turns perception-provider frames
//! into published gesture events.
//!
//! # Modules
//!
//! - [`provider`] – [`TrackingProvider`][provider::TrackingProvider]:
//!   the abstract contract of the external skeletal-tracking middleware, plus
//!   [`ReplayProvider`][provider::ReplayProvider], a deterministic
//!   implementation driven by recorded JSON scripts.
//! - [`lifecycle`] – [`UserLifecycleTracker`][lifecycle::UserLifecycleTracker]:
//!   the per-user calibration state machine (unseen → looking-for-pose →
//!   calibrating → tracking → lost) and the active-subject mark.
//! - [`orchestrator`] – [`SessionOrchestrator`][orchestrator::SessionOrchestrator]:
//!   the per-frame loop that applies provider callbacks, refreshes joint
//!   snapshots, classifies the gesture mode, anchors and reads the movement
//!   space and publishes every resulting event on the bus.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod lifecycle;
pub mod orchestrator;
pub mod provider;
pub mod telemetry;

pub use lifecycle::{LifecycleState, UserLifecycleTracker};
pub use orchestrator::{
    CrossedHandsPolicy, LoopStatus, OrchestratorConfig, SessionOrchestrator,
};
pub use provider::{
    FrameStatus, ProviderCallback, ProviderRequest, ReplayFrame, ReplayProvider, ReplayScript,
    ReplayUser, TrackingProvider,
};
pub use telemetry::{init_tracing, TracerProviderGuard};
