//! `gestura-perception` – spatial gesture classification.
//!
//! Turns per-frame joint geometry into the discrete values the session
//! orchestrator reacts to.  Everything here is pure computation over
//! [`gestura_types`] values; no provider access, no event emission.
//!
//! # Modules
//!
//! - [`mode`] – [`classify_mode`][mode::classify_mode]: decides, from the
//!   current hand and hip samples, whether the active subject is performing
//!   a navigation gesture, a pointing gesture, or nothing.
//! - [`space`] – [`MovementSpace`][space::MovementSpace]: the frame of
//!   reference anchored when a navigation gesture steadies, and the
//!   plane/quadrant classifier that maps the moving hand into a discrete
//!   [`Coordinate`][gestura_types::Coordinate].

pub mod mode;
pub mod space;

pub use mode::classify_mode;
pub use space::{MovementSpace, SpaceReading};
