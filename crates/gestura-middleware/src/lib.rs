//! `gestura-middleware` – event delivery.
//!
//! The gesture core never hands callers references into its own state.  It
//! publishes immutable [`Event`][gestura_types::Event] copies onto the bus
//! and subscribers consume them at their own pace.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
