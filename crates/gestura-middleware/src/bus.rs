//! Typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into three [`Topic`] lanes so clients only receive
//! the messages they care about:
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Lifecycle`] | User appeared/lost, pose search, calibration, posture changes |
//! | [`Topic::Gesture`] | Navigation session boundaries, coordinates, pointing positions |
//! | [`Topic::Status`] | Human-readable messages and shutdown requests |
//!
//! Within one lane, events arrive in the order the corresponding conditions
//! were detected inside a frame iteration; there is no reordering or
//! batching across frames.

use chrono::Utc;
use gestura_types::{Event, GestureError, GestureEvent};
use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// User lifecycle and posture traffic.
    Lifecycle,
    /// Navigation and pointing gesture traffic.
    Gesture,
    /// Status messages and shutdown requests.
    Status,
}

impl Topic {
    /// The lane a given payload is routed to.
    pub fn for_payload(payload: &GestureEvent) -> Topic {
        match payload {
            GestureEvent::NewUser(_)
            | GestureEvent::LostUser(_)
            | GestureEvent::LookingForPose(_)
            | GestureEvent::Calibrating(_)
            | GestureEvent::UserSteady(_)
            | GestureEvent::UserNotSteady(_) => Topic::Lifecycle,
            GestureEvent::NavigationSessionStart(_)
            | GestureEvent::NavigationSessionEnd(_)
            | GestureEvent::NavigationGesture(_)
            | GestureEvent::PointingCoordinates { .. } => Topic::Gesture,
            GestureEvent::Message(_) | GestureEvent::ShutdownRequested(_) => Topic::Status,
        }
    }
}

/// Shared event bus.  Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    lifecycle: broadcast::Sender<Event>,
    gesture: broadcast::Sender<Event>,
    status: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (lifecycle, _) = broadcast::channel(capacity);
        let (gesture, _) = broadcast::channel(capacity);
        let (status, _) = broadcast::channel(capacity);
        Self {
            lifecycle,
            gesture,
            status,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`GestureError::Channel`] when nobody is currently listening on the
    /// topic.  Producers that do not care treat the error as best-effort.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, GestureError> {
        match self.topic_sender(topic).send(event) {
            Ok(receivers) => {
                trace!(?topic, receivers, "event published");
                Ok(receivers)
            }
            Err(_) => {
                trace!(?topic, "event dropped; no subscribers");
                Err(GestureError::Channel(format!(
                    "no subscribers for topic {topic:?}"
                )))
            }
        }
    }

    /// Wrap `payload` in a timestamped [`Event`] and publish it on the lane
    /// [`Topic::for_payload`] selects.
    pub fn emit(
        &self,
        source: impl Into<String>,
        payload: GestureEvent,
    ) -> Result<usize, GestureError> {
        let topic = Topic::for_payload(&payload);
        let event = Event {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        };
        self.publish_to(topic, event)
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        let receiver = self.topic_sender(topic).subscribe();
        debug!(?topic, "subscriber attached");
        TopicReceiver { topic, receiver }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Lifecycle => &self.lifecycle,
            Topic::Gesture => &self.gesture,
            Topic::Status => &self.status,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive for callers polling between frames.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gestura_types::{Coordinate, Plane, Quadrant};

    fn make_event(payload: GestureEvent) -> Event {
        Event {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: "gestura-middleware::test".to_string(),
            payload,
        }
    }

    #[test]
    fn payload_routing_covers_every_lane() {
        assert_eq!(
            Topic::for_payload(&GestureEvent::NewUser(1)),
            Topic::Lifecycle
        );
        assert_eq!(
            Topic::for_payload(&GestureEvent::NavigationGesture(Coordinate::new(
                Plane::Pov,
                Quadrant::Center
            ))),
            Topic::Gesture
        );
        assert_eq!(
            Topic::for_payload(&GestureEvent::Message("hi".into())),
            Topic::Status
        );
        assert_eq!(
            Topic::for_payload(&GestureEvent::ShutdownRequested(1)),
            Topic::Status
        );
    }

    #[tokio::test]
    async fn publish_and_receive() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Lifecycle);

        let event = make_event(GestureEvent::NewUser(4));
        bus.publish_to(Topic::Lifecycle, event.clone())?;

        let received = rx.recv().await?;
        assert_eq!(received.id, event.id);
        assert_eq!(received.payload, event.payload);
        Ok(())
    }

    #[tokio::test]
    async fn emit_routes_by_payload() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut gestures = bus.subscribe_to(Topic::Gesture);
        let _lifecycle = bus.subscribe_to(Topic::Lifecycle);

        bus.emit(
            "gestura-middleware::test",
            GestureEvent::NavigationSessionStart(2),
        )?;

        let received = gestures.recv().await?;
        assert_eq!(received.payload, GestureEvent::NavigationSessionStart(2));
        Ok(())
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe_to(Topic::Gesture);
        let mut rx2 = bus.subscribe_to(Topic::Gesture);

        let event = make_event(GestureEvent::NavigationSessionEnd(1));
        bus.publish_to(Topic::Gesture, event.clone())?;

        assert_eq!(rx1.recv().await?.id, event.id);
        assert_eq!(rx2.recv().await?.id, event.id);
        Ok(())
    }

    #[tokio::test]
    async fn subscriber_does_not_receive_other_topic_events(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut status_sub = bus.subscribe_to(Topic::Status);
        let _lifecycle_sub = bus.subscribe_to(Topic::Lifecycle);

        bus.publish_to(Topic::Lifecycle, make_event(GestureEvent::LostUser(9)))?;

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            status_sub.recv(),
        )
        .await;

        assert!(
            result.is_err(),
            "Status subscriber must not receive a Lifecycle event"
        );
        Ok(())
    }

    #[test]
    fn publish_no_subscribers_returns_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::Status, make_event(GestureEvent::Message("x".into())));
        assert!(matches!(result, Err(GestureError::Channel(_))));
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Lifecycle);

        for id in 0..5u32 {
            bus.publish_to(Topic::Lifecycle, make_event(GestureEvent::NewUser(id)))?;
        }
        for id in 0..5u32 {
            assert_eq!(rx.recv().await?.payload, GestureEvent::NewUser(id));
        }
        Ok(())
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag() {
        const CAPACITY: usize = 64;
        let bus = EventBus::new(CAPACITY);
        let mut slow_sub = bus.subscribe_to(Topic::Gesture);

        for _ in 0..10_000 {
            let _ = bus.publish_to(
                Topic::Gesture,
                make_event(GestureEvent::NavigationGesture(Coordinate::new(
                    Plane::Pov,
                    Quadrant::Center,
                ))),
            );
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }
}
