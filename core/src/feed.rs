//! Message feed client
//!
//! Keeps one publish/subscribe session alive and fans inbound messages out
//! to registered handlers.
//!
//! ```text
//! DISCONNECTED --connect ok--> CONNECTED --subscribe--> SUBACK --publish <topic>/get
//!      ^                           |
//!      +---- disconnect / I/O error+
//! ```
//!
//! Work is rate limited by two independent gates: one for reconnect
//! attempts and one for pumping protocol I/O. Neither ever blocks the
//! caller beyond the transport's own bounded poll.

use core::time::Duration;

use hal_abstractions::{FeedEvent, FeedTransport, Instant, NetworkError};
use heapless::{String, Vec};

use crate::event::EventError;
use crate::gate::IntervalGate;

/// Maximum MQTT topic length
/// Format: "{username}/feeds/{feed}/get"
pub const MAX_TOPIC_LEN: usize = 64;

/// Payload that asks the broker to re-send a feed's retained value
pub const RETAINED_REQUEST_PAYLOAD: &[u8] = b"\0";

/// Predicate deciding whether a handler sees a raw payload
pub type Discriminator = fn(&[u8]) -> bool;

/// Consumer of inbound feed messages
///
/// Handlers are borrowed, not owned, by the client; their state lives with
/// whatever registered them.
pub trait MessageHandler {
    fn consume(&self, payload: &[u8]) -> Result<(), HandlerError>;
}

/// Handler failures; isolated per handler during dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandlerError {
    Event(EventError),
}

impl From<EventError> for HandlerError {
    fn from(e: EventError) -> Self {
        Self::Event(e)
    }
}

impl core::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Event(e) => write!(f, "{}", e),
        }
    }
}

impl core::error::Error for HandlerError {}

/// Feed client errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeedError {
    /// Transport failure; the session is considered lost
    Network(NetworkError),
    /// Topic contains a wildcard or NUL character
    InvalidTopic,
    /// Topic does not fit in [`MAX_TOPIC_LEN`]
    TopicTooLong,
    /// No room left for another handler
    TooManyHandlers,
}

impl From<NetworkError> for FeedError {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

impl core::fmt::Display for FeedError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "{}", e),
            Self::InvalidTopic => write!(f, "Topic contains invalid MQTT characters"),
            Self::TopicTooLong => write!(f, "Topic too long"),
            Self::TooManyHandlers => write!(f, "Handler table full"),
        }
    }
}

impl core::error::Error for FeedError {}

/// Feed client cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    /// Minimum time between reconnect attempts
    pub reconnect_interval: Duration,
    /// Minimum time between protocol pumps
    pub pump_interval: Duration,
    /// Upper bound on events drained by one pump
    pub max_events_per_pump: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            pump_interval: Duration::from_secs(1),
            max_events_per_pump: 8,
        }
    }
}

/// Format the topic of a feed: `{username}/feeds/{feed}`
pub fn format_feed_topic(username: &str, feed: &str) -> Result<String<MAX_TOPIC_LEN>, FeedError> {
    // Topic names cannot contain wildcards (+, #) or null characters
    for part in [username, feed] {
        if part.is_empty() || part.contains(['+', '#', '\0']) {
            error!("Feed topic component contains invalid MQTT topic characters");
            return Err(FeedError::InvalidTopic);
        }
    }

    let mut topic = String::<MAX_TOPIC_LEN>::new();
    topic
        .push_str(username)
        .map_err(|_| FeedError::TopicTooLong)?;
    topic
        .push_str("/feeds/")
        .map_err(|_| FeedError::TopicTooLong)?;
    topic.push_str(feed).map_err(|_| FeedError::TopicTooLong)?;

    // The companion request topic must fit as well
    retained_request_topic(&topic)?;
    Ok(topic)
}

/// Companion topic that triggers re-delivery of the retained value
pub fn retained_request_topic(topic: &str) -> Result<String<MAX_TOPIC_LEN>, FeedError> {
    let mut get = String::<MAX_TOPIC_LEN>::new();
    get.push_str(topic).map_err(|_| FeedError::TopicTooLong)?;
    get.push_str("/get").map_err(|_| FeedError::TopicTooLong)?;
    Ok(get)
}

/// Client identifier `{prefix}{unique}`, or `None` if it does not fit in `N`
pub fn format_client_id<const N: usize>(prefix: &str, unique: &str) -> Option<String<N>> {
    let mut client_id = String::new();
    client_id.push_str(prefix).ok()?;
    client_id.push_str(unique).ok()?;
    Some(client_id)
}

struct Registration<'h> {
    handler: &'h dyn MessageHandler,
    discriminator: Option<Discriminator>,
}

/// Outcome of delivering one message to every registered handler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DispatchReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// What one `tick` did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedActivity {
    /// A new session was established this tick
    pub connected: bool,
    /// Protocol I/O was pumped this tick
    pub pumped: bool,
    /// Application messages dispatched this tick
    pub messages: usize,
    /// Handler calls that failed on those messages
    pub failed: usize,
}

/// Feed client holding up to `H` handlers
pub struct FeedClient<'h, T, const H: usize> {
    transport: T,
    topic: String<MAX_TOPIC_LEN>,
    request_topic: String<MAX_TOPIC_LEN>,
    connected: bool,
    handlers: Vec<Registration<'h>, H>,
    reconnect_gate: IntervalGate,
    pump_gate: IntervalGate,
    max_events_per_pump: usize,
}

impl<'h, T, const H: usize> FeedClient<'h, T, H>
where
    T: FeedTransport,
{
    pub fn new(transport: T, topic: &str, config: FeedConfig) -> Result<Self, FeedError> {
        if topic.is_empty() || topic.contains(['+', '#', '\0']) {
            return Err(FeedError::InvalidTopic);
        }
        let request_topic = retained_request_topic(topic)?;
        let mut owned_topic = String::new();
        owned_topic
            .push_str(topic)
            .map_err(|_| FeedError::TopicTooLong)?;

        Ok(Self {
            transport,
            topic: owned_topic,
            request_topic,
            connected: false,
            handlers: Vec::new(),
            reconnect_gate: IntervalGate::new(config.reconnect_interval),
            pump_gate: IntervalGate::new(config.pump_interval),
            max_events_per_pump: config.max_events_per_pump.max(1),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Register `handler`, invoked for every message `discriminator`
    /// accepts (all messages when `None`)
    ///
    /// Handlers run in registration order. Registering the same handler
    /// twice makes it run twice.
    pub fn add_handler(
        &mut self,
        handler: &'h dyn MessageHandler,
        discriminator: Option<Discriminator>,
    ) -> Result<(), FeedError> {
        self.handlers
            .push(Registration {
                handler,
                discriminator,
            })
            .map_err(|_| FeedError::TooManyHandlers)
    }

    /// Establish the session if not already connected, then subscribe
    pub async fn connect(&mut self) -> Result<(), FeedError> {
        if self.connected {
            return Ok(());
        }

        if let Err(e) = self.transport.connect().await {
            warn!("Feed connect failed: {}", e);
            return Err(e.into());
        }
        self.connected = true;
        self.on_connect().await
    }

    async fn on_connect(&mut self) -> Result<(), FeedError> {
        info!("Connected! Listening for topic changes on {=str}", self.topic.as_str());
        if let Err(e) = self.transport.subscribe(&self.topic).await {
            error!("Subscribe to {=str} failed: {}", self.topic.as_str(), e);
            self.on_disconnect();
            return Err(e.into());
        }
        Ok(())
    }

    async fn on_subscribe(&mut self, granted_qos: u8) -> Result<(), FeedError> {
        debug!(
            "Subscribed to {=str} with QoS level {}",
            self.topic.as_str(),
            granted_qos
        );
        self.get().await
    }

    /// Ask the broker to re-publish the feed's most recent value
    pub async fn get(&mut self) -> Result<(), FeedError> {
        if let Err(e) = self
            .transport
            .publish(&self.request_topic, RETAINED_REQUEST_PAYLOAD, false)
            .await
        {
            error!("Retained value request failed: {}", e);
            self.on_disconnect();
            return Err(e.into());
        }
        Ok(())
    }

    /// Mark the session lost; the next reconnect gate firing re-establishes it
    pub fn on_disconnect(&mut self) {
        if self.connected {
            warn!("Disconnected from feed broker!");
        }
        self.connected = false;
    }

    /// Deliver one inbound message to every matching handler
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> DispatchReport {
        dispatch(&self.handlers, topic, payload)
    }

    /// Drain pending protocol events, up to the per-pump bound
    pub async fn pump(&mut self) -> Result<FeedActivity, FeedError> {
        let mut activity = FeedActivity {
            pumped: true,
            ..FeedActivity::default()
        };

        for _ in 0..self.max_events_per_pump {
            let mut granted = None;
            match self.transport.poll().await {
                Ok(FeedEvent::Idle) => break,
                Ok(FeedEvent::Control) => continue,
                Ok(FeedEvent::Subscribed { granted_qos }) => granted = Some(granted_qos),
                Ok(FeedEvent::Message { topic, payload }) => {
                    let report = dispatch(&self.handlers, topic, payload);
                    activity.messages += 1;
                    activity.failed += report.failed;
                }
                Ok(FeedEvent::Disconnected) => {
                    self.on_disconnect();
                    break;
                }
                Err(e) => {
                    error!("Feed pump failed: {}", e);
                    self.on_disconnect();
                    return Err(e.into());
                }
            }

            if let Some(granted_qos) = granted {
                self.on_subscribe(granted_qos).await?;
            }
        }

        Ok(activity)
    }

    /// Run whatever work is due at `now`
    pub async fn tick(&mut self, now: Instant) -> Result<FeedActivity, FeedError> {
        let mut activity = FeedActivity::default();

        if self.reconnect_gate.fire(now) && !self.connected {
            self.connect().await?;
            activity.connected = true;
        }

        if self.pump_gate.fire(now) && self.connected {
            let connected = activity.connected;
            activity = self.pump().await?;
            activity.connected = connected;
        }

        Ok(activity)
    }
}

fn dispatch(handlers: &[Registration<'_>], topic: &str, payload: &[u8]) -> DispatchReport {
    debug!("New message on topic {=str}: {=[u8]}", topic, payload);

    let mut report = DispatchReport::default();
    for registration in handlers {
        let accepted = registration
            .discriminator
            .is_none_or(|discriminator| discriminator(payload));
        if !accepted {
            report.skipped += 1;
            continue;
        }

        match registration.handler.consume(payload) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                error!("Handler failed on message from {=str}: {}", topic, e);
                report.failed += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use embassy_futures::block_on;
    use hal_abstractions::MqttError;
    use heapless::Deque;

    use super::*;
    use crate::event::is_new_bottle_event;

    const TOPIC: &str = "user/feeds/bottle";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scripted {
        Idle,
        Control,
        Subscribed,
        Message(&'static [u8]),
        Disconnected,
        Fail,
    }

    /// Transport replaying a fixed script of poll results
    #[derive(Default)]
    struct ScriptedTransport {
        fail_connect: bool,
        fail_subscribe: bool,
        connects: usize,
        subscriptions: Vec<String<MAX_TOPIC_LEN>, 4>,
        published: Vec<(String<MAX_TOPIC_LEN>, Vec<u8, 8>), 4>,
        script: Deque<Scripted, 16>,
    }

    impl ScriptedTransport {
        fn push(&mut self, event: Scripted) {
            self.script.push_back(event).unwrap();
        }
    }

    impl FeedTransport for ScriptedTransport {
        async fn connect(&mut self) -> Result<(), NetworkError> {
            self.connects += 1;
            if self.fail_connect {
                return Err(NetworkError::DnsError);
            }
            Ok(())
        }

        async fn subscribe(&mut self, topic: &str) -> Result<(), NetworkError> {
            if self.fail_subscribe {
                return Err(MqttError::SubscribeFailed.into());
            }
            self.subscriptions.push(topic.try_into().unwrap()).unwrap();
            Ok(())
        }

        async fn publish(
            &mut self,
            topic: &str,
            payload: &[u8],
            _retain: bool,
        ) -> Result<(), NetworkError> {
            self.published
                .push((topic.try_into().unwrap(), Vec::from_slice(payload).unwrap()))
                .unwrap();
            Ok(())
        }

        async fn poll(&mut self) -> Result<FeedEvent<'_>, NetworkError> {
            match self.script.pop_front().unwrap_or(Scripted::Idle) {
                Scripted::Idle => Ok(FeedEvent::Idle),
                Scripted::Control => Ok(FeedEvent::Control),
                Scripted::Subscribed => Ok(FeedEvent::Subscribed { granted_qos: 0 }),
                Scripted::Message(payload) => Ok(FeedEvent::Message {
                    topic: TOPIC,
                    payload,
                }),
                Scripted::Disconnected => Ok(FeedEvent::Disconnected),
                Scripted::Fail => Err(NetworkError::Tls(hal_abstractions::TlsError::ConnectionClosed)),
            }
        }
    }

    /// Handler that counts calls and optionally fails
    #[derive(Default)]
    struct CountingHandler {
        calls: Cell<usize>,
        fail: bool,
    }

    impl MessageHandler for CountingHandler {
        fn consume(&self, _payload: &[u8]) -> Result<(), HandlerError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(EventError::Malformed.into());
            }
            Ok(())
        }
    }

    fn is_low_battery_event(payload: &[u8]) -> bool {
        crate::event::EventPayload::decode(payload).is_ok_and(|e| e.event == Some("low-battery"))
    }

    const NEW_BOTTLE: &[u8] = br#"{"event":"new-bottle","event-ts":"2024-01-01T00:00:00"}"#;
    const LOW_BATTERY: &[u8] = br#"{"event":"low-battery","event-ts":"2024-01-01T00:00:00"}"#;

    #[test]
    fn test_format_feed_topic() {
        let topic = format_feed_topic("alice", "bottle-events").unwrap();
        assert_eq!(topic.as_str(), "alice/feeds/bottle-events");
        assert!(topic.len() < MAX_TOPIC_LEN);

        let get = retained_request_topic(&topic).unwrap();
        assert_eq!(get.as_str(), "alice/feeds/bottle-events/get");
    }

    #[test]
    fn test_format_feed_topic_invalid_characters() {
        assert_eq!(format_feed_topic("al+ice", "feed"), Err(FeedError::InvalidTopic));
        assert_eq!(format_feed_topic("alice", "fe#ed"), Err(FeedError::InvalidTopic));
        assert_eq!(format_feed_topic("alice", "fe\0ed"), Err(FeedError::InvalidTopic));
        assert_eq!(format_feed_topic("", "feed"), Err(FeedError::InvalidTopic));
    }

    #[test]
    fn test_format_feed_topic_buffer_overflow() {
        let long_feed = "this_is_a_very_long_feed_name_that_exceeds_the_maximum_topic_length";
        assert_eq!(format_feed_topic("alice", long_feed), Err(FeedError::TopicTooLong));
        // Fits on its own but leaves no room for the /get suffix
        let tight_feed = "abcdefghijklmnopqrstuvwxyzabcdefghijklmnopqrstuvwxy";
        assert_eq!(format_feed_topic("alice", tight_feed), Err(FeedError::TopicTooLong));
    }

    #[test]
    fn test_client_id_format() {
        let id = format_client_id::<31>("bottle-", "0123456789abcdef01234567").unwrap();
        assert_eq!(id.as_str(), "bottle-0123456789abcdef01234567");
        assert_eq!(id.len(), 31);
        assert!(format_client_id::<31>("bottle-", "0123456789abcdef0123456789").is_none());
    }

    #[test]
    fn test_connect_subscribes_then_requests_retained_value() {
        let mut client =
            FeedClient::<_, 2>::new(ScriptedTransport::default(), TOPIC, FeedConfig::default())
                .unwrap();
        block_on(client.connect()).unwrap();
        assert!(client.is_connected());
        assert_eq!(client.transport().subscriptions.len(), 1);
        assert_eq!(client.transport().subscriptions[0].as_str(), TOPIC);
        assert!(client.transport().published.is_empty());

        // Connecting again is a no-op
        block_on(client.connect()).unwrap();
        assert_eq!(client.transport().connects, 1);

        client.transport_mut().push(Scripted::Subscribed);
        assert_eq!(block_on(client.pump()).map(|a| a.messages), Ok(0));
        let (topic, payload) = &client.transport().published[0];
        assert_eq!(topic.as_str(), "user/feeds/bottle/get");
        assert_eq!(payload.as_slice(), b"\0");
    }

    #[test]
    fn test_connect_failure_stays_disconnected() {
        let transport = ScriptedTransport {
            fail_connect: true,
            ..Default::default()
        };
        let mut client = FeedClient::<_, 2>::new(transport, TOPIC, FeedConfig::default()).unwrap();
        assert_eq!(
            block_on(client.connect()),
            Err(FeedError::Network(NetworkError::DnsError))
        );
        assert!(!client.is_connected());
    }

    #[test]
    fn test_subscribe_failure_drops_session() {
        let transport = ScriptedTransport {
            fail_subscribe: true,
            ..Default::default()
        };
        let mut client = FeedClient::<_, 2>::new(transport, TOPIC, FeedConfig::default()).unwrap();
        assert!(block_on(client.connect()).is_err());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_discriminators_select_handlers() {
        let bottle = CountingHandler::default();
        let battery = CountingHandler::default();
        let mut client =
            FeedClient::<_, 2>::new(ScriptedTransport::default(), TOPIC, FeedConfig::default())
                .unwrap();
        client.add_handler(&bottle, Some(is_new_bottle_event)).unwrap();
        client.add_handler(&battery, Some(is_low_battery_event)).unwrap();

        let report = client.on_message(TOPIC, NEW_BOTTLE);
        assert_eq!(bottle.calls.get(), 1);
        assert_eq!(battery.calls.get(), 0);
        assert_eq!(
            report,
            DispatchReport {
                delivered: 1,
                skipped: 1,
                failed: 0
            }
        );

        client.on_message(TOPIC, LOW_BATTERY);
        assert_eq!(bottle.calls.get(), 1);
        assert_eq!(battery.calls.get(), 1);
    }

    #[test]
    fn test_failing_handler_does_not_stop_dispatch() {
        let failing = CountingHandler {
            fail: true,
            ..Default::default()
        };
        let catch_all = CountingHandler::default();
        let mut client =
            FeedClient::<_, 3>::new(ScriptedTransport::default(), TOPIC, FeedConfig::default())
                .unwrap();
        client.add_handler(&failing, None).unwrap();
        client.add_handler(&catch_all, None).unwrap();
        client.add_handler(&catch_all, None).unwrap();

        let report = client.on_message(TOPIC, b"anything");
        assert_eq!(failing.calls.get(), 1);
        assert_eq!(catch_all.calls.get(), 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 2);
    }

    #[test]
    fn test_handler_table_capacity() {
        let handler = CountingHandler::default();
        let mut client =
            FeedClient::<_, 1>::new(ScriptedTransport::default(), TOPIC, FeedConfig::default())
                .unwrap();
        client.add_handler(&handler, None).unwrap();
        assert_eq!(
            client.add_handler(&handler, None),
            Err(FeedError::TooManyHandlers)
        );
    }

    #[test]
    fn test_pump_dispatches_and_is_bounded() {
        let handler = CountingHandler::default();
        let config = FeedConfig {
            max_events_per_pump: 2,
            ..FeedConfig::default()
        };
        let mut client = FeedClient::<_, 1>::new(ScriptedTransport::default(), TOPIC, config).unwrap();
        client.add_handler(&handler, None).unwrap();
        block_on(client.connect()).unwrap();

        for _ in 0..3 {
            client.transport_mut().push(Scripted::Message(NEW_BOTTLE));
        }
        assert_eq!(block_on(client.pump()).map(|a| a.messages), Ok(2));
        assert_eq!(block_on(client.pump()).map(|a| a.messages), Ok(1));
        assert_eq!(handler.calls.get(), 3);
    }

    #[test]
    fn test_pump_skips_control_traffic() {
        let handler = CountingHandler::default();
        let mut client =
            FeedClient::<_, 1>::new(ScriptedTransport::default(), TOPIC, FeedConfig::default())
                .unwrap();
        client.add_handler(&handler, None).unwrap();
        block_on(client.connect()).unwrap();

        // A keep-alive answer ahead of the retained value
        client.transport_mut().push(Scripted::Control);
        client.transport_mut().push(Scripted::Message(NEW_BOTTLE));
        let activity = block_on(client.pump()).unwrap();
        assert_eq!(activity.messages, 1);
        assert_eq!(handler.calls.get(), 1);
    }

    #[test]
    fn test_pump_counts_handler_failures() {
        let failing = CountingHandler {
            fail: true,
            ..Default::default()
        };
        let ok = CountingHandler::default();
        let mut client =
            FeedClient::<_, 2>::new(ScriptedTransport::default(), TOPIC, FeedConfig::default())
                .unwrap();
        client.add_handler(&failing, None).unwrap();
        client.add_handler(&ok, None).unwrap();
        block_on(client.connect()).unwrap();

        client.transport_mut().push(Scripted::Message(NEW_BOTTLE));
        client.transport_mut().push(Scripted::Message(LOW_BATTERY));
        let activity = block_on(client.tick(Instant::ZERO)).unwrap();
        assert!(activity.pumped);
        assert_eq!(activity.messages, 2);
        assert_eq!(activity.failed, 2);
        assert_eq!(ok.calls.get(), 2);
    }

    #[test]
    fn test_pump_failure_disconnects() {
        let mut client =
            FeedClient::<_, 1>::new(ScriptedTransport::default(), TOPIC, FeedConfig::default())
                .unwrap();
        block_on(client.connect()).unwrap();
        client.transport_mut().push(Scripted::Fail);
        assert!(block_on(client.pump()).is_err());
        assert!(!client.is_connected());

        block_on(client.connect()).unwrap();
        client.transport_mut().push(Scripted::Disconnected);
        assert_eq!(block_on(client.pump()).map(|a| a.messages), Ok(0));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_tick_gates_reconnect_and_pump() {
        let transport = ScriptedTransport {
            fail_connect: true,
            ..Default::default()
        };
        let mut client = FeedClient::<_, 1>::new(transport, TOPIC, FeedConfig::default()).unwrap();

        assert!(block_on(client.tick(Instant::ZERO)).is_err());
        assert_eq!(client.transport().connects, 1);

        // Reconnect is gated to once per 5 s
        client.transport_mut().fail_connect = false;
        let activity = block_on(client.tick(Instant::from_secs(2))).unwrap();
        assert_eq!(activity, FeedActivity::default());
        assert_eq!(client.transport().connects, 1);

        let activity = block_on(client.tick(Instant::from_secs(5))).unwrap();
        assert!(activity.connected);
        assert!(activity.pumped);
        assert_eq!(client.transport().connects, 2);

        // Pump is gated to once per second
        client.transport_mut().push(Scripted::Message(NEW_BOTTLE));
        let activity = block_on(client.tick(Instant::from_millis(5_500))).unwrap();
        assert!(!activity.pumped);
        let activity = block_on(client.tick(Instant::from_secs(6))).unwrap();
        assert!(activity.pumped);
        assert_eq!(activity.messages, 1);
    }
}
