//! MQTT v5.0 feed transport
//!
//! Implements [`FeedTransport`] with the `rust-mqtt` client over a TLS 1.3
//! session. The session persists across calls: its TCP, TLS and packet
//! buffers are the statics in `src/buffers.rs`, and a reconnect drops the
//! old session before claiming them again.
//!
//! Inbound messages are copied into a small inbox owned by the transport so
//! the borrowed [`FeedEvent::Message`] stays valid after the packet arena
//! moves on.

#![allow(unsafe_code)] // Static session buffers and unchecked topic names

use defmt::{debug, error, info, warn, Debug2Format};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration, Instant};
use hal_abstractions::{FeedEvent, FeedTransport, MqttError, NetworkError};
use heapless::{String, Vec};
use rust_mqtt::{
    buffer::BumpBuffer,
    client::{
        event::Event,
        options::{ConnectOptions, PublicationOptions, SubscriptionOptions, TopicReference},
        Client,
    },
    config::{KeepAlive, SessionExpiryInterval},
    types::{MqttBinary, MqttString, QoS, TopicFilter, TopicName},
    Bytes,
};

use crate::buffers;

use super::config::MqttConfig;
use super::tls::{self, TlsBuffers, TlsStream, TlsTarget};

/// Longest topic the inbox holds (matches the feed client's bound)
const MAX_TOPIC_LEN: usize = bottle_core::feed::MAX_TOPIC_LEN;
/// Longest payload the inbox holds; feed values are short JSON documents
const MAX_PAYLOAD_LEN: usize = 512;
/// QoS the feed is subscribed at (`SubscriptionOptions::default()`)
///
/// A broker never grants more than the requested level, and there is
/// nothing below 0, so every accepted subscription runs at this level.
const SUBSCRIPTION_QOS: u8 = 0;

type Session = Client<'static, TlsStream, BumpBuffer<'static>, 1, 1, 1, 0>;

/// Broker session carrying the event feed
pub struct MqttTransport<RNG> {
    stack: Stack<'static>,
    rng: RNG,
    config: MqttConfig,
    client_id: &'static str,
    session: Option<Session>,
    last_ping: Instant,
    inbox_topic: String<MAX_TOPIC_LEN>,
    inbox_payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl<RNG> MqttTransport<RNG>
where
    RNG: rand_core::RngCore + rand_core::CryptoRng,
{
    pub fn new(stack: Stack<'static>, rng: RNG, config: MqttConfig, client_id: &'static str) -> Self {
        Self {
            stack,
            rng,
            config,
            client_id,
            session: None,
            last_ping: Instant::now(),
            inbox_topic: String::new(),
            inbox_payload: Vec::new(),
        }
    }

    fn keep_alive(&self) -> KeepAlive {
        if self.config.keep_alive_secs == 0 {
            KeepAlive::Infinite
        } else {
            KeepAlive::Seconds(self.config.keep_alive_secs)
        }
    }

    fn ping_due(&self) -> bool {
        self.config.keep_alive_secs != 0
            && self.last_ping.elapsed()
                >= Duration::from_secs(u64::from(self.config.keep_alive_secs) / 2)
    }

    /// Drop the session after a protocol failure
    fn fail(&mut self, error: MqttError) -> NetworkError {
        self.session = None;
        error.into()
    }
}

impl<RNG> FeedTransport for MqttTransport<RNG>
where
    RNG: rand_core::RngCore + rand_core::CryptoRng,
{
    async fn connect(&mut self) -> Result<(), NetworkError> {
        info!(
            "Connecting to MQTT broker at {}:{}",
            self.config.broker_host, self.config.broker_port
        );

        // The previous session must release the static buffers first
        self.session = None;
        // SAFETY: the only holder of the previous buffers was just dropped,
        // and the transport is owned by a single task.
        let session_buffers = unsafe { buffers::session_buffers() };

        let target = TlsTarget {
            host: self.config.broker_host,
            port: self.config.broker_port,
            socket_timeout: Duration::from_millis(self.config.socket_timeout_ms),
        };
        let stream = tls::open(
            self.stack,
            &target,
            TlsBuffers {
                tcp_rx: session_buffers.tcp_rx,
                tcp_tx: session_buffers.tcp_tx,
                tls_read: session_buffers.tls_read,
                tls_write: session_buffers.tls_write,
            },
            &mut self.rng,
        )
        .await?;

        let user_name = MqttString::new(self.config.username.into()).map_err(|e| {
            error!("Invalid MQTT user name: {:?}", Debug2Format(&e));
            MqttError::ProtocolError
        })?;
        let password = MqttBinary::new(Bytes::from(self.config.key.as_bytes())).map_err(|e| {
            error!("Invalid MQTT password: {:?}", Debug2Format(&e));
            MqttError::ProtocolError
        })?;
        let client_id = MqttString::new(self.client_id.into()).map_err(|e| {
            error!("Invalid MQTT client ID: {:?}", Debug2Format(&e));
            MqttError::ProtocolError
        })?;

        let options = ConnectOptions {
            session_expiry_interval: SessionExpiryInterval::EndOnDisconnect,
            clean_start: self.config.clean_start,
            keep_alive: self.keep_alive(),
            will: None,
            user_name: Some(user_name),
            password: Some(password),
        };

        let mut session: Session = Client::new(session_buffers.mqtt);
        session
            .connect(stream, &options, Some(client_id))
            .await
            .map_err(|e| {
                error!("MQTT connect failed: {:?}", Debug2Format(&e));
                MqttError::ConnectionFailed
            })?;

        info!("MQTT session established as {}", self.client_id);
        self.session = Some(session);
        self.last_ping = Instant::now();
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), NetworkError> {
        let session = self.session.as_mut().ok_or(NetworkError::NotConnected)?;

        let name = MqttString::new(topic.into()).map_err(|_| MqttError::ProtocolError)?;
        // SAFETY: the feed client rejects topics containing wildcards or NUL,
        // so the name is also a valid single-topic filter.
        let filter = unsafe { TopicFilter::new_unchecked(name) };

        let result = session.subscribe(filter, &SubscriptionOptions::default()).await;
        if let Err(e) = result {
            error!("MQTT subscribe to {} failed: {:?}", topic, Debug2Format(&e));
            return Err(self.fail(MqttError::SubscribeFailed));
        }
        debug!("SUBSCRIBE sent for {}", topic);
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), NetworkError> {
        let session = self.session.as_mut().ok_or(NetworkError::NotConnected)?;

        let name = MqttString::new(topic.into()).map_err(|_| MqttError::ProtocolError)?;
        // SAFETY: topics come from the feed client, which rejects wildcards
        // and NUL characters.
        let topic_name = unsafe { TopicName::new_unchecked(name) };
        let options = PublicationOptions {
            retain,
            message_expiry_interval: None,
            topic: TopicReference::Name(topic_name),
            qos: QoS::AtMostOnce,
        };

        let result = session.publish(&options, Bytes::from(payload)).await;
        if let Err(e) = result {
            error!("MQTT publish to {} failed: {:?}", topic, Debug2Format(&e));
            return Err(self.fail(MqttError::PublishFailed));
        }
        Ok(())
    }

    async fn poll(&mut self) -> Result<FeedEvent<'_>, NetworkError> {
        let ping_due = self.ping_due();
        let poll_timeout = Duration::from_millis(self.config.poll_timeout_ms);

        let Self {
            session,
            last_ping,
            inbox_topic,
            inbox_payload,
            ..
        } = self;
        let Some(client) = session.as_mut() else {
            return Err(NetworkError::NotConnected);
        };

        if ping_due {
            if let Err(e) = client.ping().await {
                warn!("MQTT keep-alive ping failed: {:?}", Debug2Format(&e));
                *session = None;
                return Ok(FeedEvent::Disconnected);
            }
            *last_ping = Instant::now();
        }

        // An idle broker must not stall the control loop
        let event = match with_timeout(poll_timeout, client.poll()).await {
            Err(_) => return Ok(FeedEvent::Idle),
            Ok(Err(e)) => {
                warn!("MQTT session lost: {:?}", Debug2Format(&e));
                *session = None;
                return Ok(FeedEvent::Disconnected);
            }
            Ok(Ok(event)) => event,
        };

        match event {
            Event::Suback(_) => Ok(FeedEvent::Subscribed {
                granted_qos: SUBSCRIPTION_QOS,
            }),
            Event::Publish(publish) => {
                let topic: &str = publish.topic.as_ref();
                let payload: &[u8] = publish.message.as_ref();

                inbox_topic.clear();
                inbox_payload.clear();
                if inbox_topic.push_str(topic).is_err()
                    || inbox_payload.extend_from_slice(payload).is_err()
                {
                    warn!(
                        "Dropping oversized message ({} byte topic, {} byte payload)",
                        topic.len(),
                        payload.len()
                    );
                    return Ok(FeedEvent::Control);
                }

                Ok(FeedEvent::Message {
                    topic: inbox_topic.as_str(),
                    payload: inbox_payload.as_slice(),
                })
            }
            _ => {
                debug!("Ignoring MQTT control event");
                Ok(FeedEvent::Control)
            }
        }
    }
}
