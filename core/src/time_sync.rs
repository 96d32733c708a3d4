//! Time sync supervisor
//!
//! Keeps the wall clock aligned with a network time source.
//!
//! ```text
//! DISCONNECTED --connect ok--> CONNECTED --update ok--> CONNECTED
//!      ^                           |
//!      +-------update failure------+
//! ```
//!
//! The wall clock always holds UTC. The configured zone offset is only used
//! to present local time and to interpret zone-less event timestamps.
//!
//! Network answers are cached: within `cache_validity` of the last fetch an
//! update extrapolates from the cached answer using monotonic time instead
//! of querying the network again.

use core::time::Duration;

use hal_abstractions::{ClockError, Instant, NetworkError, TimeSource, Timestamp, WallClock};

use crate::calendar::CivilDateTime;
use crate::gate::IntervalGate;

/// Supervisor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSyncConfig {
    /// Minimum time between connect attempts while disconnected
    pub reconnect_interval: Duration,
    /// Minimum time between clock refreshes
    pub refresh_interval: Duration,
    /// How long a network answer may be extrapolated instead of re-fetched
    pub cache_validity: Duration,
    /// Local time minus UTC, in seconds
    pub tz_offset_secs: i32,
    /// Write fetched time to the wall clock; `false` only queries
    pub set_clock: bool,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            refresh_interval: Duration::from_secs(3601),
            cache_validity: Duration::from_secs(3600),
            tz_offset_secs: -5 * 3600,
            set_clock: true,
        }
    }
}

/// Observable supervisor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSyncState {
    /// Local time minus UTC, in seconds
    pub offset_secs: i32,
    pub cache_validity: Duration,
    /// No clock mutation is attempted while `false`
    pub connected: bool,
    /// Last time successfully obtained from the source
    pub last_update: Option<Timestamp>,
}

/// Time sync failures; every one leaves the supervisor disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncError {
    /// The time source could not be queried
    Source(NetworkError),
    /// The wall clock rejected the new time
    Clock(ClockError),
}

impl From<NetworkError> for SyncError {
    fn from(e: NetworkError) -> Self {
        Self::Source(e)
    }
}

impl From<ClockError> for SyncError {
    fn from(e: ClockError) -> Self {
        Self::Clock(e)
    }
}

impl core::fmt::Display for SyncError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Source(e) => write!(f, "Time source: {}", e),
            Self::Clock(e) => write!(f, "Wall clock: {}", e),
        }
    }
}

impl core::error::Error for SyncError {}

/// What one `tick` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncOutcome {
    /// Nothing was due
    Idle,
    /// A connect attempt succeeded
    Connected(Timestamp),
    /// A refresh succeeded
    Updated(Timestamp),
}

#[derive(Debug, Clone, Copy)]
struct CachedTime {
    network: Timestamp,
    fetched_at: Instant,
}

/// Supervisor around one [`TimeSource`]
pub struct TimeSync<S> {
    source: S,
    state: ClockSyncState,
    set_clock: bool,
    cache: Option<CachedTime>,
    reconnect_gate: IntervalGate,
    refresh_gate: IntervalGate,
}

impl<S: TimeSource> TimeSync<S> {
    pub fn new(source: S, config: TimeSyncConfig) -> Self {
        Self {
            source,
            state: ClockSyncState {
                offset_secs: config.tz_offset_secs,
                cache_validity: config.cache_validity,
                connected: false,
                last_update: None,
            },
            set_clock: config.set_clock,
            cache: None,
            reconnect_gate: IntervalGate::new(config.reconnect_interval),
            refresh_gate: IntervalGate::new(config.refresh_interval),
        }
    }

    pub fn state(&self) -> &ClockSyncState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Convert UTC to local time at the configured offset
    pub fn local(&self, utc: Timestamp) -> Timestamp {
        utc.offset_by(self.state.offset_secs)
    }

    /// Query the source once and, if configured, set the wall clock
    ///
    /// Always performs a fresh query, ignoring the cache.
    pub async fn connect<C: WallClock>(
        &mut self,
        clock: &mut C,
        now: Instant,
    ) -> Result<Timestamp, SyncError> {
        debug!("Attempting to connect to time source");
        let result = match self.source.fetch().await {
            Ok(network) => {
                self.cache = Some(CachedTime {
                    network,
                    fetched_at: now,
                });
                self.apply(clock, network)
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(network) => {
                self.state.connected = true;
                debug!("Success connecting to time source");
                Ok(network)
            }
            Err(e) => {
                warn!("Time source connect failed: {}", e);
                self.state.connected = false;
                Err(e)
            }
        }
    }

    /// Refresh the wall clock, reconnecting first when disconnected
    pub async fn update<C: WallClock>(
        &mut self,
        clock: &mut C,
        now: Instant,
    ) -> Result<Timestamp, SyncError> {
        if !self.state.connected {
            return self.connect(clock, now).await;
        }

        debug!("Updating system time from time source");
        let result = match self.current(now).await {
            Ok(network) => self.apply(clock, network),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!("Time update failed: {}", e);
            self.state.connected = false;
        }
        result
    }

    /// Run whatever work is due at `now`
    pub async fn tick<C: WallClock>(
        &mut self,
        clock: &mut C,
        now: Instant,
    ) -> Result<SyncOutcome, SyncError> {
        if self.reconnect_gate.fire(now) && !self.state.connected {
            return self.connect(clock, now).await.map(SyncOutcome::Connected);
        }

        if self.refresh_gate.fire(now) {
            return self.update(clock, now).await.map(SyncOutcome::Updated);
        }

        Ok(SyncOutcome::Idle)
    }

    /// Network time, served from the cache while it is fresh
    async fn current(&mut self, now: Instant) -> Result<Timestamp, SyncError> {
        if let Some(cached) = self.cache {
            if let Some(age) = now.checked_duration_since(cached.fetched_at) {
                if age < self.state.cache_validity {
                    return Ok(cached.network.saturating_add(age));
                }
            }
        }

        let network = self.source.fetch().await?;
        self.cache = Some(CachedTime {
            network,
            fetched_at: now,
        });
        Ok(network)
    }

    fn apply<C: WallClock>(&mut self, clock: &mut C, network: Timestamp) -> Result<Timestamp, SyncError> {
        if self.set_clock {
            clock.set(network)?;
            debug!(
                "Wall clock set to {} (local {})",
                CivilDateTime::from_unix(network.unix_secs),
                CivilDateTime::from_unix(self.local(network).unix_secs)
            );
        }
        self.state.last_update = Some(network);
        Ok(network)
    }
}
