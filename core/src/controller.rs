//! Control loop
//!
//! One [`Controller::iterate`] call is one pass of the cooperative loop:
//!
//! 1. time sync tick
//! 2. feed tick (may restart countdowns through their anchors)
//! 3. read the wall clock, falling back to an estimate
//! 4. trigger check, resetting every visualizer on a press
//! 5. render every visualizer
//!
//! Until the wall clock is readable, "now" is estimated from the last
//! reading (or the Unix epoch) plus monotonic time elapsed since, so the
//! button and the strips keep working offline. Countdowns restarted on the
//! estimate are moved onto the real clock by the estimate's error as soon
//! as the clock becomes readable.
//!
//! Failures are reported in the [`IterationReport`] and logged, never
//! propagated; the next iteration simply tries again.

use hal_abstractions::{
    ClockError, FeedTransport, Instant, Monotonic, TimeSource, Timestamp, Trigger, WallClock,
};

use crate::countdown::{RenderError, RenderSummary};
use crate::feed::{FeedActivity, FeedClient, FeedError};
use crate::time_sync::{SyncError, SyncOutcome, TimeSync};

/// Something that shows countdown progress
pub trait Visualizer {
    /// Restart at `reference`, or at `now` when absent
    fn reset(&mut self, reference: Option<Timestamp>, now: Timestamp);

    /// Draw the frame for wall time `now`; `mono` drives animation
    fn render(&mut self, now: Timestamp, mono: Instant) -> Result<RenderSummary, RenderError>;

    /// Shift the reference of the last `reset` by `delta_secs`, once the
    /// `now` it was taken from turns out to have been off by that much
    fn rebase(&mut self, delta_secs: i64);
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IterationReport {
    pub sync: Result<SyncOutcome, SyncError>,
    pub feed: Result<FeedActivity, FeedError>,
    /// Raw wall clock reading
    pub clock: Result<Timestamp, ClockError>,
    /// Time the trigger and visualizers ran against
    pub now: Timestamp,
    /// `now` is an estimate because the clock was unreadable
    pub estimated: bool,
    /// Countdowns restarted on an estimate were shifted by this many seconds
    pub rebased_secs: Option<i64>,
    pub triggered: bool,
    pub rendered: usize,
    pub render_failures: usize,
}

/// Last wall time known to the loop, paired with when it was known
#[derive(Debug, Clone, Copy)]
struct WallEstimate {
    wall: Timestamp,
    mono: Instant,
}

impl WallEstimate {
    fn at(&self, mono: Instant) -> Timestamp {
        self.wall
            .saturating_add(mono.saturating_duration_since(self.mono))
    }
}

pub struct Controller<'h, S, T, C, M, B, const H: usize> {
    time_sync: TimeSync<S>,
    feed: FeedClient<'h, T, H>,
    clock: C,
    mono: M,
    trigger: B,
    last_wall: WallEstimate,
    /// A visualizer was reset against an estimate not yet corrected
    estimated_reset: bool,
}

impl<'h, S, T, C, M, B, const H: usize> Controller<'h, S, T, C, M, B, H>
where
    S: TimeSource,
    T: FeedTransport,
    C: WallClock,
    M: Monotonic,
    B: Trigger,
{
    pub fn new(time_sync: TimeSync<S>, feed: FeedClient<'h, T, H>, clock: C, mono: M, trigger: B) -> Self {
        Self {
            time_sync,
            feed,
            clock,
            mono,
            trigger,
            last_wall: WallEstimate {
                wall: Timestamp::EPOCH,
                mono: Instant::ZERO,
            },
            estimated_reset: false,
        }
    }

    pub fn time_sync(&self) -> &TimeSync<S> {
        &self.time_sync
    }

    pub fn feed(&self) -> &FeedClient<'h, T, H> {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut FeedClient<'h, T, H> {
        &mut self.feed
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn trigger_mut(&mut self) -> &mut B {
        &mut self.trigger
    }

    /// Run one pass of the loop over `visualizers`
    pub async fn iterate(&mut self, visualizers: &mut [&mut dyn Visualizer]) -> IterationReport {
        let now = self.mono.now();

        let sync = self.time_sync.tick(&mut self.clock, now).await;
        if let Err(e) = sync {
            warn!("Time sync: {}", e);
        }

        let feed = self.feed.tick(now).await;
        match feed {
            Ok(activity) if activity.failed > 0 => {
                warn!("Feed: {} handler failures", activity.failed)
            }
            Ok(_) => {}
            Err(e) => warn!("Feed: {}", e),
        }

        // Network work above may have taken a while
        let mono = self.mono.now();
        let clock = self.clock.now();
        let estimate = self.last_wall.at(mono);

        let mut report = IterationReport {
            sync,
            feed,
            clock,
            now: estimate,
            estimated: true,
            rebased_secs: None,
            triggered: false,
            rendered: 0,
            render_failures: 0,
        };

        if let Ok(wall) = clock {
            if core::mem::take(&mut self.estimated_reset) {
                let delta = wall.seconds_since(estimate);
                info!("Wall clock readable, moving countdowns by {}s", delta);
                for visualizer in visualizers.iter_mut() {
                    visualizer.rebase(delta);
                }
                report.rebased_secs = Some(delta);
            }
            self.last_wall = WallEstimate { wall, mono };
            report.now = wall;
            report.estimated = false;
        }

        if self.trigger.triggered() {
            info!("Trigger pressed, restarting countdowns");
            report.triggered = true;
            for visualizer in visualizers.iter_mut() {
                visualizer.reset(None, report.now);
            }
            if report.estimated {
                self.estimated_reset = true;
            }
        }

        for visualizer in visualizers.iter_mut() {
            match visualizer.render(report.now, mono) {
                Ok(_) => report.rendered += 1,
                Err(e) => {
                    error!("Render failed: {}", e);
                    report.render_failures += 1;
                }
            }
        }

        report
    }
}
