//! Countdown visualizer
//!
//! Renders the time left until `reference + total_interval` as a bar of lit
//! pixels. The bar color depends on the fraction of the interval still
//! remaining:
//!
//! | remaining / total | color  |
//! |-------------------|--------|
//! | `< 1/18`          | red    |
//! | `< 1/6`           | orange |
//! | otherwise         | green  |
//!
//! The rightmost lit pixel blinks. Once the interval has run out the whole
//! strip stays dark until the next reset.
//!
//! All proportion math is done on whole seconds with integer arithmetic, so
//! bucket boundaries are exact.

use core::cell::Cell;
use core::time::Duration;

use hal_abstractions::{Instant, Timestamp};
use smart_leds::{SmartLedsWrite, RGB8};

use crate::calendar::{parse_iso8601, CivilDateTime};
use crate::controller::Visualizer;
use crate::event::{EventError, EventPayload};
use crate::feed::{HandlerError, MessageHandler};
use crate::gate::IntervalGate;

pub const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Color band of the lit pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bucket {
    Red,
    Orange,
    Green,
}

impl Bucket {
    /// Band for `remaining` out of `total`; callers guarantee `total > 0`
    pub fn classify(remaining_secs: u64, total_secs: u64) -> Self {
        let remaining = remaining_secs as u128;
        let total = total_secs as u128;
        if remaining * 18 < total {
            Self::Red
        } else if remaining * 6 < total {
            Self::Orange
        } else {
            Self::Green
        }
    }

    pub const fn color(self) -> RGB8 {
        match self {
            Self::Red => RGB8 { r: 255, g: 0, b: 0 },
            Self::Orange => RGB8 {
                r: 255,
                g: 165,
                b: 0,
            },
            Self::Green => RGB8 { r: 0, g: 255, b: 0 },
        }
    }
}

/// Number of pixels to light for `remaining` out of `total` on a strip of
/// `pixel_count`, rounded down
pub fn lit_count(remaining_secs: u64, total_secs: u64, pixel_count: usize) -> usize {
    if total_secs == 0 {
        return 0;
    }
    let remaining = remaining_secs.min(total_secs) as u128;
    (remaining * pixel_count as u128 / total_secs as u128) as usize
}

/// Countdown timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownConfig {
    /// Length of a full countdown
    pub total_interval: Duration,
    /// Time between blink pixel toggles
    pub blink_interval: Duration,
    /// Minimum time between progress log lines
    pub log_interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            total_interval: Duration::from_secs(300),
            blink_interval: Duration::from_secs(1),
            log_interval: Duration::from_secs(1),
        }
    }
}

/// Shared reference time of one countdown
///
/// The visualizer reads it on every render; the feed client writes it
/// through [`MessageHandler`] when a new-bottle event arrives. Both hold a
/// shared borrow, so the anchor must outlive them.
#[derive(Debug)]
pub struct Anchor {
    reference: Cell<Option<Timestamp>>,
    naive_offset_secs: i32,
}

impl Anchor {
    /// `naive_offset_secs` (local minus UTC) interprets event timestamps
    /// that carry no zone designator
    pub const fn new(naive_offset_secs: i32) -> Self {
        Self {
            reference: Cell::new(None),
            naive_offset_secs,
        }
    }

    pub fn reference(&self) -> Option<Timestamp> {
        self.reference.get()
    }

    pub fn set(&self, reference: Option<Timestamp>) {
        self.reference.set(reference);
    }

    /// Decode an event payload and restart the countdown at its `event-ts`
    ///
    /// Leaves the reference untouched on any decode failure.
    pub fn handle_event(&self, payload: &[u8]) -> Result<Timestamp, EventError> {
        let event = EventPayload::decode(payload)?;
        let event_ts = event.event_ts.ok_or(EventError::MissingTimestamp)?;
        let reference = parse_iso8601(event_ts, self.naive_offset_secs)?;

        info!(
            "New bottle event received: {=str} at {=str}",
            event.event.unwrap_or(""),
            event_ts
        );
        self.set(Some(reference));
        Ok(reference)
    }
}

impl MessageHandler for Anchor {
    fn consume(&self, payload: &[u8]) -> Result<(), HandlerError> {
        self.handle_event(payload)?;
        Ok(())
    }
}

/// What a render put on the strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RenderSummary {
    /// `None` when the strip is dark
    pub bucket: Option<Bucket>,
    pub lit: usize,
    pub remaining_secs: u64,
}

impl RenderSummary {
    const DARK: Self = Self {
        bucket: None,
        lit: 0,
        remaining_secs: 0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RenderError {
    /// The pixel sink rejected the frame
    WriteFailed,
}

impl core::fmt::Display for RenderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "LED strip write failed"),
        }
    }
}

impl core::error::Error for RenderError {}

#[derive(Debug, Clone, Copy)]
struct Blink {
    /// Reference time this phase belongs to
    reference: Option<Timestamp>,
    deadline: Option<Instant>,
    on: bool,
}

impl Blink {
    const fn new(reference: Option<Timestamp>) -> Self {
        Self {
            reference,
            deadline: None,
            on: false,
        }
    }
}

/// Countdown rendered onto one LED strip of `N` pixels
pub struct Countdown<'a, W, const N: usize> {
    anchor: &'a Anchor,
    strip: W,
    pixels: [RGB8; N],
    config: CountdownConfig,
    blink: Blink,
    log_gate: IntervalGate,
    /// Reference written by the last `reset`, until it is rebased
    last_reset: Option<Timestamp>,
}

impl<'a, W, const N: usize> Countdown<'a, W, N>
where
    W: SmartLedsWrite<Color = RGB8>,
{
    pub fn new(anchor: &'a Anchor, strip: W, config: CountdownConfig) -> Self {
        Self {
            anchor,
            strip,
            pixels: [OFF; N],
            config,
            blink: Blink::new(anchor.reference()),
            log_gate: IntervalGate::new(config.log_interval),
            last_reset: None,
        }
    }

    /// Last rendered frame
    pub fn pixels(&self) -> &[RGB8; N] {
        &self.pixels
    }

    /// Restart the countdown at `reference`, or at `now` when absent
    pub fn reset(&mut self, reference: Option<Timestamp>, now: Timestamp) {
        let reference = reference.unwrap_or(now);
        self.anchor.set(Some(reference));
        self.last_reset = Some(reference);
    }

    /// Shift the reference written by the last `reset` by `delta_secs`
    ///
    /// A reference the feed has replaced since then is left alone.
    pub fn rebase(&mut self, delta_secs: i64) {
        let Some(reset) = self.last_reset.take() else {
            return;
        };
        if self.anchor.reference() == Some(reset) {
            let rebased = reset.shifted_by(delta_secs);
            self.anchor.set(Some(rebased));
            // Same countdown on a corrected clock; keep the blink phase
            self.blink.reference = Some(rebased);
        }
    }

    /// Recompute the frame for `now` and push it to the strip
    ///
    /// `mono` drives the blink phase and log rate so wall-clock jumps from
    /// time sync cannot stall or race the animation.
    pub fn render(&mut self, now: Timestamp, mono: Instant) -> Result<RenderSummary, RenderError> {
        let reference = self.anchor.reference();
        if reference != self.blink.reference {
            self.blink = Blink::new(reference);
        }

        let summary = match reference {
            Some(reference) => self.paint(reference, now, mono),
            None => {
                self.pixels = [OFF; N];
                RenderSummary::DARK
            }
        };

        self.strip
            .write(self.pixels.iter().copied())
            .map_err(|_| RenderError::WriteFailed)?;
        Ok(summary)
    }

    fn paint(&mut self, reference: Timestamp, now: Timestamp, mono: Instant) -> RenderSummary {
        let total = self.config.total_interval.as_secs();
        let end = reference.saturating_add(self.config.total_interval);
        // A reference in the future (clock skew) shows a full bar
        let remaining = end.seconds_since(now).clamp(0, total as i64) as u64;

        if self.log_gate.fire(mono) {
            debug!(
                "current: {} reference: {} end: {} remaining: {}s of {}s",
                CivilDateTime::from_unix(now.unix_secs),
                CivilDateTime::from_unix(reference.unix_secs),
                CivilDateTime::from_unix(end.unix_secs),
                remaining,
                total
            );
        }

        if remaining == 0 {
            self.pixels = [OFF; N];
            return RenderSummary::DARK;
        }

        let bucket = Bucket::classify(remaining, total);
        let lit = lit_count(remaining, total, N);
        let color = bucket.color();
        for (i, pixel) in self.pixels.iter_mut().enumerate() {
            *pixel = if i < lit { color } else { OFF };
        }

        if lit > 0 {
            let blink_pixel = (lit - 1).min(N - 1);
            if self.blink.deadline.is_none_or(|deadline| mono >= deadline) {
                self.blink.on = !self.blink.on;
                self.blink.deadline = Some(mono.saturating_add(self.config.blink_interval));
            }
            if !self.blink.on {
                self.pixels[blink_pixel] = OFF;
            }
        }

        RenderSummary {
            bucket: Some(bucket),
            lit,
            remaining_secs: remaining,
        }
    }
}

impl<W, const N: usize> Visualizer for Countdown<'_, W, N>
where
    W: SmartLedsWrite<Color = RGB8>,
{
    fn reset(&mut self, reference: Option<Timestamp>, now: Timestamp) {
        Countdown::reset(self, reference, now)
    }

    fn render(&mut self, now: Timestamp, mono: Instant) -> Result<RenderSummary, RenderError> {
        Countdown::render(self, now, mono)
    }

    fn rebase(&mut self, delta_secs: i64) {
        Countdown::rebase(self, delta_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: RGB8 = Bucket::Green.color();
    const ORANGE: RGB8 = Bucket::Orange.color();
    const RED: RGB8 = Bucket::Red.color();
    const T0: u64 = 1_704_067_200;

    /// Pixel sink that counts frames and can be told to fail
    #[derive(Default)]
    struct FakeStrip {
        frames: usize,
        fail: bool,
    }

    impl SmartLedsWrite for FakeStrip {
        type Error = ();
        type Color = RGB8;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            if self.fail {
                return Err(());
            }
            let _ = iterator.into_iter().count();
            self.frames += 1;
            Ok(())
        }
    }

    fn at(offset: u64) -> Timestamp {
        Timestamp::from_secs(T0 + offset)
    }

    #[test]
    fn test_bucket_boundaries_are_exact() {
        // 1/18 and 1/6 of 180 are 10 and 30
        assert_eq!(Bucket::classify(9, 180), Bucket::Red);
        assert_eq!(Bucket::classify(10, 180), Bucket::Orange);
        assert_eq!(Bucket::classify(29, 180), Bucket::Orange);
        assert_eq!(Bucket::classify(30, 180), Bucket::Green);
        assert_eq!(Bucket::classify(180, 180), Bucket::Green);
        assert_eq!(Bucket::classify(0, 10_800), Bucket::Red);
    }

    #[test]
    fn test_lit_count_rounds_down_and_clamps() {
        assert_eq!(lit_count(300, 300, 30), 30);
        assert_eq!(lit_count(299, 300, 30), 29);
        assert_eq!(lit_count(9, 300, 30), 0);
        assert_eq!(lit_count(10, 300, 30), 1);
        assert_eq!(lit_count(900, 300, 4), 4);
        assert_eq!(lit_count(10, 0, 4), 0);
    }

    #[test]
    fn test_lit_count_is_non_increasing_over_time() {
        let mut previous = usize::MAX;
        for remaining in (0..=300).rev() {
            let lit = lit_count(remaining, 300, 30);
            assert!(lit <= previous);
            previous = lit;
        }
    }

    #[test]
    fn test_no_reference_renders_dark() {
        let anchor = Anchor::new(0);
        let mut countdown =
            Countdown::<_, 4>::new(&anchor, FakeStrip::default(), CountdownConfig::default());
        let summary = countdown.render(at(0), Instant::ZERO).unwrap();
        assert_eq!(summary, RenderSummary::DARK);
        assert_eq!(countdown.pixels(), &[OFF; 4]);
        assert_eq!(countdown.strip.frames, 1);
    }

    #[test]
    fn test_five_minute_scenario() {
        let anchor = Anchor::new(0);
        let mut countdown =
            Countdown::<_, 30>::new(&anchor, FakeStrip::default(), CountdownConfig::default());
        countdown.reset(Some(at(0)), at(0));

        let summary = countdown.render(at(250), Instant::from_secs(1)).unwrap();
        assert_eq!(summary.bucket, Some(Bucket::Green));
        assert_eq!(summary.lit, 5);
        assert_eq!(countdown.pixels()[0], GREEN);

        let summary = countdown.render(at(251), Instant::from_secs(2)).unwrap();
        assert_eq!(summary.bucket, Some(Bucket::Orange));
        assert_eq!(countdown.pixels()[0], ORANGE);

        let summary = countdown.render(at(295), Instant::from_secs(3)).unwrap();
        assert_eq!(summary.bucket, Some(Bucket::Red));
        assert_eq!(summary.lit, 0);

        let summary = countdown.render(at(301), Instant::from_secs(4)).unwrap();
        assert_eq!(summary, RenderSummary::DARK);
        assert_eq!(countdown.pixels(), &[OFF; 30]);
    }

    #[test]
    fn test_expired_stays_dark_until_reset() {
        let anchor = Anchor::new(0);
        let mut countdown =
            Countdown::<_, 4>::new(&anchor, FakeStrip::default(), CountdownConfig::default());
        countdown.reset(Some(at(0)), at(0));

        for (i, offset) in [300u64, 301, 1_000, 100_000].into_iter().enumerate() {
            let summary = countdown.render(at(offset), Instant::from_secs(i as u64)).unwrap();
            assert_eq!(summary, RenderSummary::DARK);
            assert_eq!(countdown.pixels(), &[OFF; 4]);
        }

        countdown.reset(None, at(100_000));
        let summary = countdown.render(at(100_000), Instant::from_secs(10)).unwrap();
        assert_eq!(summary.lit, 4);
        assert_eq!(countdown.pixels(), &[GREEN; 4]);
    }

    #[test]
    fn test_future_reference_shows_full_bar() {
        let anchor = Anchor::new(0);
        let mut countdown =
            Countdown::<_, 4>::new(&anchor, FakeStrip::default(), CountdownConfig::default());
        countdown.reset(Some(at(600)), at(0));
        let summary = countdown.render(at(0), Instant::ZERO).unwrap();
        assert_eq!(summary.bucket, Some(Bucket::Green));
        assert_eq!(summary.lit, 4);
        assert_eq!(summary.remaining_secs, 300);
    }

    #[test]
    fn test_rightmost_lit_pixel_blinks() {
        let anchor = Anchor::new(0);
        let mut countdown =
            Countdown::<_, 4>::new(&anchor, FakeStrip::default(), CountdownConfig::default());
        countdown.reset(Some(at(0)), at(0));

        // 150 of 300 seconds left lights 2 of 4 pixels; pixel 1 blinks
        countdown.render(at(150), Instant::ZERO).unwrap();
        assert_eq!(countdown.pixels(), &[GREEN, GREEN, OFF, OFF]);

        // Within the blink interval the phase holds
        countdown.render(at(150), Instant::from_millis(500)).unwrap();
        assert_eq!(countdown.pixels(), &[GREEN, GREEN, OFF, OFF]);

        countdown.render(at(150), Instant::from_millis(1_000)).unwrap();
        assert_eq!(countdown.pixels(), &[GREEN, OFF, OFF, OFF]);

        countdown.render(at(150), Instant::from_millis(1_500)).unwrap();
        assert_eq!(countdown.pixels(), &[GREEN, OFF, OFF, OFF]);

        countdown.render(at(150), Instant::from_millis(2_000)).unwrap();
        assert_eq!(countdown.pixels(), &[GREEN, GREEN, OFF, OFF]);
    }

    #[test]
    fn test_new_reference_restarts_blink_phase() {
        let anchor = Anchor::new(0);
        let mut countdown =
            Countdown::<_, 4>::new(&anchor, FakeStrip::default(), CountdownConfig::default());
        countdown.reset(Some(at(0)), at(0));
        countdown.render(at(10), Instant::ZERO).unwrap();
        // 290 of 300 seconds left lights 3 pixels; the blink pixel is now off
        countdown.render(at(10), Instant::from_secs(1)).unwrap();
        assert_eq!(countdown.pixels(), &[GREEN, GREEN, OFF, OFF]);

        anchor.set(Some(at(11)));
        countdown.render(at(11), Instant::from_millis(1_100)).unwrap();
        assert_eq!(countdown.pixels(), &[GREEN; 4]);
    }

    #[test]
    fn test_single_lit_red_pixel() {
        let anchor = Anchor::new(0);
        let config = CountdownConfig {
            total_interval: Duration::from_secs(180),
            ..CountdownConfig::default()
        };
        let mut countdown = Countdown::<_, 30>::new(&anchor, FakeStrip::default(), config);
        countdown.reset(Some(at(0)), at(0));
        // 9 of 180 seconds left: red, 1 pixel lit
        let summary = countdown.render(at(171), Instant::ZERO).unwrap();
        assert_eq!(summary.bucket, Some(Bucket::Red));
        assert_eq!(summary.lit, 1);
        assert_eq!(countdown.pixels()[0], RED);
        assert_eq!(countdown.pixels()[1], OFF);
    }

    #[test]
    fn test_rebase_moves_own_reset_only() {
        let anchor = Anchor::new(0);
        let mut countdown =
            Countdown::<_, 4>::new(&anchor, FakeStrip::default(), CountdownConfig::default());

        // Restarted at 100 s after the epoch on an estimated clock
        countdown.reset(None, Timestamp::from_secs(100));
        countdown.rebase(T0 as i64);
        assert_eq!(anchor.reference(), Some(at(100)));
        let summary = countdown.render(at(160), Instant::ZERO).unwrap();
        assert_eq!(summary.remaining_secs, 240);

        // Only once per reset
        countdown.rebase(1_000);
        assert_eq!(anchor.reference(), Some(at(100)));

        // An event that replaced the reference is already on real time
        countdown.reset(None, Timestamp::from_secs(200));
        anchor.set(Some(at(50)));
        countdown.rebase(T0 as i64);
        assert_eq!(anchor.reference(), Some(at(50)));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let anchor = Anchor::new(0);
        let strip = FakeStrip {
            frames: 0,
            fail: true,
        };
        let mut countdown = Countdown::<_, 4>::new(&anchor, strip, CountdownConfig::default());
        assert_eq!(
            countdown.render(at(0), Instant::ZERO),
            Err(RenderError::WriteFailed)
        );
    }

    #[test]
    fn test_new_bottle_event_sets_reference() {
        let anchor = Anchor::new(0);
        let payload = br#"{"event":"new-bottle","event-ts":"2024-01-01T00:05:00","ounces":4}"#;
        assert_eq!(anchor.handle_event(payload), Ok(at(300)));
        assert_eq!(anchor.reference(), Some(at(300)));
    }

    #[test]
    fn test_naive_event_timestamp_uses_offset() {
        let anchor = Anchor::new(-5 * 3600);
        let payload = br#"{"event":"new-bottle","event-ts":"2023-12-31T19:00:00"}"#;
        assert_eq!(anchor.handle_event(payload), Ok(at(0)));
    }

    #[test]
    fn test_malformed_event_leaves_reference() {
        let anchor = Anchor::new(0);
        anchor.set(Some(at(42)));

        assert_eq!(anchor.handle_event(b"{not json"), Err(EventError::Malformed));
        assert_eq!(
            anchor.handle_event(br#"{"event":"new-bottle"}"#),
            Err(EventError::MissingTimestamp)
        );
        assert!(matches!(
            anchor.handle_event(br#"{"event":"new-bottle","event-ts":"soon"}"#),
            Err(EventError::InvalidTimestamp(_))
        ));
        assert_eq!(anchor.reference(), Some(at(42)));
        assert!(anchor.consume(b"garbage").is_err());
    }
}
