//! Platform-agnostic core logic for the bottle countdown firmware
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Interval gates for non-blocking rate limiting
//! - Time sync supervisor (network time to wall clock) and the SNTP
//!   packet format
//! - Message feed client with discriminated handler dispatch
//! - Countdown visualizer with color bands and blink animation
//! - The control loop tying them together
//!
//! Hardware is reached only through the traits in `hal-abstractions`, so
//! everything here runs under host tests.

#![no_std]
#![deny(unsafe_code)]

mod fmt;

pub mod calendar;
pub mod controller;
pub mod countdown;
pub mod event;
pub mod feed;
pub mod gate;
pub mod sntp;
pub mod time_sync;

pub use controller::{Controller, IterationReport, Visualizer};
pub use countdown::{Anchor, Bucket, Countdown, CountdownConfig, RenderError, RenderSummary};
pub use event::{is_new_bottle_event, EventError, EventPayload, NEW_BOTTLE_EVENT};
pub use feed::{Discriminator, FeedClient, FeedConfig, FeedError, HandlerError, MessageHandler};
pub use gate::IntervalGate;
pub use time_sync::{ClockSyncState, SyncError, SyncOutcome, TimeSync, TimeSyncConfig};
