#![deny(unsafe_code)]
//! Reset button
//!
//! The edge is caught by an RTIC task awaiting the EXTI line and handed to
//! the control loop through a [`Signal`], which latches a single press until
//! the loop consumes it.

use embassy_stm32::exti::ExtiInput;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use hal_abstractions::Trigger;
use rtic_monotonics::fugit::ExtU64;
use rtic_monotonics::Monotonic as _;

use crate::Mono;

/// Contact bounce settles well inside this window
const DEBOUNCE_MS: u64 = 50;

static PRESSED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Wait for presses forever, signalling each debounced falling edge
pub async fn watch(mut button: ExtiInput<'static>) -> ! {
    loop {
        button.wait_for_falling_edge().await;
        Mono::delay(DEBOUNCE_MS.millis()).await;
        if button.is_low() {
            defmt::info!("Button pressed");
            PRESSED.signal(());
        }
        button.wait_for_high().await;
    }
}

/// Control-loop side of the button
#[derive(Debug, Default)]
pub struct ButtonTrigger;

impl Trigger for ButtonTrigger {
    fn triggered(&mut self) -> bool {
        PRESSED.try_take().is_some()
    }
}
