#![deny(unsafe_code)]
//! WS2812 strips driven over SPI MOSI
//!
//! Each strip gets its own SPI peripheral in TX-only mode with no SCK pin;
//! `ws2812-spi` encodes every WS2812 bit as an SPI nibble, which needs a bus
//! clock between 2 and 3.8 MHz.

use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use smart_leds::{brightness, gamma, SmartLedsWrite, RGB8};
use ws2812_spi::Ws2812;

/// SPI clock for WS2812 bit encoding
const WS2812_SPI_HZ: u32 = 3_000_000;

/// Driver for one strip
pub type StripDriver = Ws2812<Spi<'static, Blocking>>;

/// SPI settings `ws2812-spi` expects (the default mode 0, ~3 MHz)
pub fn spi_config() -> spi::Config {
    let mut config = spi::Config::default();
    config.frequency = Hertz(WS2812_SPI_HZ);
    config
}

/// Strip with gamma correction and a global brightness cap
///
/// The countdown logic works in full-scale colors; dimming is purely a
/// display concern and happens here, on the way out.
pub struct Strip<W> {
    inner: W,
    level: u8,
}

impl<W> Strip<W> {
    pub fn new(inner: W, level: u8) -> Self {
        Self { inner, level }
    }
}

impl<W> SmartLedsWrite for Strip<W>
where
    W: SmartLedsWrite<Color = RGB8>,
{
    type Error = W::Error;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        self.inner
            .write(brightness(gamma(iterator.into_iter().map(Into::into)), self.level))
    }
}
