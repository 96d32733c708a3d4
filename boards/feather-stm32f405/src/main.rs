#![deny(unsafe_code)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod buffers;
mod button;
mod config;
mod device_id;
mod eth;
mod leds;
mod network;
mod time;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2, USART3])]
mod app {
    use super::*;
    use defmt::{debug, info, panic, unwrap};
    use embassy_futures::join::join3;
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, Pull, Speed};
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode, LsConfig, LseConfig, LseMode};
    use embassy_stm32::rng::Rng;
    use embassy_stm32::rtc::{Rtc, RtcConfig};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use embassy_stm32::Peri;
    use static_cell::StaticCell;
    use ws2812_spi::Ws2812;

    use bottle_core::feed::format_feed_topic;
    use bottle_core::{
        is_new_bottle_event, Anchor, Controller, Countdown, FeedClient, TimeSync, Visualizer,
    };

    use crate::button::ButtonTrigger;
    use crate::config::{
        AppConfig, BRIGHTNESS, LONG_STRIP_PIXELS, LOOP_PERIOD_MS, SMALL_STRIP_PIXELS,
    };
    use crate::device_id::CLIENT_ID_MAX_LEN;
    use crate::leds::Strip;
    use crate::network::{
        manager, MqttConfig, MqttTransport, NetworkConfig, SntpClient, SntpConfig,
    };
    use crate::time::{MonoClock, RtcClock};

    struct NetworkPeripherals {
        spi: Peri<'static, peripherals::SPI2>,
        sck: Peri<'static, peripherals::PB13>,
        mosi: Peri<'static, peripherals::PB15>,
        miso: Peri<'static, peripherals::PB14>,
        cs: Peri<'static, peripherals::PC6>,
        reset: Peri<'static, peripherals::PC3>,
        int: Peri<'static, peripherals::PC2>,
        exti: Peri<'static, peripherals::EXTI2>,
        dma_tx: Peri<'static, peripherals::DMA1_CH4>,
        dma_rx: Peri<'static, peripherals::DMA1_CH3>,
    }

    /// Everything the control loop owns besides the network stack
    struct AppPeripherals {
        /// 4 pixel strip on A3
        small_spi: Peri<'static, peripherals::SPI1>,
        small_mosi: Peri<'static, peripherals::PA7>,
        /// 30 pixel strip on PB5
        long_spi: Peri<'static, peripherals::SPI3>,
        long_mosi: Peri<'static, peripherals::PB5>,
        rng: Peri<'static, peripherals::RNG>,
        rtc: Peri<'static, peripherals::RTC>,
    }

    // RNG interrupt binding for hardware random number generator
    embassy_stm32::bind_interrupts!(struct RngIrqs {
        RNG => embassy_stm32::rng::InterruptHandler<peripherals::RNG>;
    });

    #[shared]
    struct Shared {}

    #[local]
    struct Local {}

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Bottle countdown starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / 6 = 2 MHz PLL input, * 168 = 336 MHz VCO
        // VCO / 4 = 84 MHz SYSCLK, VCO / 7 = 48 MHz for the RNG
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        config.rcc.ls = LsConfig {
            rtc: embassy_stm32::rcc::RtcClockSource::LSE,
            lsi: false,
            lse: Some(LseConfig {
                frequency: Hertz(32_768),
                mode: LseMode::Oscillator(embassy_stm32::rcc::LseDrive::MediumHigh),
            }),
        };

        let p = embassy_stm32::init(config);

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        Mono::start(84_000_000);
        info!("Clocks up: SYSCLK=84MHz, TIM2 monotonic at 1 MHz");

        let net_periph = NetworkPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        let app_periph = AppPeripherals {
            small_spi: p.SPI1,
            small_mosi: p.PA7,
            long_spi: p.SPI3,
            long_mosi: p.PB5,
            rng: p.RNG,
            rtc: p.RTC,
        };

        button_task::spawn(p.PB8, p.EXTI8).ok();
        network_task::spawn(net_periph, app_periph).ok();

        (Shared {}, Local {})
    }

    /// Reset button on D9, active low
    #[task(priority = 1)]
    async fn button_task(
        _cx: button_task::Context,
        pin: Peri<'static, peripherals::PB8>,
        exti: Peri<'static, peripherals::EXTI8>,
    ) -> ! {
        let input = ExtiInput::new(pin, exti, Pull::Up);
        button::watch(input).await
    }

    /// Network task - runs the Ethernet runners and the control loop
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1)]
    async fn network_task(
        _cx: network_task::Context,
        periph: NetworkPeripherals,
        app_periph: AppPeripherals,
    ) -> ! {
        use embassy_net::{Config, StackResources};

        info!("Network task started");

        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(10_000_000); // 10 MHz for W5500

        let spi = Spi::new(
            periph.spi,
            periph.sck,
            periph.mosi,
            periph.miso,
            periph.dma_tx,
            periph.dma_rx,
            spi_config,
        );

        let eth_periph = eth::EthPeripherals {
            spi,
            cs: Output::new(periph.cs, Level::High, Speed::VeryHigh),
            reset: Output::new(periph.reset, Level::High, Speed::Low),
            int: ExtiInput::new(periph.int, periph.exti, Pull::Up),
        };

        let net_config = NetworkConfig::default();
        let (device, w5500_runner) = eth::init_w5500(eth_periph, net_config.mac_addr).await;

        static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            net_config.seed,
        );
        info!("Network stack initialized with DHCP");

        let app_logic = async {
            manager::wait_for_config(&stack).await;
            run_controller(stack, app_periph).await
        };

        join3(w5500_runner.run(), net_runner.run(), app_logic).await;
        panic!("network runners exited");
    }

    async fn run_controller(stack: embassy_net::Stack<'static>, periph: AppPeripherals) -> ! {
        let app_config = AppConfig::default();

        static CLIENT_ID: StaticCell<heapless::String<CLIENT_ID_MAX_LEN>> = StaticCell::new();
        let client_id: &'static heapless::String<CLIENT_ID_MAX_LEN> =
            match device_id::mqtt_client_id() {
                Some(id) => CLIENT_ID.init(id),
                None => panic!("device UID does not fit the client ID"),
            };

        let topic = unwrap!(format_feed_topic(app_config.username, app_config.feed_name));
        info!("Feed topic: {}", topic.as_str());

        let rng = Rng::new(periph.rng, RngIrqs);
        let transport = MqttTransport::new(stack, rng, MqttConfig::default(), client_id.as_str());

        // Each strip restarts on new-bottle events independently
        let small_anchor = Anchor::new(app_config.time_sync.tz_offset_secs);
        let long_anchor = Anchor::new(app_config.time_sync.tz_offset_secs);

        let mut feed = unwrap!(FeedClient::<_, 2>::new(transport, &topic, app_config.feed));
        unwrap!(feed.add_handler(&small_anchor, Some(is_new_bottle_event)));
        unwrap!(feed.add_handler(&long_anchor, Some(is_new_bottle_event)));

        let sntp = SntpClient::new(stack, SntpConfig::default());
        let time_sync = TimeSync::new(sntp, app_config.time_sync);
        let clock = RtcClock::new(Rtc::new(periph.rtc, RtcConfig::default()));
        let mut controller = Controller::new(time_sync, feed, clock, MonoClock, ButtonTrigger);

        let small_strip = Strip::new(
            Ws2812::new(Spi::new_blocking_txonly_nosck(
                periph.small_spi,
                periph.small_mosi,
                leds::spi_config(),
            )),
            BRIGHTNESS,
        );
        let long_strip = Strip::new(
            Ws2812::new(Spi::new_blocking_txonly_nosck(
                periph.long_spi,
                periph.long_mosi,
                leds::spi_config(),
            )),
            BRIGHTNESS,
        );

        let mut small_view =
            Countdown::<_, SMALL_STRIP_PIXELS>::new(&small_anchor, small_strip, app_config.countdown);
        let mut long_view =
            Countdown::<_, LONG_STRIP_PIXELS>::new(&long_anchor, long_strip, app_config.countdown);
        let mut views: [&mut dyn Visualizer; 2] = [&mut small_view, &mut long_view];

        info!("Entering control loop");
        loop {
            let report = controller.iterate(&mut views).await;
            if report.triggered {
                info!("Countdown restarted by button");
            }
            debug!("Iteration: {}", report);
            Mono::delay(LOOP_PERIOD_MS.millis()).await;
        }
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}
