//! CoopGate firmware entry point.
//!
//! Hexagonal architecture with a single control-loop thread.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  ServoDriver x2    StatusLed      NvsAdapter   Esp32Time       │
//! │  (ActuatorPort)    (Indicator)    (Config+NVS) (TimePort)      │
//! │  WifiAdapter       LogEventSink   HTTP server ──▶ API_BRIDGE   │
//! │  (Connectivity)    (EventSink)                                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              GateService (pure logic)                  │    │
//! │  │  Registry · Scheduler · MotionController               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyOutputPin, Output, OutputPin, PinDriver};
use esp_idf_svc::hal::ledc::config::TimerConfig;
use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use coopgate::adapters::http;
use coopgate::adapters::log_sink::LogEventSink;
use coopgate::adapters::nvs::NvsAdapter;
use coopgate::adapters::time::Esp32TimeAdapter;
use coopgate::adapters::wifi::WifiAdapter;
use coopgate::api::{self, channels::API_BRIDGE, NetInfo};
use coopgate::app::ports::{ConfigPort, ConnectivityPort, IndicatorState, StatusIndicator, TimePort};
use coopgate::app::service::GateService;
use coopgate::config::ControllerConfig;
use coopgate::drivers::servo::ServoDriver;
use coopgate::drivers::status_led::StatusLed;
use coopgate::persistence::NvsGateStore;
use coopgate::pins;

type Servo<'d> = ServoDriver<LedcDriver<'d>, PinDriver<'d, AnyOutputPin, Output>>;

/// Station credentials are baked in at build time.
const WIFI_SSID: Option<&str> = option_env!("COOPGATE_WIFI_SSID");
const WIFI_PASSWORD: Option<&str> = option_env!("COOPGATE_WIFI_PASSWORD");

/// How long the boot colour stays up before the loop takes over.
const BOOT_LED_MS: u64 = 500;

fn servo<'d>(
    pwm: LedcDriver<'d>,
    enable: impl OutputPin + 'd,
    initial: u8,
) -> Result<Servo<'d>> {
    let enable = PinDriver::output(enable.downgrade_output())?;
    ServoDriver::new(pwm, enable, initial)
        .map_err(|e| anyhow::anyhow!("servo init: {}", e))
}

fn ledc_resolution(bits: u32) -> Result<Resolution> {
    Ok(match bits {
        8 => Resolution::Bits8,
        10 => Resolution::Bits10,
        12 => Resolution::Bits12,
        14 => Resolution::Bits14,
        other => anyhow::bail!("unsupported LEDC resolution: {} bits", other),
    })
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  CoopGate v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = match nvs.as_ref().map(|n| n.load()) {
        Some(Ok(cfg)) => {
            info!("Config loaded from NVS");
            cfg
        }
        Some(Err(e)) => {
            warn!("NVS config load failed ({}), using defaults", e);
            ControllerConfig::default()
        }
        None => ControllerConfig::default(),
    };

    // ── 3. Status LED: blue while booting ─────────────────────
    let led_timer = LedcTimerDriver::new(
        peripherals.ledc.timer1,
        &TimerConfig::default()
            .frequency(Hertz(pins::LED_PWM_FREQ_HZ))
            .resolution(ledc_resolution(pins::LED_PWM_RESOLUTION_BITS)?),
    )?;
    let mut led = StatusLed::new(
        LedcDriver::new(peripherals.ledc.channel2, &led_timer, peripherals.pins.gpio25)?,
        LedcDriver::new(peripherals.ledc.channel3, &led_timer, peripherals.pins.gpio26)?,
        LedcDriver::new(peripherals.ledc.channel4, &led_timer, peripherals.pins.gpio27)?,
        config.led_brightness,
    );
    led.set_status(IndicatorState::Moving);
    info!(
        "Status LED on GPIO {}/{}/{}",
        pins::LED_R_GPIO,
        pins::LED_G_GPIO,
        pins::LED_B_GPIO
    );

    // ── 4. Servos ─────────────────────────────────────────────
    // Gates boot closed; the registry re-syncs each servo after restore.
    let servo_timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default()
            .frequency(Hertz(pins::SERVO_PWM_FREQ_HZ))
            .resolution(ledc_resolution(pins::SERVO_PWM_RESOLUTION_BITS)?),
    )?;
    let gate1 = servo(
        LedcDriver::new(peripherals.ledc.channel0, &servo_timer, peripherals.pins.gpio18)?,
        peripherals.pins.gpio19,
        config.close_pos,
    )?;
    let gate2 = servo(
        LedcDriver::new(peripherals.ledc.channel1, &servo_timer, peripherals.pins.gpio21)?,
        peripherals.pins.gpio22,
        config.close_pos,
    )?;
    info!(
        "Servos on GPIO {}/{} (enable {}/{})",
        pins::GATE1_SERVO_GPIO,
        pins::GATE2_SERVO_GPIO,
        pins::GATE1_ENABLE_GPIO,
        pins::GATE2_ENABLE_GPIO
    );

    // ── 5. Gate service + restore ─────────────────────────────
    let mut log_sink = LogEventSink::new();
    let mut service = GateService::new(config.clone(), [gate1, gate2]);
    let mut store = nvs.map(|n| NvsGateStore::new(n, service.stops()));
    match store.as_ref() {
        Some(s) => {
            service.restore_from(s, &mut log_sink);
        }
        None => warn!("Gate table not restored: no storage"),
    }

    // ── 6. Network: WiFi, SNTP, HTTP ──────────────────────────
    let time = Esp32TimeAdapter::new();
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(esp_wifi, sysloop)?);

    match (WIFI_SSID, WIFI_PASSWORD) {
        (Some(ssid), Some(password)) => {
            if let Err(e) = wifi.set_credentials(ssid, password) {
                warn!("WiFi: invalid build-time credentials: {}", e);
            } else if let Err(e) = wifi.connect(time.uptime_ms()) {
                warn!("WiFi: initial connect failed ({}), retrying in background", e);
            }
        }
        _ => warn!("WiFi: no credentials compiled in, running offline"),
    }

    let _sntp = EspSntp::new_default()?;
    let _server = http::start()?;

    std::thread::sleep(std::time::Duration::from_millis(BOOT_LED_MS));
    led.set_status(IndicatorState::Ready);

    info!("System ready. Entering control loop.");

    // ── 7. Control loop ───────────────────────────────────────
    let interval = std::time::Duration::from_millis(u64::from(config.control_loop_interval_ms));

    loop {
        let now_ms = time.uptime_ms();
        let epoch_secs = time.epoch_secs();

        wifi.poll(now_ms);

        // Commands from the HTTP task are applied here, between ticks.
        let net = NetInfo {
            connected: wifi.is_connected(),
            rssi: wifi.rssi(),
            ip: wifi.ip(),
            epoch_secs,
        };
        API_BRIDGE.serve_pending(|uri| api::handle(&mut service, uri, &net, &mut log_sink));

        service.tick(now_ms, epoch_secs, wifi.is_connected(), &mut log_sink);

        if let Some(s) = store.as_mut() {
            service.persist_if_dirty(s, now_ms, &mut log_sink);
        }

        led.set_status(service.indicator_state());

        std::thread::sleep(interval);
    }
}
