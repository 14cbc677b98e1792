//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the read-only link view the control
//! loop consults for `/api/info` and the abort-on-disconnect option.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! On disconnect the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) between reconnect attempts.  Attempts are
//! non-blocking so the control loop keeps ticking while the link is down.

use core::fmt;
use core::net::Ipv4Addr;
use log::{error, info, warn};

use crate::app::ports::ConnectivityPort;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoCredentials => "no station credentials",
            Self::InvalidSsid => "SSID must be 1-32 printable ASCII bytes",
            Self::InvalidPassword => "passphrase must be empty (open AP) or 8-64 bytes",
            Self::ConnectionFailed => "association with AP failed",
            Self::AlreadyConnected => "station already associated",
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, next_at_ms: u64 },
}

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    let printable = ssid.bytes().all(|b| b.is_ascii_graphic() || b == b' ');
    if (1..=32).contains(&ssid.len()) && printable {
        Ok(())
    } else {
        Err(WifiError::InvalidSsid)
    }
}

/// Empty means an open network; otherwise WPA2 needs 8-64 bytes.
fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() || (8..=64).contains(&password.len()) {
        Ok(())
    } else {
        Err(WifiError::InvalidPassword)
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
    last_rssi: Option<i8>,
    last_ip: Option<Ipv4Addr>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: whether the (fake) AP is reachable.
    #[cfg(not(target_os = "espidf"))]
    sim_link: bool,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            last_rssi: None,
            last_ip: None,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            last_rssi: None,
            last_ip: None,
            sim_link: true,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Store station credentials for the next [`connect`](Self::connect).
    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid = heapless::String::try_from(ssid).map_err(|_| WifiError::InvalidSsid)?;
        self.password =
            heapless::String::try_from(password).map_err(|_| WifiError::InvalidPassword)?;
        info!("WiFi: station credentials set for '{}'", self.ssid);
        Ok(())
    }

    /// Initial (blocking) connection at boot.  On failure the adapter moves
    /// to `Reconnecting` and [`poll`](Self::poll) keeps trying.
    pub fn connect(&mut self, now_ms: u64) -> Result<(), WifiError> {
        if self.ssid.is_empty() {
            return Err(WifiError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(WifiError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        self.state = WifiState::Connecting;

        match self.platform_connect() {
            Ok(()) => {
                self.on_connected();
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.schedule_retry(0, now_ms);
                Err(e)
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        self.last_rssi = None;
        self.last_ip = None;
        info!("WiFi: disconnected");
    }

    /// Track link changes and drive reconnect attempts.  Call once per
    /// control-loop iteration; never blocks.
    pub fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Reconnecting { attempt, next_at_ms } => {
                if self.platform_is_connected() {
                    self.on_connected();
                    return;
                }
                if now_ms < next_at_ms {
                    return;
                }
                info!("WiFi: reconnect attempt {} (backoff {}s)", attempt + 1, self.backoff_secs);
                self.platform_begin_reconnect();
                self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                self.schedule_retry(attempt + 1, now_ms);
            }
            WifiState::Connected => {
                if self.platform_is_connected() {
                    self.last_rssi = self.platform_rssi();
                } else {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.last_rssi = None;
                    self.last_ip = None;
                    self.backoff_secs = INITIAL_BACKOFF_SECS;
                    self.schedule_retry(0, now_ms);
                }
            }
            WifiState::Disconnected | WifiState::Connecting => {}
        }
    }

    fn on_connected(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_secs = INITIAL_BACKOFF_SECS;
        self.last_rssi = self.platform_rssi();
        self.last_ip = self.platform_ip();
        info!("WiFi: connected (ip={:?}, RSSI={:?})", self.last_ip, self.last_rssi);
    }

    fn schedule_retry(&mut self, attempt: u32, now_ms: u64) {
        self.state = WifiState::Reconnecting {
            attempt,
            next_at_ms: now_ms + u64::from(self.backoff_secs) * 1_000,
        };
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        let config = Configuration::Client(ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| WifiError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| WifiError::InvalidPassword)?,
            auth_method: if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });

        self.start_station(&config).map_err(|e| {
            warn!("WiFi(espidf): {}", e);
            WifiError::ConnectionFailed
        })
    }

    #[cfg(target_os = "espidf")]
    fn start_station(&mut self, config: &Configuration) -> Result<(), esp_idf_svc::sys::EspError> {
        self.wifi.set_configuration(config)?;
        self.wifi.start()?;
        self.wifi.connect()?;
        self.wifi.wait_netif_up()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        if !self.sim_link {
            warn!("WiFi(sim): AP unreachable");
            return Err(WifiError::ConnectionFailed);
        }
        info!("WiFi(sim): connected to '{}'", self.ssid);
        Ok(())
    }

    /// Kick off a reconnect without waiting for the result.
    #[cfg(target_os = "espidf")]
    fn platform_begin_reconnect(&mut self) {
        if let Err(e) = self.wifi.wifi_mut().connect() {
            warn!("WiFi(espidf): reconnect request failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin_reconnect(&mut self) {}

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi(espidf): disconnect failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("WiFi(sim): disconnected");
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link && self.state != WifiState::Disconnected
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        // SAFETY: plain out-parameter query; the record is zero-initialised.
        let mut ap_info: esp_idf_svc::sys::wifi_ap_record_t = unsafe { core::mem::zeroed() };
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK as i32).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        self.sim_link.then_some(-60)
    }

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        self.sim_link.then_some(Ipv4Addr::new(192, 168, 4, 2))
    }

    /// Simulation: make the fake AP reachable or not.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_link(&mut self, up: bool) {
        self.sim_link = up;
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    fn rssi(&self) -> Option<i8> {
        self.last_rssi
    }

    fn ip(&self) -> Option<Ipv4Addr> {
        self.last_ip
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
