//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to               |
//! |------------|--------------------|---------------------------|
//! | `http`     | (API bridge)       | ESP-IDF HTTP server       |
//! | `log_sink` | EventSink          | Serial log output         |
//! | `nvs`      | ConfigPort         | NVS / in-memory store     |
//! |            | StoragePort        |                           |
//! | `time`     | TimePort           | ESP32 timer + SNTP clock  |
//! | `wifi`     | ConnectivityPort   | ESP-IDF WiFi STA          |
//!
//! Servo and LED drivers live in [`crate::drivers`]; they implement
//! `ActuatorPort` and `StatusIndicator` over `embedded-hal` traits.

pub mod http;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
