//! HTTP command surface.
//!
//! Parses request URIs into [`ApiCall`]s and renders [`ApiResponse`]s.  The
//! network layer never touches gate state: it forwards raw URIs over
//! [`channels`] and the control loop calls [`handle`] between ticks.
//!
//! | Path             | Params     | Effect                          |
//! |------------------|------------|---------------------------------|
//! | `/api/info`      | none       | JSON status                     |
//! | `/api/open`      | `g`        | move gate `g` to open           |
//! | `/api/close`     | `g`        | move gate `g` to closed         |
//! | `/api/setdate`   | `g`, `t`   | arm auto-open at epoch `t`      |
//! | `/api/cleardate` | `g`        | clear gate `g`'s schedule       |
//!
//! The dashboard (`/`, `/style.css`, `/script.js`) lives in [`assets`].

pub mod assets;
pub mod channels;

use core::fmt::Write as _;
use core::net::Ipv4Addr;

use log::{debug, warn};
use serde::Serialize;

use crate::app::commands::GateCommand;
use crate::app::events::GateStatus;
use crate::app::ports::{ActuatorPort, EventSink};
use crate::app::service::GateService;
use crate::error::Error;

pub const CONTENT_JSON: &str = "application/json";
pub const CONTENT_TEXT: &str = "text/plain";

pub const BODY_OK: &str = "OK";
pub const BODY_BAD_PARAMS: &str = "Missing/invalid parameter(s)";
pub const BODY_NOT_FOUND: &str = "Not found";

/// Capacity of a response body.
pub const BODY_CAPACITY: usize = 256;

/// A parsed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCall {
    Info,
    Command(GateCommand),
}

/// Why a request could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiReject {
    /// Unknown path.
    NotFound,
    /// Known path, missing or malformed parameter.
    BadRequest(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: heapless::String<BODY_CAPACITY>,
}

impl ApiResponse {
    fn new(status: u16, content_type: &'static str, body: &str) -> Self {
        let mut s = heapless::String::new();
        // Every fixed body fits; a longer one is cut rather than dropped.
        for c in body.chars() {
            if s.push(c).is_err() {
                break;
            }
        }
        Self {
            status,
            content_type,
            body: s,
        }
    }

    pub fn ok() -> Self {
        Self::new(200, CONTENT_JSON, BODY_OK)
    }

    pub fn bad_request() -> Self {
        Self::new(400, CONTENT_JSON, BODY_BAD_PARAMS)
    }

    pub fn not_found() -> Self {
        Self::new(404, CONTENT_TEXT, BODY_NOT_FOUND)
    }

    pub fn internal_error() -> Self {
        Self::new(500, CONTENT_TEXT, "Internal error")
    }

    /// The control loop did not take the request in time.
    pub fn busy() -> Self {
        Self::new(503, CONTENT_TEXT, "Busy")
    }
}

/// Network facts reported by `/api/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetInfo {
    pub connected: bool,
    pub rssi: Option<i8>,
    pub ip: Option<Ipv4Addr>,
    /// Wall clock in epoch seconds, `None` until synchronised.
    pub epoch_secs: Option<u64>,
}

// ───────────────────────────────────────────────────────────────
// Parsing
// ───────────────────────────────────────────────────────────────

/// Look up a query parameter by name.  The first occurrence wins.
fn param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn parse_gate(query: &str) -> Result<u8, ApiReject> {
    param(query, "g")
        .and_then(|v| v.parse::<u8>().ok())
        .ok_or(ApiReject::BadRequest("g"))
}

fn parse_time(query: &str) -> Result<u64, ApiReject> {
    param(query, "t")
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or(ApiReject::BadRequest("t"))
}

/// Parse a request URI (`/path?query`).
///
/// Gate ids are only checked for being numeric here; range validation is
/// the service's job so that it happens before any gate is touched.
pub fn parse(uri: &str) -> Result<ApiCall, ApiReject> {
    let (path, query) = uri.split_once('?').unwrap_or((uri, ""));

    let call = match path {
        "/api/info" => ApiCall::Info,
        "/api/open" => ApiCall::Command(GateCommand::Open {
            gate: parse_gate(query)?,
        }),
        "/api/close" => ApiCall::Command(GateCommand::Close {
            gate: parse_gate(query)?,
        }),
        "/api/setdate" => {
            let at = parse_time(query)?;
            ApiCall::Command(GateCommand::SetSchedule {
                gate: parse_gate(query)?,
                at,
            })
        }
        "/api/cleardate" => ApiCall::Command(GateCommand::ClearSchedule {
            gate: parse_gate(query)?,
        }),
        _ => return Err(ApiReject::NotFound),
    };
    Ok(call)
}

// ───────────────────────────────────────────────────────────────
// Info document
// ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GateInfo {
    state: u8,
    schedule: u64,
}

#[derive(Serialize)]
struct InfoDoc {
    #[serde(rename = "RSSI")]
    rssi: i8,
    ip: heapless::String<15>,
    time: u64,
    connected: bool,
    gate_1: GateInfo,
    gate_2: GateInfo,
}

/// Render the `/api/info` JSON document.
pub fn render_info(net: &NetInfo, gates: &[GateStatus; 2]) -> ApiResponse {
    let mut ip = heapless::String::<15>::new();
    // "255.255.255.255" is exactly 15 bytes.
    if write!(ip, "{}", net.ip.unwrap_or(Ipv4Addr::UNSPECIFIED)).is_err() {
        return ApiResponse::internal_error();
    }

    let doc = InfoDoc {
        rssi: net.rssi.unwrap_or(0),
        ip,
        time: net.epoch_secs.unwrap_or(0),
        connected: net.connected,
        gate_1: GateInfo {
            state: gates[0].state,
            schedule: gates[0].schedule,
        },
        gate_2: GateInfo {
            state: gates[1].state,
            schedule: gates[1].schedule,
        },
    };

    match serde_json::to_string(&doc) {
        Ok(json) if json.len() <= BODY_CAPACITY => ApiResponse::new(200, CONTENT_JSON, &json),
        Ok(json) => {
            warn!("API: info document too large ({} bytes)", json.len());
            ApiResponse::internal_error()
        }
        Err(e) => {
            warn!("API: info serialisation failed: {}", e);
            ApiResponse::internal_error()
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Dispatch
// ───────────────────────────────────────────────────────────────

/// Parse and execute one request against the service.  Must run on the
/// control-loop thread.
pub fn handle<A: ActuatorPort>(
    service: &mut GateService<A>,
    uri: &str,
    net: &NetInfo,
    sink: &mut impl EventSink,
) -> ApiResponse {
    let call = match parse(uri) {
        Ok(call) => call,
        Err(ApiReject::NotFound) => {
            debug!("API: 404 {}", uri);
            return ApiResponse::not_found();
        }
        Err(ApiReject::BadRequest(param)) => {
            debug!("API: 400 {} (bad '{}')", uri, param);
            return ApiResponse::bad_request();
        }
    };

    match call {
        ApiCall::Info => render_info(net, &service.gate_statuses()),
        ApiCall::Command(cmd) => match service.handle_command(cmd, sink) {
            Ok(()) => ApiResponse::ok(),
            Err(Error::InvalidGateId(_) | Error::MissingOrInvalidParameter(_)) => {
                ApiResponse::bad_request()
            }
            Err(e) => {
                warn!("API: {:?} failed: {}", cmd, e);
                ApiResponse::internal_error()
            }
        },
    }
}
