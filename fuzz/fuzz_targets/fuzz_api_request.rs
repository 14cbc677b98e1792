//! Fuzz target: HTTP request URI parser and dispatcher
//!
//! Parses arbitrary URIs and, when they parse, executes them against a
//! service with no-op servos.  Verifies:
//! - No panics under arbitrary (UTF-8) input
//! - Responses are always one of 200 / 400 / 404
//! - Gate ids outside 1..=2 are never accepted
//!
//! cargo fuzz run fuzz_api_request

#![no_main]

use coopgate::api::{self, ApiCall, NetInfo};
use coopgate::app::events::AppEvent;
use coopgate::app::ports::{ActuatorPort, EventSink};
use coopgate::app::service::GateService;
use coopgate::config::ControllerConfig;
use coopgate::error::ActuatorError;
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct NullServo;

impl ActuatorPort for NullServo {
    fn enable(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
    fn disable(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
    fn drive_to(&mut self, _position: u8) -> Result<(), ActuatorError> {
        Ok(())
    }
    fn current_position(&self) -> u8 {
        0
    }
    fn assume_position(&mut self, _position: u8) {}
}

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

const NET: NetInfo = NetInfo {
    connected: false,
    rssi: None,
    ip: None,
    epoch_secs: None,
};

fuzz_target!(|data: &[u8]| {
    let Ok(uri) = core::str::from_utf8(data) else {
        return;
    };

    let parsed = api::parse(uri);
    let mut service = GateService::new(ControllerConfig::default(), [NullServo, NullServo]);
    let resp = api::handle(&mut service, uri, &NET, &mut NullSink);

    match parsed {
        Ok(ApiCall::Command(cmd)) if !(1..=2).contains(&cmd.gate()) => {
            assert_eq!(resp.status, 400);
        }
        Ok(_) => assert!(resp.status == 200 || resp.status == 400),
        Err(_) => assert!(resp.status == 400 || resp.status == 404),
    }
});
