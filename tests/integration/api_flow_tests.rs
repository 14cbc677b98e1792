//! Integration tests for the HTTP command surface: request URIs travel over
//! the API bridge, the "control loop" serves them against a real
//! GateService, and replies come back to the submitting handler.

use super::mock_hw::{MockServo, RecordingSink};

use core::net::Ipv4Addr;
use core::time::Duration;

use coopgate::adapters::http;
use coopgate::api::channels::ApiBridge;
use coopgate::api::{self, ApiResponse, NetInfo, BODY_BAD_PARAMS, BODY_NOT_FOUND, BODY_OK, CONTENT_JSON};
use coopgate::app::service::GateService;
use coopgate::config::ControllerConfig;

struct Harness {
    bridge: ApiBridge,
    service: GateService<MockServo>,
    sink: RecordingSink,
    net: NetInfo,
}

impl Harness {
    fn new() -> Self {
        Self {
            bridge: ApiBridge::new(),
            service: GateService::new(
                ControllerConfig::default(),
                [MockServo::new(), MockServo::new()],
            ),
            sink: RecordingSink::new(),
            net: NetInfo {
                connected: true,
                rssi: Some(-70),
                ip: Some(Ipv4Addr::new(10, 0, 0, 9)),
                epoch_secs: Some(1_700_000_000),
            },
        }
    }

    /// One request through the bridge, served synchronously.
    fn request(&mut self, uri: &str) -> ApiResponse {
        let id = self.bridge.submit(uri).unwrap();
        let Self {
            bridge,
            service,
            sink,
            net,
        } = self;
        assert_eq!(
            bridge.serve_pending(|u| api::handle(service, u, net, sink)),
            1
        );
        self.bridge.try_take_reply(id).unwrap()
    }
}

#[test]
fn open_command_is_acknowledged_and_reflected_in_info() {
    let mut h = Harness::new();

    let resp = h.request("/api/open?g=1");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, CONTENT_JSON);
    assert_eq!(resp.body.as_str(), BODY_OK);

    let info = h.request("/api/info");
    assert_eq!(info.status, 200);
    assert!(info.body.contains(r#""gate_1":{"state":1,"schedule":0}"#));
    assert!(info.body.contains(r#""gate_2":{"state":0,"schedule":0}"#));
    assert!(info.body.contains(r#""ip":"10.0.0.9""#));
}

#[test]
fn setdate_then_cleardate_round_trips_through_info() {
    let mut h = Harness::new();

    assert_eq!(h.request("/api/setdate?g=2&t=1700003600").status, 200);
    let info = h.request("/api/info");
    assert!(info.body.contains(r#""gate_2":{"state":0,"schedule":1700003600}"#));

    assert_eq!(h.request("/api/cleardate?g=2").status, 200);
    let info = h.request("/api/info");
    assert!(info.body.contains(r#""gate_2":{"state":0,"schedule":0}"#));
}

#[test]
fn bad_parameters_return_400_without_touching_gates() {
    let mut h = Harness::new();
    let before = h.service.gate_statuses();

    for uri in [
        "/api/open",
        "/api/open?g=3",
        "/api/close?g=0",
        "/api/close?g=abc",
        "/api/setdate?g=1",
        "/api/setdate?g=1&t=0",
        "/api/cleardate?g=9",
    ] {
        let resp = h.request(uri);
        assert_eq!(resp.status, 400, "{}", uri);
        assert_eq!(resp.body.as_str(), BODY_BAD_PARAMS);
    }

    assert_eq!(h.service.gate_statuses(), before);
    assert!(h.sink.events.is_empty());
}

#[test]
fn unknown_path_is_404() {
    let mut h = Harness::new();
    let resp = h.request("/favicon.ico");
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body.as_str(), BODY_NOT_FOUND);
}

#[test]
fn stale_reply_does_not_reach_the_next_handler() {
    let mut h = Harness::new();

    // A handler that gave up waiting: its request is still executed.
    let _abandoned = h.bridge.submit("/api/open?g=1").unwrap();
    let id = h.bridge.submit("/api/info").unwrap();

    let Harness {
        bridge,
        service,
        sink,
        net,
    } = &mut h;
    assert_eq!(
        bridge.serve_pending(|u| api::handle(service, u, net, sink)),
        2
    );

    let resp = h.bridge.try_take_reply(id).unwrap();
    assert!(resp.body.starts_with(r#"{"RSSI":-70"#));
    assert!(resp.body.contains(r#""gate_1":{"state":1"#));
    assert_eq!(h.bridge.try_take_reply(id), None);
}

#[test]
fn request_answered_busy_never_moves_the_gate() {
    let mut h = Harness::new();
    let before = h.service.gate_statuses();

    // Control loop stalled: the handler times out and answers 503.
    let resp = http::exchange(&h.bridge, "/api/open?g=1", Duration::from_millis(5));
    assert_eq!(resp.status, 503);

    let Harness {
        bridge,
        service,
        sink,
        net,
    } = &mut h;
    assert_eq!(
        bridge.serve_pending(|u| api::handle(service, u, net, sink)),
        0
    );
    assert_eq!(h.service.gate_statuses(), before);
    assert!(h.sink.events.is_empty());
    assert!(h.service.registry().lookup(1).unwrap().actuator().calls.is_empty());
}
