//! HTTP server adapter.
//!
//! Dashboard files are answered from flash.  Every other `GET` is forwarded
//! as a raw URI over the [`API_BRIDGE`](crate::api::channels::API_BRIDGE);
//! the handler then waits (bounded) for the control loop's reply.  The
//! server task never touches gate state itself.

use core::time::Duration;

use log::warn;

use crate::api::channels::{ApiBridge, SubmitError};
use crate::api::ApiResponse;

/// How long a handler waits for the control loop before answering 503.
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Submit `uri` and wait for its reply.  Falls back to `503` when the queue
/// is full or the control loop does not answer in time; a request answered
/// `503` is withdrawn and never executed.
pub fn exchange(bridge: &ApiBridge, uri: &str, timeout: Duration) -> ApiResponse {
    let id = match bridge.submit(uri) {
        Ok(id) => id,
        Err(SubmitError::UriTooLong) => return ApiResponse::bad_request(),
        Err(e @ SubmitError::Busy) => {
            warn!("HTTP: {} ({})", e, uri);
            return ApiResponse::busy();
        }
    };

    if let Some(response) = wait_for_reply(bridge, id, timeout) {
        return response;
    }
    if bridge.abandon(id) {
        warn!("HTTP: no reply for request {} ({}), withdrawn", id, uri);
        return ApiResponse::busy();
    }
    // Already being executed: the answer must reflect it.
    wait_for_reply(bridge, id, timeout).unwrap_or_else(|| {
        warn!("HTTP: reply for request {} ({}) lost", id, uri);
        ApiResponse::busy()
    })
}

fn wait_for_reply(bridge: &ApiBridge, id: u32, timeout: Duration) -> Option<ApiResponse> {
    let mut waited = Duration::ZERO;
    loop {
        if let Some(response) = bridge.try_take_reply(id) {
            return Some(response);
        }
        if waited >= timeout {
            return None;
        }
        std::thread::sleep(POLL_INTERVAL);
        waited += POLL_INTERVAL;
    }
}

/// Start the HTTP server on port 80.  The returned server must be kept
/// alive for as long as requests should be served.
#[cfg(target_os = "espidf")]
pub fn start() -> anyhow::Result<esp_idf_svc::http::server::EspHttpServer<'static>> {
    use esp_idf_svc::http::server::{Configuration, EspHttpServer};
    use esp_idf_svc::http::Method;
    use esp_idf_svc::io::Write;

    use crate::api::assets;
    use crate::api::channels::API_BRIDGE;

    let mut server = EspHttpServer::new(&Configuration {
        uri_match_wildcard: true,
        ..Default::default()
    })?;

    server.fn_handler::<anyhow::Error, _>("/*", Method::Get, |req| {
        if let Some(asset) = assets::find(req.uri()) {
            let mut resp =
                req.into_response(200, None, &[("Content-Type", asset.content_type)])?;
            resp.write_all(asset.body.as_bytes())?;
            return Ok(());
        }

        let response = exchange(&API_BRIDGE, req.uri(), REPLY_TIMEOUT);
        let mut resp = req.into_response(
            response.status,
            None,
            &[("Content-Type", response.content_type)],
        )?;
        resp.write_all(response.body.as_bytes())?;
        Ok(())
    })?;

    log::info!("HTTP: server listening on :80");
    Ok(server)
}
