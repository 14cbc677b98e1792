//! Request/reply channels between the HTTP server and the control loop.
//!
//! Uses `embassy-sync` bounded channels so the server task can hand raw
//! request URIs to the synchronous control loop without sharing gate state.
//! The control loop drains requests between ticks, so command handling and
//! tick processing never interleave.
//!
//! A handler that stops waiting calls [`ApiBridge::abandon`].  If the
//! control loop has not taken the request yet it is skipped, so a client
//! that saw `503` never has its command applied later.
//!
//! ```text
//! ┌──────────────┐  ApiRequest  ┌──────────────┐
//! │ HTTP handler │────────────▶│ Control Loop  │
//! │ (httpd task) │◀────────────│ (main thread) │
//! └──────────────┘   ApiReply   └──────────────┘
//! ```

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use super::ApiResponse;

/// Longest request URI accepted (path + query).
pub const URI_CAPACITY: usize = 128;

/// Channel depth for requests (inbound) and replies (outbound).
const DEPTH: usize = 4;
/// Replies queued plus the one being built.
const TAKEN_CAPACITY: usize = DEPTH + 1;

/// Inbound request, delivered to the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Correlates the reply with the waiting handler.
    pub id: u32,
    pub uri: heapless::String<URI_CAPACITY>,
}

/// Outbound reply, delivered to the handler that submitted `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub id: u32,
    pub response: ApiResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// URI longer than [`URI_CAPACITY`].
    UriTooLong,
    /// Request channel full; the control loop is behind.
    Busy,
}

impl core::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UriTooLong => write!(f, "request URI too long"),
            Self::Busy => write!(f, "request queue full"),
        }
    }
}

/// Request ids in flight between the two sides.
struct Pending {
    /// Still queued, but their handler has given up.
    abandoned: heapless::Vec<u32, DEPTH>,
    /// Taken by the control loop; the reply is being built or is queued.
    taken: heapless::Vec<u32, TAKEN_CAPACITY>,
}

impl Pending {
    const fn new() -> Self {
        Self {
            abandoned: heapless::Vec::new(),
            taken: heapless::Vec::new(),
        }
    }
}

/// Push onto a bounded id list, evicting the oldest entry when full.
fn push_evicting<const N: usize>(ids: &mut heapless::Vec<u32, N>, id: u32) {
    if ids.is_full() {
        ids.remove(0);
    }
    if ids.push(id).is_err() {
        warn!("API: id list full, request {} untracked", id);
    }
}

/// Remove `id` from a list, reporting whether it was there.
fn forget<const N: usize>(ids: &mut heapless::Vec<u32, N>, id: u32) -> bool {
    match ids.iter().position(|&i| i == id) {
        Some(pos) => {
            ids.swap_remove(pos);
            true
        }
        None => false,
    }
}

/// The pair of channels plus a request-id counter.
pub struct ApiBridge {
    requests: Channel<CriticalSectionRawMutex, ApiRequest, DEPTH>,
    replies: Channel<CriticalSectionRawMutex, ApiReply, DEPTH>,
    pending: Mutex<CriticalSectionRawMutex, RefCell<Pending>>,
    next_id: AtomicU32,
}

/// The bridge shared by the HTTP server and the control loop.
pub static API_BRIDGE: ApiBridge = ApiBridge::new();

impl Default for ApiBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiBridge {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            replies: Channel::new(),
            pending: Mutex::new(RefCell::new(Pending::new())),
            next_id: AtomicU32::new(1),
        }
    }

    // ── Server side ───────────────────────────────────────────

    /// Queue a request URI for the control loop.  Returns the id to wait
    /// on with [`try_take_reply`](Self::try_take_reply).
    pub fn submit(&self, uri: &str) -> Result<u32, SubmitError> {
        let uri = heapless::String::try_from(uri).map_err(|_| SubmitError::UriTooLong)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests
            .try_send(ApiRequest { id, uri })
            .map_err(|_| SubmitError::Busy)?;
        Ok(id)
    }

    /// Take the reply for `id` if it has arrived.  Replies for other ids
    /// (left over from handlers that gave up waiting) are discarded.
    pub fn try_take_reply(&self, id: u32) -> Option<ApiResponse> {
        while let Ok(reply) = self.replies.try_receive() {
            self.pending.lock(|p| forget(&mut p.borrow_mut().taken, reply.id));
            if reply.id == id {
                return Some(reply.response);
            }
            debug!("API: dropping stale reply {}", reply.id);
        }
        None
    }

    /// Stop waiting for `id`.  Returns `true` if the request will never be
    /// executed, `false` if the control loop already took it (its reply
    /// is still coming).
    pub fn abandon(&self, id: u32) -> bool {
        self.pending.lock(|p| {
            let mut p = p.borrow_mut();
            if p.taken.contains(&id) {
                return false;
            }
            push_evicting(&mut p.abandoned, id);
            true
        })
    }

    // ── Control-loop side ─────────────────────────────────────

    /// Handle every queued request with `handler`, posting each reply.
    /// Abandoned requests are skipped.  Returns how many requests were
    /// served.
    pub fn serve_pending(&self, mut handler: impl FnMut(&str) -> ApiResponse) -> usize {
        let mut served = 0;
        while let Ok(req) = self.requests.try_receive() {
            let skip = self.pending.lock(|p| {
                let mut p = p.borrow_mut();
                if forget(&mut p.abandoned, req.id) {
                    return true;
                }
                push_evicting(&mut p.taken, req.id);
                false
            });
            if skip {
                debug!("API: skipping abandoned request {} ({})", req.id, req.uri);
                continue;
            }

            let response = handler(req.uri.as_str());
            if self
                .replies
                .try_send(ApiReply {
                    id: req.id,
                    response,
                })
                .is_err()
            {
                warn!("API: reply channel full, dropping reply {}", req.id);
                self.pending.lock(|p| forget(&mut p.borrow_mut().taken, req.id));
            }
            served += 1;
        }
        served
    }
}
