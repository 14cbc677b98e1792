//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged since boot.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started { restored } => {
                info!("START | restored={}", restored);
            }
            AppEvent::MoveRequested {
                gate,
                target,
                request,
            } => {
                info!("MOVE  | gate={} target={:?} ({:?})", gate, target, request);
            }
            AppEvent::Arrived { gate, aborted } => {
                info!("ARRIV | gate={} aborted={}", gate, aborted);
            }
            AppEvent::PoweredDown { gate } => {
                info!("POWER | gate={} off", gate);
            }
            AppEvent::ScheduleSet { gate, at } => {
                info!("SCHED | gate={} set at={}", gate, at);
            }
            AppEvent::ScheduleCleared { gate } => {
                info!("SCHED | gate={} cleared", gate);
            }
            AppEvent::ScheduleFired { gate, at } => {
                info!("SCHED | gate={} fired at={}", gate, at);
            }
            AppEvent::GateFault { gate, error } => {
                warn!("FAULT | gate={} {}", gate, error);
            }
            AppEvent::StateSaved => {
                info!("SAVE  | gate table written");
            }
            AppEvent::SaveFailed(e) => {
                warn!("SAVE  | failed: {}", e);
            }
        }
    }
}
