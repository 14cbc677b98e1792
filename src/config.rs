//! Controller configuration parameters
//!
//! All tunable parameters for the gate controller.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    // --- Positions ---
    /// Servo angle (degrees) of a fully open gate
    pub open_pos: u8,
    /// Servo angle (degrees) of a fully closed gate
    pub close_pos: u8,

    // --- Stepping ---
    /// Degrees advanced per motion step
    pub step_increment: u8,
    /// Minimum time between two motion steps (milliseconds)
    pub step_interval_ms: u32,
    /// Power stays on this long after arrival so the servo can settle (milliseconds)
    pub settle_ms: u32,
    /// Snap to target and cut power when the network link drops
    pub abort_on_disconnect: bool,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Delay before retrying a failed state save (milliseconds)
    pub persist_retry_ms: u32,

    // --- Status LED ---
    /// Status LED brightness (0-255)
    pub led_brightness: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Positions
            open_pos: 0,
            close_pos: 170,

            // Stepping
            step_increment: 3,
            step_interval_ms: 10,
            settle_ms: 100,
            abort_on_disconnect: false,

            // Timing
            control_loop_interval_ms: 5,
            persist_retry_ms: 5000,

            // Status LED
            led_brightness: 20,
        }
    }
}

impl ControllerConfig {
    /// Full travel between the two end positions, in degrees.
    pub fn travel(&self) -> u8 {
        self.open_pos.abs_diff(self.close_pos)
    }

    /// Upper bound on the number of motion ticks needed to cross the full
    /// travel: `ceil(travel / step_increment)`.
    pub fn max_steps(&self) -> u32 {
        let inc = u32::from(self.step_increment.max(1));
        u32::from(self.travel()).div_ceil(inc)
    }
}
