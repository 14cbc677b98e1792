//! RGB status LED driver.
//!
//! Three PWM channels drive a common-cathode RGB LED.  Colours are scaled
//! by a global brightness (0-255) so the LED stays readable without
//! lighting up the coop at night.

use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::{IndicatorState, StatusIndicator};

/// Full-intensity colour for each indicator state.
pub fn colour_for(state: IndicatorState) -> (u8, u8, u8) {
    match state {
        IndicatorState::Ready => (0, 255, 0),
        IndicatorState::Moving => (0, 0, 255),
        IndicatorState::Fault => (255, 0, 0),
    }
}

fn scale(level: u8, brightness: u8) -> u8 {
    ((u16::from(level) * u16::from(brightness)) / 255) as u8
}

pub struct StatusLed<R, G, B> {
    red: R,
    green: G,
    blue: B,
    brightness: u8,
    current: (u8, u8, u8),
    shown: Option<IndicatorState>,
}

impl<R: SetDutyCycle, G: SetDutyCycle, B: SetDutyCycle> StatusLed<R, G, B> {
    pub fn new(red: R, green: G, blue: B, brightness: u8) -> Self {
        Self {
            red,
            green,
            blue,
            brightness,
            current: (0, 0, 0),
            shown: None,
        }
    }

    /// Write a raw colour, scaled by brightness.  A channel that fails to
    /// update is logged and skipped; the LED is informational only.
    pub fn set_colour(&mut self, r: u8, g: u8, b: u8) {
        let (r, g, b) = (
            scale(r, self.brightness),
            scale(g, self.brightness),
            scale(b, self.brightness),
        );
        let ok = self.red.set_duty_cycle_fraction(u16::from(r), 255).is_ok()
            & self.green.set_duty_cycle_fraction(u16::from(g), 255).is_ok()
            & self.blue.set_duty_cycle_fraction(u16::from(b), 255).is_ok();
        if !ok {
            warn!("status_led: PWM write failed");
        }
        self.current = (r, g, b);
    }

    pub fn off(&mut self) {
        self.set_colour(0, 0, 0);
        self.shown = None;
    }

    /// Last scaled colour written.
    pub fn current_colour(&self) -> (u8, u8, u8) {
        self.current
    }
}

impl<R: SetDutyCycle, G: SetDutyCycle, B: SetDutyCycle> StatusIndicator for StatusLed<R, G, B> {
    fn set_status(&mut self, state: IndicatorState) {
        // Called every loop pass; only touch the PWM on a change.
        if self.shown == Some(state) {
            return;
        }
        let (r, g, b) = colour_for(state);
        self.set_colour(r, g, b);
        self.shown = Some(state);
    }
}
