//! Hobby servo driver.
//!
//! One PWM channel carries the position pulse, one GPIO switches the
//! servo's power rail through a P-channel high-side switch (active LOW).
//!
//! Generic over the `embedded-hal` 1.0 traits so the same driver runs on
//! LEDC channels on the device and on recording mocks in host tests.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::debug;

use crate::app::ports::ActuatorPort;
use crate::error::ActuatorError;

/// Servo frame period at 50 Hz.
pub const PERIOD_US: u16 = 20_000;
/// Pulse width at 0 degrees.
pub const MIN_PULSE_US: u16 = 500;
/// Pulse width at [`MAX_ANGLE`].
pub const MAX_PULSE_US: u16 = 2_500;
pub const MAX_ANGLE: u8 = 180;

/// Pulse width for an angle, clamped to the servo's mechanical range.
pub fn pulse_width_us(angle: u8) -> u16 {
    let angle = u32::from(angle.min(MAX_ANGLE));
    let span = u32::from(MAX_PULSE_US - MIN_PULSE_US);
    MIN_PULSE_US + (angle * span / u32::from(MAX_ANGLE)) as u16
}

pub struct ServoDriver<P, E> {
    pwm: P,
    enable: E,
    position: u8,
    powered: bool,
}

impl<P: SetDutyCycle, E: OutputPin> ServoDriver<P, E> {
    /// Wrap a PWM channel and power-enable pin.  The rail starts off and the
    /// driver assumes the servo rests at `initial` until told otherwise.
    pub fn new(pwm: P, mut enable: E, initial: u8) -> Result<Self, ActuatorError> {
        enable.set_high().map_err(|_| ActuatorError::PowerRailFailed)?;
        Ok(Self {
            pwm,
            enable,
            position: initial.min(MAX_ANGLE),
            powered: false,
        })
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn into_inner(self) -> (P, E) {
        (self.pwm, self.enable)
    }

    fn write_pulse(&mut self, angle: u8) -> Result<(), ActuatorError> {
        self.pwm
            .set_duty_cycle_fraction(pulse_width_us(angle), PERIOD_US)
            .map_err(|_| ActuatorError::PwmWriteFailed)
    }
}

impl<P: SetDutyCycle, E: OutputPin> ActuatorPort for ServoDriver<P, E> {
    fn enable(&mut self) -> Result<(), ActuatorError> {
        // Hold the last position so the horn does not jump on power-up.
        self.write_pulse(self.position)?;
        self.enable
            .set_low()
            .map_err(|_| ActuatorError::PowerRailFailed)?;
        self.powered = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), ActuatorError> {
        self.enable
            .set_high()
            .map_err(|_| ActuatorError::PowerRailFailed)?;
        self.powered = false;
        // No pulse while unpowered; a failure here is harmless.
        if self.pwm.set_duty_cycle_fully_off().is_err() {
            debug!("servo: PWM off failed after power-down");
        }
        Ok(())
    }

    fn drive_to(&mut self, position: u8) -> Result<(), ActuatorError> {
        let position = position.min(MAX_ANGLE);
        self.write_pulse(position)?;
        self.position = position;
        Ok(())
    }

    fn current_position(&self) -> u8 {
        self.position
    }

    fn assume_position(&mut self, position: u8) {
        self.position = position.min(MAX_ANGLE);
    }
}
