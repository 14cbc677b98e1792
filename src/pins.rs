//! GPIO / peripheral pin assignments for the CoopGate controller board.
//!
//! `main` takes the matching `peripherals.pins.gpioN` fields and builds
//! its LEDC timers from the PWM constants below.

// ---------------------------------------------------------------------------
// Gate 1 servo
// ---------------------------------------------------------------------------

/// LEDC PWM output carrying the servo pulse.
pub const GATE1_SERVO_GPIO: i32 = 18;
/// Digital output: servo power rail switch (active LOW).
pub const GATE1_ENABLE_GPIO: i32 = 19;

// ---------------------------------------------------------------------------
// Gate 2 servo
// ---------------------------------------------------------------------------

pub const GATE2_SERVO_GPIO: i32 = 21;
pub const GATE2_ENABLE_GPIO: i32 = 22;

// ---------------------------------------------------------------------------
// Status LED (discrete RGB, common cathode)
// ---------------------------------------------------------------------------

pub const LED_R_GPIO: i32 = 25;
pub const LED_G_GPIO: i32 = 26;
pub const LED_B_GPIO: i32 = 27;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// Standard hobby-servo frame rate.
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// LEDC timer resolution for the servos.  14 bits at 50 Hz gives ~1.2 us
/// per step, well below one degree.
pub const SERVO_PWM_RESOLUTION_BITS: u32 = 14;
/// LEDC frequency for the RGB status LED (1 kHz).
pub const LED_PWM_FREQ_HZ: u32 = 1_000;
/// LEDC timer resolution for the LED.  8-bit gives 0 - 255 duty levels.
pub const LED_PWM_RESOLUTION_BITS: u32 = 8;
