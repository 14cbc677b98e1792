//! Peripheral drivers built on `embedded-hal` traits.

pub mod servo;
pub mod status_led;
