//! GateService driving real `ServoDriver`s over recording PWM channels.
//!
//! Checks the pulse train the servo actually sees, including the hold
//! pulse written before the power rail comes on.

use super::mock_hw::{MemoryStore, RecordingSink};

use core::convert::Infallible;
use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};

use coopgate::app::commands::GateCommand;
use coopgate::app::service::GateService;
use coopgate::config::ControllerConfig;
use coopgate::drivers::servo::{pulse_width_us, ServoDriver, PERIOD_US};
use coopgate::gate::{GatePosition, GateSnapshot};

/// Every duty value written, in order.  With `max_duty == PERIOD_US` a
/// duty value is the pulse width in microseconds.
#[derive(Clone, Default)]
struct RecordingPwm(Rc<RefCell<Vec<u16>>>);

impl PwmErrorType for RecordingPwm {
    type Error = Infallible;
}

impl SetDutyCycle for RecordingPwm {
    fn max_duty_cycle(&self) -> u16 {
        PERIOD_US
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.0.borrow_mut().push(duty);
        Ok(())
    }
}

struct RailPin;

impl PinErrorType for RailPin {
    type Error = Infallible;
}

impl OutputPin for RailPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

type Servo = ServoDriver<RecordingPwm, RailPin>;

/// Servos built the way the firmware builds them.
fn wired(config: &ControllerConfig) -> ([Servo; 2], [RecordingPwm; 2]) {
    let pwm = [RecordingPwm::default(), RecordingPwm::default()];
    let servos = [
        ServoDriver::new(pwm[0].clone(), RailPin, config.close_pos).unwrap(),
        ServoDriver::new(pwm[1].clone(), RailPin, config.close_pos).unwrap(),
    ];
    (servos, pwm)
}

#[test]
fn first_open_steps_away_from_the_closed_stop() {
    let config = ControllerConfig::default();
    let (servos, pwm) = wired(&config);
    let mut svc = GateService::new(config, servos);
    let mut sink = RecordingSink::new();

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    svc.tick(10, None, true, &mut sink);

    let writes = pwm[0].0.borrow().clone();
    assert_eq!(writes, vec![pulse_width_us(170), pulse_width_us(167)]);
    assert!(pwm[1].0.borrow().is_empty());
}

#[test]
fn actuator_follows_a_restored_position_even_if_built_elsewhere() {
    let config = ControllerConfig::default();
    let pwm = [RecordingPwm::default(), RecordingPwm::default()];
    // Built believing the horn sits at the open stop.
    let servos = [
        ServoDriver::new(pwm[0].clone(), RailPin, config.open_pos).unwrap(),
        ServoDriver::new(pwm[1].clone(), RailPin, config.open_pos).unwrap(),
    ];
    let mut svc = GateService::new(config, servos);
    let mut sink = RecordingSink::new();

    let store = MemoryStore {
        saved: Some(vec![
            GateSnapshot {
                id: 1,
                target: GatePosition::Open,
                schedule_time: 0,
                schedule_active: false,
            },
            GateSnapshot {
                id: 2,
                target: GatePosition::Closed,
                schedule_time: 0,
                schedule_active: false,
            },
        ]),
        ..MemoryStore::default()
    };
    assert!(svc.restore_from(&store, &mut sink));
    assert!(pwm.iter().all(|p| p.0.borrow().is_empty()));

    svc.handle_command(GateCommand::Close { gate: 1 }, &mut sink).unwrap();
    svc.handle_command(GateCommand::Open { gate: 2 }, &mut sink).unwrap();
    svc.tick(10, None, true, &mut sink);

    assert_eq!(*pwm[0].0.borrow(), vec![pulse_width_us(0), pulse_width_us(3)]);
    assert_eq!(*pwm[1].0.borrow(), vec![pulse_width_us(170), pulse_width_us(167)]);
}
