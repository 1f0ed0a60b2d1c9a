//! Three ways of pulling readings out of a [`ModeController`].
//!
//! Every pattern waits the controller's cycle time before its first read.
//! A read that finds the device's ready flag clear fails with
//! [`SensorError::NotReady`].

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::mode::ModeController;
use super::{MeasurementSample, SensorMode};
use crate::error::SensorError;

/// Start periodic measurement unless it is already running.
fn ensure_periodic<I2C: I2c, D: DelayNs>(
    ctrl: &mut ModeController<I2C, D>,
) -> Result<(), SensorError> {
    match ctrl.mode() {
        SensorMode::Idle => ctrl.start_periodic(),
        SensorMode::PeriodicRunning => Ok(()),
        SensorMode::SingleShotPending => Err(SensorError::ModeConflict(SensorMode::SingleShotPending)),
    }
}

/// Read `count` samples in periodic mode, handing each to `on_sample`.
///
/// Each iteration waits one cycle, then reads.  Periodic mode is left
/// running so callers can chain another pattern.
pub fn poll_loop<I2C, D, F>(
    ctrl: &mut ModeController<I2C, D>,
    count: usize,
    mut on_sample: F,
) -> Result<(), SensorError>
where
    I2C: I2c,
    D: DelayNs,
    F: FnMut(MeasurementSample),
{
    ensure_periodic(ctrl)?;
    for _ in 0..count {
        let wait = ctrl.cycle_time();
        ctrl.wait_ms(wait);
        on_sample(ctrl.read()?);
    }
    Ok(())
}

/// Arm one measurement, wait the single-shot settle time, read it.
pub fn single_shot<I2C: I2c, D: DelayNs>(
    ctrl: &mut ModeController<I2C, D>,
) -> Result<MeasurementSample, SensorError> {
    ctrl.arm_single_shot(false)?;
    let wait = ctrl.cycle_time();
    ctrl.wait_ms(wait);
    ctrl.read()
}

/// Build an unbounded, pull-driven sequence of periodic readings.
///
/// Construction starts periodic mode if the sensor is idle.  Each call to
/// `next()` blocks for one cycle and yields `Ok(None)` when the device has
/// nothing new.  The consumer decides when to stop pulling.
pub fn samples<I2C: I2c, D: DelayNs>(
    ctrl: &mut ModeController<I2C, D>,
) -> Result<Samples<'_, I2C, D>, SensorError> {
    ensure_periodic(ctrl)?;
    Ok(Samples { ctrl })
}

pub struct Samples<'a, I2C, D> {
    ctrl: &'a mut ModeController<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> Iterator for Samples<'_, I2C, D> {
    type Item = Result<Option<MeasurementSample>, SensorError>;

    fn next(&mut self) -> Option<Self::Item> {
        let wait = self.ctrl.cycle_time();
        self.ctrl.wait_ms(wait);
        let item = match self.ctrl.is_data_ready() {
            Ok(true) => self.ctrl.read().map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        };
        Some(item)
    }
}
