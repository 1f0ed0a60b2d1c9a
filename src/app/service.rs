//! Application service — the hexagonal core.
//!
//! [`TelemetryService`] owns the sensor controller, the network session
//! and the operator display.  Each cycle it takes one single-shot reading,
//! publishes it, and on a failed publish walks the recovery branch.
//! Failures inside a cycle are reported and absorbed; the loop never ends.
//!
//! ```text
//!  ModeController ──▶ ┌──────────────────────┐ ──▶ DisplayPort
//!                     │   TelemetryService   │ ──▶ EventSink
//!  NetworkSession ◀──▶│ measure·publish·recover
//!                     └──────────────────────┘ ◀── WallClock
//! ```

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::config::NodeConfig;
use crate::drivers::watchdog::Watchdog;
use crate::error::{Result, SensorError};
use crate::network::NetworkSession;
use crate::network::link::{IpConfig, LinkIdentity, LinkStatus};
use crate::sensor::{MeasurementSample, ModeController, reader};
use crate::telemetry::TelemetryMessage;

use super::events::AppEvent;
use super::ports::{DisplayPort, EventSink, MessagingPort, WallClock, WirelessPort};

/// Consecutive failed link recoveries before the operator is told to
/// call for help.
pub const ESCALATE_AFTER_LINK_FAILURES: u32 = 2;

/// How one publish cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Telemetry reached the broker.
    Published,
    /// Publish failed; link and broker were re-established.  This cycle's
    /// telemetry is still lost.
    Recovered,
    /// Publish failed and recovery did not complete.
    Dropped,
    /// No reading this cycle.
    SensorFault(SensorError),
}

// ───────────────────────────────────────────────────────────────
// Display helpers
// ───────────────────────────────────────────────────────────────

fn render(display: &mut impl DisplayPort, line1: &str, line2: &str) {
    display.clear();
    display.move_to(0, 0);
    display.put_str(line1);
    if !line2.is_empty() {
        display.move_to(0, 1);
        display.put_str(line2);
    }
}

fn render_sample(display: &mut impl DisplayPort, s: &MeasurementSample) {
    let mut line1 = heapless::String::<16>::new();
    let mut line2 = heapless::String::<24>::new();
    let _ = write!(line1, "CO2: {}PPM", s.co2_ppm);
    let _ = write!(line2, "T={:.1}°C, RH={:.0}%", s.temperature_c, s.relative_humidity);
    render(display, &line1, &line2);
}

fn ip_text(identity: &LinkIdentity) -> heapless::String<16> {
    let mut s = heapless::String::new();
    let _ = write!(s, "{}", identity.ip);
    s
}

// ───────────────────────────────────────────────────────────────
// TelemetryService
// ───────────────────────────────────────────────────────────────

pub struct TelemetryService<I2C, D, W, M, ND, L, C, S> {
    config: NodeConfig,
    sensor: ModeController<I2C, D>,
    network: NetworkSession<W, M, ND>,
    display: L,
    clock: C,
    sink: S,
    link_failures: u32,
    cycles: u64,
}

impl<I2C, D, W, M, ND, L, C, S> TelemetryService<I2C, D, W, M, ND, L, C, S>
where
    I2C: I2c,
    D: DelayNs,
    W: WirelessPort,
    M: MessagingPort,
    ND: DelayNs,
    L: DisplayPort,
    C: WallClock,
    S: EventSink,
{
    pub fn new(
        config: NodeConfig,
        sensor: ModeController<I2C, D>,
        network: NetworkSession<W, M, ND>,
        display: L,
        clock: C,
        sink: S,
    ) -> Self {
        Self {
            config,
            sensor,
            network,
            display,
            clock,
            sink,
            link_failures: 0,
            cycles: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring sensor, link and broker up in the order the hardware needs.
    ///
    /// Sensor faults here are fatal and returned.  Network faults are shown
    /// to the operator and absorbed; the publish loop recovers later.
    /// Returns the sensor serial number.
    pub fn bring_up(&mut self) -> Result<u64> {
        // The device may still be measuring from before a reset.
        self.sensor.driver_mut().set_measurement(false, false, false)?;
        let serial = self.sensor.driver_mut().serial_number()?;
        info!("Bring-up: sensor serial {:012x}", serial);

        self.bring_up_link();
        self.bring_up_broker();

        let offset = self.sensor.temperature_offset()?;
        info!("Bring-up: device temperature offset {:.2} °C", offset);
        if let Some(wanted) = self.config.sensor.temperature_offset_c {
            self.sensor.set_temperature_offset(wanted)?;
            info!("Bring-up: temperature offset set to {:.2} °C", wanted);
        }

        self.sensor.set_altitude(self.config.sensor.altitude_m)?;
        let masl = self.sensor.altitude()?;
        info!("Bring-up: altitude {} m", masl);
        let mut line = heapless::String::<16>::new();
        let _ = write!(line, "M.A.S.L. : {}m.", masl);
        self.show(&line, "");

        let ready = self.sensor.is_data_ready()?;
        info!(
            "Bring-up: measurement data {}",
            if ready { "can be read" } else { "missing" }
        );
        let asc = self.sensor.driver_mut().automatic_self_calibration()?;
        info!(
            "Bring-up: automatic self-calibration {}",
            if asc { "ON" } else { "OFF" }
        );

        let warmup = usize::from(self.config.sensor.warmup_samples);
        if warmup > 0 {
            self.warm_up(warmup)?;
        }

        self.sink.emit(&AppEvent::Started { serial });
        Ok(serial)
    }

    /// Exercise periodic mode through the poll loop and the lazy sequence,
    /// `count` readings each, then return the sensor to Idle.
    fn warm_up(&mut self, count: usize) -> Result<()> {
        self.sensor.start_periodic()?;
        let wait = self.sensor.cycle_time();
        self.show("SCD41 Calibrate", "Please wait...");
        self.sensor.wait_ms(wait);

        self.show("Reading using", "Periodic mode");
        let display = &mut self.display;
        let sink = &mut self.sink;
        reader::poll_loop(&mut self.sensor, count, |s| {
            render_sample(display, &s);
            sink.emit(&AppEvent::Sample(s));
        })?;

        self.show("Reading using", "iterator mode.");
        let mut taken = 0;
        // A device that never raises its flag must not stall bring-up.
        for item in reader::samples(&mut self.sensor)?.take(count * 4) {
            if let Some(s) = item? {
                render_sample(&mut self.display, &s);
                self.sink.emit(&AppEvent::Sample(s));
                taken += 1;
                if taken == count {
                    break;
                }
            }
        }
        if taken < count {
            warn!("Warm-up: lazy sequence produced {}/{} readings", taken, count);
        }

        self.show("CalibrateSuccess", "Start to read...");
        self.sensor.stop_periodic()?;
        Ok(())
    }

    fn bring_up_link(&mut self) {
        let wifi = &self.config.wifi;
        // A refused domain leaves the radio's default in place; joining
        // still goes ahead.
        let _ = self.network.set_country(&wifi.country);
        let status = self
            .network
            .connect_link(&wifi.ssid, &wifi.password, wifi.connect_timeout_secs);
        match status {
            LinkStatus::Up(identity) => {
                self.sink.emit(&AppEvent::LinkUp(identity));
                let identity = self.apply_site_ip().unwrap_or(identity);
                self.show("NetworkConnected", &ip_text(&identity));
            }
            LinkStatus::Down(code) => {
                self.sink.emit(&AppEvent::LinkDown(code));
                self.show("Network failed", "");
                let fallback = self.config.wifi.fallback_ip;
                self.apply_static(&fallback);
                self.show("Set to default", "Consult Admin!");
            }
        }
    }

    fn bring_up_broker(&mut self) {
        match self.network.connect_broker(&self.config.broker) {
            Ok(()) => self.sink.emit(&AppEvent::BrokerConnected),
            Err(e) => {
                self.sink.emit(&AppEvent::BrokerFailed(e));
                match self.network.reconnect(&self.config.broker) {
                    Ok(()) => self.sink.emit(&AppEvent::BrokerConnected),
                    Err(e) => {
                        self.sink.emit(&AppEvent::BrokerFailed(e));
                        self.show("MQTT Failed", "Consult Admin!");
                    }
                }
            }
        }
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one measure → publish cycle, recovering the network on failure.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;

        let sample = match reader::single_shot(&mut self.sensor) {
            Ok(s) => s,
            Err(e) => {
                warn!("Cycle {}: sensor read failed ({}), abandoning", self.cycles, e);
                self.sensor.abort();
                self.sink.emit(&AppEvent::SensorFault(e));
                self.show("Sensor fault", "Retry next cycle");
                return CycleOutcome::SensorFault(e);
            }
        };
        self.sink.emit(&AppEvent::Sample(sample));
        if !sample.is_plausible() {
            warn!("Cycle {}: reading outside rated range", self.cycles);
            self.sink.emit(&AppEvent::ImplausibleSample(sample));
        }
        render_sample(&mut self.display, &sample);
        self.hold();

        let outcome = self.publish_sample(&sample);
        render_sample(&mut self.display, &sample);
        debug!("Cycle {}: {:?}", self.cycles, outcome);
        outcome
    }

    /// Cycle forever, feeding the watchdog between cycles.
    pub fn run(&mut self, watchdog: &Watchdog) -> ! {
        info!("TelemetryService: entering publish loop");
        loop {
            self.run_cycle();
            watchdog.feed();
        }
    }

    fn publish_sample(&mut self, sample: &MeasurementSample) -> CycleOutcome {
        let identity = self.network.identity().unwrap_or(LinkIdentity {
            ip: std::net::Ipv4Addr::UNSPECIFIED,
            mac: self.network.wireless().mac(),
        });
        let message = TelemetryMessage::new(sample, &identity, self.clock.now());
        let payload = match message.encode(self.config.wire_layout) {
            Ok(p) => p,
            Err(e) => {
                warn!("Cycle {}: telemetry encoding failed ({})", self.cycles, e);
                self.sink.emit(&AppEvent::TelemetryDropped);
                return CycleOutcome::Dropped;
            }
        };

        match self.network.publish(&self.config.broker.topic, &payload) {
            Ok(()) => {
                self.sink.emit(&AppEvent::Published { bytes: payload.len() });
                self.show("Success to sent", "Message->Broker");
                CycleOutcome::Published
            }
            Err(e) => {
                self.sink.emit(&AppEvent::PublishFailed(e));
                self.show("MQTT fail!", "Consult Admin!");
                let recovered = self.recover();
                self.sink.emit(&AppEvent::TelemetryDropped);
                if recovered {
                    CycleOutcome::Recovered
                } else {
                    CycleOutcome::Dropped
                }
            }
        }
    }

    /// Rejoin the link, then reconnect the broker.  One attempt each.
    fn recover(&mut self) -> bool {
        self.show("Try to connect", "WIFI");
        let wifi = &self.config.wifi;
        let status = self
            .network
            .connect_link(&wifi.ssid, &wifi.password, wifi.connect_timeout_secs);

        let identity = match status {
            LinkStatus::Up(identity) => identity,
            LinkStatus::Down(code) => {
                self.link_failures += 1;
                self.sink.emit(&AppEvent::LinkDown(code));
                let line2 = if self.link_failures >= ESCALATE_AFTER_LINK_FAILURES {
                    "Consult Admin!"
                } else {
                    "WIFI network"
                };
                self.show("fail to connect", line2);
                return false;
            }
        };

        self.link_failures = 0;
        self.sink.emit(&AppEvent::LinkUp(identity));
        let identity = self.apply_site_ip().unwrap_or(identity);
        self.show("WIFI Connected", &ip_text(&identity));
        self.show("Try to connect", "MQTT Broker");
        match self.network.connect_broker(&self.config.broker) {
            Ok(()) => {
                self.sink.emit(&AppEvent::BrokerConnected);
                true
            }
            Err(e) => {
                self.sink.emit(&AppEvent::BrokerFailed(e));
                false
            }
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_site_ip(&mut self) -> Option<LinkIdentity> {
        let site = self.config.wifi.site_ip?;
        self.apply_static(&site)
    }

    fn apply_static(&mut self, config: &IpConfig) -> Option<LinkIdentity> {
        match self.network.apply_ip_config(config) {
            Ok(identity) => {
                self.sink.emit(&AppEvent::StaticAddress(identity));
                Some(identity)
            }
            Err(e) => {
                warn!("Static address {} not applied ({})", config.address(), e);
                None
            }
        }
    }

    fn show(&mut self, line1: &str, line2: &str) {
        render(&mut self.display, line1, line2);
        self.hold();
    }

    fn hold(&mut self) {
        self.sensor.wait_ms(self.config.display.hold_ms);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn sensor(&self) -> &ModeController<I2C, D> {
        &self.sensor
    }

    pub fn network(&self) -> &NetworkSession<W, M, ND> {
        &self.network
    }

    pub fn display(&self) -> &L {
        &self.display
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Failed link recoveries since the last successful one.
    pub fn link_failures(&self) -> u32 {
        self.link_failures
    }

    /// Cycles run since start-up.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
