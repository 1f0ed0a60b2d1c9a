//! MQTT publish-client adapter.
//!
//! Implements [`MessagingPort`].  Publishes are fire-and-forget (QoS 0,
//! not retained), matching what the telemetry consumers expect.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//!   The client connects in the background; `connect` blocks until the
//!   broker acknowledges or [`CONNECT_WAIT_MS`] runs out.
//! - **all other targets**: an in-memory broker that records every publish
//!   and fails on demand.  Clones share the broker.

use log::{info, warn};

use crate::app::ports::MessagingPort;
use crate::config::BrokerConfig;
use crate::error::TransportError;

#[cfg(not(target_os = "espidf"))]
use std::{cell::RefCell, rc::Rc};

#[cfg(target_os = "espidf")]
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

/// Upper bound on waiting for the broker's CONNACK.
pub const CONNECT_WAIT_MS: u32 = 5_000;

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimBroker {
    connected: bool,
    connect_attempts: u32,
    fail_connects: u32,
    connect_error: Option<TransportError>,
    fail_publishes: u32,
    publish_error: Option<TransportError>,
    published: Vec<(String, Vec<u8>)>,
}

#[cfg_attr(not(target_os = "espidf"), derive(Clone))]
pub struct MqttAdapter {
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    connected: Arc<AtomicBool>,
    #[cfg(not(target_os = "espidf"))]
    broker: Rc<RefCell<SimBroker>>,
}

impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            connected: Arc::new(AtomicBool::new(false)),
            #[cfg(not(target_os = "espidf"))]
            broker: Rc::new(RefCell::new(SimBroker::default())),
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    /// Fail the next `n` connects with `error`.
    pub fn fail_connects(&self, n: u32, error: TransportError) {
        let mut b = self.broker.borrow_mut();
        b.fail_connects = n;
        b.connect_error = Some(error);
    }

    /// Fail the next `n` publishes with `error`.  A failed publish drops
    /// the session, as a broken socket would.
    pub fn fail_publishes(&self, n: u32, error: TransportError) {
        let mut b = self.broker.borrow_mut();
        b.fail_publishes = n;
        b.publish_error = Some(error);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.broker.borrow().connect_attempts
    }

    pub fn is_connected(&self) -> bool {
        self.broker.borrow().connected
    }

    /// Every accepted publish as `(topic, payload)`.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.broker.borrow().published.clone()
    }
}

// ───────────────────────────────────────────────────────────────
// MessagingPort — ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl MessagingPort for MqttAdapter {
    fn connect(&mut self, config: &BrokerConfig) -> Result<(), TransportError> {
        use core::fmt::Write as _;
        use esp_idf_hal::delay::FreeRtos;

        // Dropping the old client tears its session down.
        self.client = None;
        self.connected.store(false, Ordering::Release);

        let mut url = heapless::String::<96>::new();
        write!(url, "mqtt://{}:{}", config.host, config.port).map_err(|_| TransportError::Unreachable)?;
        let conf = MqttClientConfiguration {
            client_id: Some(config.client_id.as_str()),
            username: (!config.username.is_empty()).then_some(config.username.as_str()),
            password: (!config.password.is_empty()).then_some(config.password.as_str()),
            keep_alive_interval: Some(core::time::Duration::from_secs(u64::from(config.keepalive_secs))),
            ..Default::default()
        };

        let flag = self.connected.clone();
        let client = EspMqttClient::new_cb(&url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => flag.store(true, Ordering::Release),
            EventPayload::Disconnected => flag.store(false, Ordering::Release),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed ({})", e);
            TransportError::Unreachable
        })?;
        self.client = Some(client);

        let mut waited = 0;
        while !self.connected.load(Ordering::Acquire) {
            if waited >= CONNECT_WAIT_MS {
                warn!("MQTT: no CONNACK from {} after {} ms", url, waited);
                return Err(TransportError::Unreachable);
            }
            FreeRtos::delay_ms(100);
            waited += 100;
        }
        info!("MQTT: connected to {}", url);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::Io);
        }
        let client = self.client.as_mut().ok_or(TransportError::Io)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish to '{}' failed ({})", topic, e);
                TransportError::Io
            })
    }
}

// ───────────────────────────────────────────────────────────────
// MessagingPort — simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl MessagingPort for MqttAdapter {
    fn connect(&mut self, config: &BrokerConfig) -> Result<(), TransportError> {
        let mut b = self.broker.borrow_mut();
        b.connect_attempts += 1;
        b.connected = false;
        if b.fail_connects > 0 {
            b.fail_connects -= 1;
            let e = b.connect_error.unwrap_or(TransportError::Unreachable);
            warn!("MQTT(sim): connect to {} failed ({})", config.host, e);
            return Err(e);
        }
        b.connected = true;
        info!("MQTT(sim): connected to {}:{} as '{}'", config.host, config.port, config.client_id);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut b = self.broker.borrow_mut();
        if !b.connected {
            return Err(TransportError::Io);
        }
        if b.fail_publishes > 0 {
            b.fail_publishes -= 1;
            b.connected = false;
            return Err(b.publish_error.unwrap_or(TransportError::Io));
        }
        b.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }
}
