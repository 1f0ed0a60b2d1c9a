//! Network session: the wireless link plus the broker connection.
//!
//! ```text
//!   LinkDown ──connect_link(Up)──▶ LinkUp ──connect_broker──▶ BrokerConnected
//!       ▲                            ▲                            │
//!       └────connect_link(Down)──────┴───── publish failure ──────▼
//!                                                        BrokerDisconnected
//! ```
//!
//! Every operation is a single attempt.  The session never retries on its
//! own; the orchestrator decides what to do with a failure.

pub mod link;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::{MessagingPort, WirelessPort};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, LinkError};
use link::{IpConfig, LinkIdentity, LinkStatus, LinkStatusCode};

/// Interval between link status polls while joining.
pub const LINK_POLL_MS: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LinkDown,
    LinkUp,
    BrokerConnected,
    BrokerDisconnected,
}

pub struct NetworkSession<W, M, D> {
    wireless: W,
    broker: M,
    delay: D,
    state: SessionState,
    identity: Option<LinkIdentity>,
}

impl<W: WirelessPort, M: MessagingPort, D: DelayNs> NetworkSession<W, M, D> {
    pub fn new(wireless: W, broker: M, delay: D) -> Self {
        Self {
            wireless,
            broker,
            delay,
            state: SessionState::LinkDown,
            identity: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current address and MAC, once a link or static address is in place.
    pub fn identity(&self) -> Option<LinkIdentity> {
        self.identity
    }

    pub fn wireless(&self) -> &W {
        &self.wireless
    }

    pub fn broker(&self) -> &M {
        &self.broker
    }

    // ── Link ─────────────────────────────────────────────────

    /// Apply the regulatory domain before the first join.
    pub fn set_country(&mut self, code: &str) -> Result<(), LinkError> {
        self.wireless.set_country(code).inspect_err(|e| {
            warn!("Link: country '{}' not applied ({})", code, e);
        })
    }

    /// Join `ssid` and poll the link once a second for up to `timeout_secs`.
    ///
    /// Polling stops early on `Up` or on any failure code.  Running out of
    /// time is an ordinary `Down` result, not an error.
    pub fn connect_link(&mut self, ssid: &str, password: &str, timeout_secs: u32) -> LinkStatus {
        if let Err(e) = self
            .wireless
            .activate()
            .and_then(|()| self.wireless.begin_join(ssid, password))
        {
            warn!("Link: join of '{}' not started ({})", ssid, e);
            self.state = SessionState::LinkDown;
            return LinkStatus::Down(LinkStatusCode::Fail);
        }

        let mut status = self.wireless.status();
        let mut remaining = timeout_secs;
        while remaining > 0 && !status.is_settled() {
            remaining -= 1;
            info!("Link: waiting for connection ({:?})", status);
            self.delay.delay_ms(LINK_POLL_MS);
            status = self.wireless.status();
        }

        if status != LinkStatusCode::Up {
            warn!("Link: '{}' down (status {})", ssid, status.code());
            self.state = SessionState::LinkDown;
            return LinkStatus::Down(status);
        }

        let identity = LinkIdentity {
            ip: self
                .wireless
                .ip_config()
                .map_or(std::net::Ipv4Addr::UNSPECIFIED, |c| c.address()),
            mac: self.wireless.mac(),
        };
        self.identity = Some(identity);
        self.state = SessionState::LinkUp;
        info!("Link: up ip={} mac={}", identity.ip, identity.mac_string());
        LinkStatus::Up(identity)
    }

    /// Assign a static address to the interface.
    ///
    /// Leaves the session state alone: a fallback address on a dead link is
    /// still a dead link.
    pub fn apply_ip_config(&mut self, config: &IpConfig) -> Result<LinkIdentity, LinkError> {
        if !config.is_valid() {
            return Err(LinkError::IpConfig);
        }
        self.wireless.set_ip_config(config)?;
        let identity = LinkIdentity {
            ip: config.address(),
            mac: self.wireless.mac(),
        };
        self.identity = Some(identity);
        info!(
            "Link: static address {}/{} gw {} dns {}",
            identity.ip,
            config.prefix_len().unwrap_or(0),
            config.gateway(),
            config.dns()
        );
        Ok(identity)
    }

    // ── Broker ───────────────────────────────────────────────

    /// One broker connection attempt.
    pub fn connect_broker(&mut self, config: &BrokerConfig) -> Result<(), BrokerError> {
        info!("MQTT: connecting to {}:{}", config.host, config.port);
        match self.broker.connect(config) {
            Ok(()) => {
                self.state = SessionState::BrokerConnected;
                Ok(())
            }
            Err(e) => {
                if self.state != SessionState::LinkDown {
                    self.state = SessionState::BrokerDisconnected;
                }
                Err(BrokerError::Connect(e))
            }
        }
    }

    /// One publish attempt.  Failure marks the broker disconnected.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if self.state != SessionState::BrokerConnected {
            return Err(BrokerError::NotConnected);
        }
        self.broker.publish(topic, payload).map_err(|e| {
            self.state = SessionState::BrokerDisconnected;
            BrokerError::Publish(e)
        })
    }

    /// Wait the configured reconnect delay, then try the broker once more.
    pub fn reconnect(&mut self, config: &BrokerConfig) -> Result<(), BrokerError> {
        warn!("MQTT: reconnecting in {} ms", config.reconnect_delay_ms);
        self.delay.delay_ms(config.reconnect_delay_ms);
        self.connect_broker(config)
    }
}
