//! WiFi station-mode adapter.
//!
//! Implements [`WirelessPort`], the hexagonal boundary for the radio.
//! Joining is non-blocking: [`begin_join`](WirelessPort::begin_join) kicks
//! off association and the caller polls [`status`](WirelessPort::status).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: a scripted simulation.  Each join replays a
//!   list of status codes, one per `status()` call, sticking on the last.
//!   Clones share the radio so tests can script it after handing the
//!   adapter to a session.

use log::{info, warn};

use super::utils::is_printable_ascii;
use crate::app::ports::WirelessPort;
use crate::error::LinkError;
use crate::network::link::{IpConfig, LinkStatusCode};

#[cfg(not(target_os = "espidf"))]
use std::{cell::RefCell, rc::Rc};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    ipv4,
    netif::{EspNetif, NetifConfiguration},
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::Association);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::Association);
    }
    Ok(())
}

fn validate_country(code: &str) -> Result<(), LinkError> {
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(LinkError::Country);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Simulated radio
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
const SIM_MAC: [u8; 6] = [0x28, 0xCD, 0xC1, 0x0A, 0xB3, 0xFF];

/// Address the simulated access point leases on a successful join.
#[cfg(not(target_os = "espidf"))]
pub const SIM_DHCP_LEASE: IpConfig =
    IpConfig::new([192, 168, 4, 23], [255, 255, 255, 0], [192, 168, 4, 1], [192, 168, 4, 1]);

#[cfg(not(target_os = "espidf"))]
struct SimRadio {
    active: bool,
    fail_activation: bool,
    script: Vec<LinkStatusCode>,
    cursor: usize,
    joined: bool,
    joins: u32,
    ip: Option<IpConfig>,
    country: Option<heapless::String<2>>,
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

#[cfg_attr(not(target_os = "espidf"), derive(Clone))]
pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    joining: bool,
    #[cfg(not(target_os = "espidf"))]
    radio: Rc<RefCell<SimRadio>>,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self { wifi, joining: false }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    /// Simulated radio whose joins come straight up.
    pub fn new() -> Self {
        Self {
            radio: Rc::new(RefCell::new(SimRadio {
                active: false,
                fail_activation: false,
                script: vec![LinkStatusCode::Up],
                cursor: 0,
                joined: false,
                joins: 0,
                ip: None,
                country: None,
            })),
        }
    }

    /// Status codes every following join reports, in order.
    pub fn script_join(&self, codes: &[LinkStatusCode]) {
        let mut r = self.radio.borrow_mut();
        r.script = codes.to_vec();
        r.cursor = 0;
    }

    pub fn fail_activation(&self, fail: bool) {
        self.radio.borrow_mut().fail_activation = fail;
    }

    /// Number of joins started.
    pub fn join_attempts(&self) -> u32 {
        self.radio.borrow().joins
    }

    /// Regulatory domain last applied, if any.
    pub fn country(&self) -> Option<heapless::String<2>> {
        self.radio.borrow().country.clone()
    }
}

// ───────────────────────────────────────────────────────────────
// WirelessPort — ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn prefix_to_mask(prefix: u8) -> [u8; 4] {
    let bits = u32::MAX.checked_shl(32 - u32::from(prefix.min(32))).unwrap_or(0);
    bits.to_be_bytes()
}

#[cfg(target_os = "espidf")]
impl WirelessPort for WifiAdapter {
    fn activate(&mut self) -> Result<(), LinkError> {
        if self.wifi.is_started().unwrap_or(false) {
            return Ok(());
        }
        self.wifi.start().map_err(|e| {
            warn!("WiFi: start failed ({})", e);
            LinkError::Activation
        })
    }

    fn set_country(&mut self, code: &str) -> Result<(), LinkError> {
        validate_country(code)?;
        let bytes = code.as_bytes();
        let cc = [bytes[0], bytes[1], 0];
        // SAFETY: the driver is initialised by `EspWifi::new`, and `cc` is a
        // nul-terminated buffer that outlives the call.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_set_country_code(cc.as_ptr().cast(), true) };
        if ret != esp_idf_svc::sys::ESP_OK {
            warn!("WiFi: country '{}' refused ({})", code, ret);
            return Err(LinkError::Country);
        }
        info!("WiFi: country set to {}", code);
        Ok(())
    }

    fn begin_join(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| LinkError::Association)?,
            password: password.try_into().map_err(|_| LinkError::Association)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        let _ = self.wifi.disconnect();
        self.wifi
            .set_configuration(&Configuration::Client(client))
            .and_then(|()| self.wifi.connect())
            .map_err(|e| {
                warn!("WiFi: join of '{}' failed to start ({})", ssid, e);
                LinkError::Association
            })?;
        self.joining = true;
        info!("WiFi: joining '{}'", ssid);
        Ok(())
    }

    fn status(&mut self) -> LinkStatusCode {
        match (self.wifi.is_connected(), self.wifi.is_up()) {
            (Ok(true), Ok(true)) => {
                self.joining = false;
                LinkStatusCode::Up
            }
            (Ok(true), _) => LinkStatusCode::NoIp,
            (Ok(false), _) if self.joining => LinkStatusCode::Joining,
            (Ok(false), _) => LinkStatusCode::Down,
            (Err(_), _) => LinkStatusCode::Fail,
        }
    }

    fn mac(&self) -> [u8; 6] {
        self.wifi.sta_netif().get_mac().unwrap_or([0; 6])
    }

    fn ip_config(&self) -> Option<IpConfig> {
        let info = self.wifi.sta_netif().get_ip_info().ok()?;
        Some(IpConfig::new(
            info.ip.octets(),
            prefix_to_mask(info.subnet.mask.0),
            info.subnet.gateway.octets(),
            info.dns.map_or([0; 4], |d| d.octets()),
        ))
    }

    fn set_ip_config(&mut self, config: &IpConfig) -> Result<(), LinkError> {
        let prefix = config.prefix_len().ok_or(LinkError::IpConfig)?;
        let settings = ipv4::ClientSettings {
            ip: config.address(),
            subnet: ipv4::Subnet {
                gateway: config.gateway(),
                mask: ipv4::Mask(prefix),
            },
            dns: Some(config.dns()),
            secondary_dns: None,
        };
        let conf = NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Client(
                ipv4::ClientConfiguration::Fixed(settings),
            )),
            ..NetifConfiguration::wifi_default_client()
        };
        let netif = EspNetif::new_with_conf(&conf).map_err(|_| LinkError::IpConfig)?;
        self.wifi.swap_netif_sta(netif).map_err(|_| LinkError::IpConfig)?;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// WirelessPort — simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl WirelessPort for WifiAdapter {
    fn activate(&mut self) -> Result<(), LinkError> {
        let mut r = self.radio.borrow_mut();
        if r.fail_activation {
            warn!("WiFi(sim): activation failed");
            return Err(LinkError::Activation);
        }
        r.active = true;
        Ok(())
    }

    fn set_country(&mut self, code: &str) -> Result<(), LinkError> {
        validate_country(code)?;
        let cc = heapless::String::try_from(code).map_err(|_| LinkError::Country)?;
        self.radio.borrow_mut().country = Some(cc);
        info!("WiFi(sim): country set to {}", code);
        Ok(())
    }

    fn begin_join(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut r = self.radio.borrow_mut();
        if !r.active {
            return Err(LinkError::Activation);
        }
        r.cursor = 0;
        r.joined = false;
        r.joins += 1;
        info!("WiFi(sim): joining '{}' (attempt {})", ssid, r.joins);
        Ok(())
    }

    fn status(&mut self) -> LinkStatusCode {
        let mut r = self.radio.borrow_mut();
        let Some(&code) = r.script.get(r.cursor).or(r.script.last()) else {
            return LinkStatusCode::Down;
        };
        if r.cursor < r.script.len() {
            r.cursor += 1;
        }
        if code == LinkStatusCode::Up && !r.joined {
            r.joined = true;
            if r.ip.is_none() {
                r.ip = Some(SIM_DHCP_LEASE);
            }
        }
        code
    }

    fn mac(&self) -> [u8; 6] {
        SIM_MAC
    }

    fn ip_config(&self) -> Option<IpConfig> {
        self.radio.borrow().ip
    }

    fn set_ip_config(&mut self, config: &IpConfig) -> Result<(), LinkError> {
        self.radio.borrow_mut().ip = Some(*config);
        info!("WiFi(sim): static address {}", config.address());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
