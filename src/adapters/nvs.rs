//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the co2node firmware.  The whole
//! [`NodeConfig`] lives in one postcard blob under `co2node/nodecfg`.
//!
//! # Security
//!
//! - Config validation: every field is range-checked before persistence.
//! - Encrypted NVS: on ESP32, place the `co2node` namespace on the
//!   encrypted partition; it carries WiFi and broker credentials.  The
//!   simulation backend uses plaintext (dev/test only).
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::ConfigPort;
use crate::config::NodeConfig;
use crate::error::ConfigError;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "co2node";
const CONFIG_KEY: &str = "nodecfg";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Simulation: overwrite the stored blob with raw bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn put_raw(&self, bytes: &[u8]) {
        let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
        self.store.borrow_mut().insert(key, bytes.to_vec());
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob() -> Result<Vec<u8>, i32> {
        Self::with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
            let key_cstr = b"nodecfg\0";
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(handle, key_cstr.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_cstr.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        })
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(bytes: &[u8]) -> Result<(), i32> {
        Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
            let key_cstr = b"nodecfg\0";
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key_cstr.as_ptr() as *const _,
                    bytes.as_ptr() as *const _,
                    bytes.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        let stored: Option<Vec<u8>> = {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            self.store.borrow().get(&key).cloned()
        };

        #[cfg(target_os = "espidf")]
        let stored: Option<Vec<u8>> = match Self::read_blob() {
            Ok(bytes) => Some(bytes),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => None,
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                return Err(ConfigError::IoError);
            }
        };

        match stored {
            Some(bytes) => {
                let cfg: NodeConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(NodeConfig::default())
            }
        }
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.put_raw(&bytes);
            info!("NvsAdapter: config saved (simulation, {} bytes)", bytes.len());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            if bytes.len() > MAX_BLOB_SIZE {
                return Err(ConfigError::IoError);
            }
            match Self::write_blob(&bytes) {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}
