//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the gate
//! controller.  The gate table itself is encoded by
//! [`NvsGateStore`](crate::persistence::NvsGateStore) on top of the
//! [`StoragePort`] half.
//!
//! Every config field is range-checked before it is written, and again
//! after it is read back.  On the host the backend is an in-memory map
//! keyed by `namespace/key`.

use crate::app::ports::{ConfigPort, StoragePort};
use crate::config::ControllerConfig;
use crate::error::{ConfigError, StorageError};
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "coopgate";
const CONFIG_KEY: &str = "config";

/// Config blobs are tiny; anything bigger than this is not ours.
const MAX_BLOB_SIZE: usize = 256;

/// NVS key and namespace names are limited to 15 bytes plus NUL.
#[cfg(target_os = "espidf")]
fn nvs_name(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Key/value blob storage on the default NVS partition.
pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: core::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Bring up the NVS partition.  A full partition or one written by a
    /// newer IDF is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: runs once from main() before any other NVS user.
            let mut rc = unsafe { nvs_flash_init() };
            if rc == ESP_ERR_NVS_NO_FREE_PAGES as i32 || rc == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NvsAdapter: partition full or from a newer IDF, erasing");
                // SAFETY: as above.
                rc = unsafe { nvs_flash_erase() };
                if rc == ESP_OK as i32 {
                    // SAFETY: as above.
                    rc = unsafe { nvs_flash_init() };
                }
            }
            if rc != ESP_OK as i32 {
                warn!("NvsAdapter: flash init failed (rc={})", rc);
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: flash partition ready");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: in-memory backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: core::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_key(namespace: &str, key: &str) -> String {
        format!("{namespace}/{key}")
    }

    /// Run `f` against an open namespace handle; the handle is always
    /// closed afterwards.  Errors are raw `esp_err_t` codes.
    #[cfg(target_os = "espidf")]
    fn in_namespace<T>(
        namespace: &str,
        mode: nvs_open_mode_t,
        f: impl FnOnce(nvs_handle_t) -> Result<T, i32>,
    ) -> Result<T, i32> {
        let ns = nvs_name(namespace);
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let rc = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if rc != ESP_OK as i32 {
            return Err(rc);
        }
        let out = f(handle);
        // SAFETY: `handle` was opened above and is not used after this.
        unsafe { nvs_close(handle) };
        out
    }

    #[cfg(target_os = "espidf")]
    fn commit(handle: nvs_handle_t, rc: i32) -> Result<(), i32> {
        if rc != ESP_OK as i32 {
            return Err(rc);
        }
        // SAFETY: `handle` is open for the duration of the caller's closure.
        match unsafe { nvs_commit(handle) } {
            rc if rc == ESP_OK as i32 => Ok(()),
            rc => Err(rc),
        }
    }

    #[cfg(target_os = "espidf")]
    fn storage_error(rc: i32) -> StorageError {
        match rc {
            rc if rc == ESP_ERR_NVS_NOT_FOUND as i32 => StorageError::NotFound,
            rc if rc == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 => StorageError::Full,
            _ => StorageError::IoError,
        }
    }

    /// Store a blob and commit.  Shared by [`ConfigPort::save`] (which only
    /// has `&self`) and [`StoragePort::write`].
    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::sim_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = nvs_name(key);
            Self::in_namespace(namespace, nvs_open_mode_t_NVS_READWRITE, |handle| {
                // SAFETY: key is NUL-terminated; `data` is valid for its length.
                let rc = unsafe {
                    nvs_set_blob(handle, key.as_ptr().cast(), data.as_ptr().cast(), data.len())
                };
                Self::commit(handle, rc)
            })
            .map_err(Self::storage_error)
        }
    }
}

/// Range-check every field.  Rejects rather than clamps.
pub fn validate_config(cfg: &ControllerConfig) -> Result<(), ConfigError> {
    let check = |ok: bool, why: &'static str| {
        if ok {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed(why))
        }
    };

    check(
        cfg.open_pos <= 180 && cfg.close_pos <= 180,
        "open_pos and close_pos must be 0-180",
    )?;
    check(cfg.open_pos != cfg.close_pos, "open_pos and close_pos must differ")?;
    check(
        (1..=cfg.travel()).contains(&cfg.step_increment),
        "step_increment must be 1-travel",
    )?;
    check(
        (1..=1000).contains(&cfg.step_interval_ms),
        "step_interval_ms must be 1-1000",
    )?;
    check(cfg.settle_ms <= 5000, "settle_ms must be 0-5000")?;
    check(
        (1..=cfg.step_interval_ms).contains(&cfg.control_loop_interval_ms),
        "control_loop_interval_ms must be 1-step_interval_ms",
    )?;
    check(
        (100..=600_000).contains(&cfg.persist_retry_ms),
        "persist_retry_ms must be 100-600000",
    )
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<ControllerConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let len = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                return Ok(ControllerConfig::default());
            }
            Err(_) => return Err(ConfigError::IoError),
        };

        let cfg: ControllerConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("NvsAdapter: loaded config ({} bytes)", len);
        Ok(cfg)
    }

    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }
        self.put(CONFIG_NAMESPACE, CONFIG_KEY, &bytes).map_err(|e| {
            warn!("NvsAdapter: config write failed: {}", e);
            ConfigError::IoError
        })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    /// A stored value larger than `buf` is an error, not a truncated read,
    /// matching ESP-IDF `nvs_get_blob`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let store = self.store.borrow();
            let value = store
                .get(&Self::sim_key(namespace, key))
                .ok_or(StorageError::NotFound)?;
            let dst = buf.get_mut(..value.len()).ok_or(StorageError::IoError)?;
            dst.copy_from_slice(value);
            Ok(value.len())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = nvs_name(key);
            Self::in_namespace(namespace, nvs_open_mode_t_NVS_READONLY, |handle| {
                let mut len = buf.len();
                // SAFETY: `len` holds the capacity of `buf`; NVS writes at most that.
                let rc = unsafe {
                    nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut len)
                };
                if rc == ESP_OK as i32 { Ok(len) } else { Err(rc) }
            })
            .map_err(Self::storage_error)
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().remove(&Self::sim_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = nvs_name(key);
            Self::in_namespace(namespace, nvs_open_mode_t_NVS_READWRITE, |handle| {
                // SAFETY: key is NUL-terminated.
                match unsafe { nvs_erase_key(handle, key.as_ptr().cast()) } {
                    // Deleting a missing key is not an error.
                    rc if rc == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(()),
                    rc => Self::commit(handle, rc),
                }
            })
            .map_err(Self::storage_error)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow().contains_key(&Self::sim_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let key = nvs_name(key);
            Self::in_namespace(namespace, nvs_open_mode_t_NVS_READONLY, |handle| {
                // SAFETY: key is NUL-terminated; a null out-pointer is allowed.
                let rc = unsafe { nvs_find_key(handle, key.as_ptr().cast(), core::ptr::null_mut()) };
                Ok(rc == ESP_OK as i32)
            })
            .unwrap_or(false)
        }
    }
}
