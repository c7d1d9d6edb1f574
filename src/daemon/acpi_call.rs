//! Firmware bridge over the `acpi_call` kernel module
//!
//! A call is a write of `"<path> <args>"` to the control file followed by a
//! read of the result. The module keeps a single result buffer, so calls are
//! serialized here as well as in the engine.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use asus_smc_platform::{FirmwareBridge, FirmwareValue, PlatformError};
use tokio::sync::Mutex;
use tracing::trace;

use crate::config::FirmwareConfig;

pub struct AcpiCallBridge {
    device: String,
    call_path: PathBuf,
    supported: HashSet<String>,
    call_lock: Mutex<()>,
}

impl AcpiCallBridge {
    pub fn new(config: &FirmwareConfig) -> Self {
        Self {
            device: config.device.clone(),
            call_path: config.call_path.clone(),
            supported: config.supported_methods.iter().cloned().collect(),
            call_lock: Mutex::new(()),
        }
    }

    /// Whether the control file exists (module loaded)
    pub fn is_available(&self) -> bool {
        self.call_path.exists()
    }
}

/// Build the control-file command for one call
pub fn format_call(device: &str, method: &str, args: &[u64]) -> String {
    let mut cmd = format!("{device}.{method}");
    for arg in args {
        cmd.push_str(&format!(" 0x{arg:x}"));
    }
    cmd
}

/// Parse the control-file result
pub fn parse_response(method: &str, raw: &str) -> Result<FirmwareValue, PlatformError> {
    let text = raw.trim_end_matches('\0').trim();

    if text.is_empty() {
        return Ok(FirmwareValue::Nothing);
    }
    if let Some(err) = text.strip_prefix("Error:") {
        let err = err.trim();
        if err.contains("AE_NOT_FOUND") {
            return Err(PlatformError::Unsupported(method.to_string()));
        }
        return Err(PlatformError::InvalidValue {
            method: method.to_string(),
            detail: err.to_string(),
        });
    }
    if text == "not called" {
        return Err(PlatformError::InvalidValue {
            method: method.to_string(),
            detail: "no result available".into(),
        });
    }
    if let Some(hex) = text.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16)
            .map(FirmwareValue::Integer)
            .map_err(|e| PlatformError::InvalidValue {
                method: method.to_string(),
                detail: format!("bad integer {text:?}: {e}"),
            });
    }
    if let Some(s) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return Ok(FirmwareValue::String(s.to_string()));
    }
    if let Some(body) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        let bytes = body
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(|b| u8::from_str_radix(b.trim_start_matches("0x"), 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| PlatformError::InvalidValue {
                method: method.to_string(),
                detail: format!("bad buffer {text:?}: {e}"),
            })?;
        return Ok(FirmwareValue::Buffer(bytes));
    }

    Err(PlatformError::InvalidValue {
        method: method.to_string(),
        detail: format!("unrecognized result {text:?}"),
    })
}

#[async_trait]
impl FirmwareBridge for AcpiCallBridge {
    async fn evaluate(&self, method: &str, args: &[u64]) -> Result<FirmwareValue, PlatformError> {
        if !self.supported.contains(method) {
            return Err(PlatformError::Unsupported(method.to_string()));
        }

        let _guard = self.call_lock.lock().await;
        let cmd = format_call(&self.device, method, args);
        trace!("acpi_call <- {}", cmd);

        tokio::fs::write(&self.call_path, cmd.as_bytes()).await?;
        let raw = tokio::fs::read_to_string(&self.call_path).await?;
        trace!("acpi_call -> {}", raw.trim_end_matches('\0'));

        parse_response(method, &raw)
    }

    async fn validate(&self, method: &str) -> Result<(), PlatformError> {
        if !self.is_available() {
            return Err(PlatformError::Unavailable(format!(
                "{} (is acpi_call loaded?)",
                self.call_path.display()
            )));
        }
        if self.supported.contains(method) {
            Ok(())
        } else {
            Err(PlatformError::Unsupported(method.to_string()))
        }
    }
}
