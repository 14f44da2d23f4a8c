//! iPXE boot script generation
//!
//! This module builds the script served at `/boot.ipxe` from the static
//! boot configuration and the host the client addressed, so every URL in
//! the script points back at the server the client already reached.

use crate::error::{IpxeError, Result};
use std::str::FromStr;

/// One initial ramdisk entry in the boot configuration.
///
/// Parsed from `PATH` or `PATH,LABEL`; fields past the second are ignored.
/// The path is relative to the image root. The label, when present, is
/// passed through to the script verbatim, including an empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitrdSpec {
    /// Path of the ramdisk image within the served tree
    pub path: String,

    /// Display label appended to the initrd directive
    pub label: Option<String>,
}

impl FromStr for InitrdSpec {
    type Err = IpxeError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(',');
        let path = parts.next().unwrap_or_default();
        if path.is_empty() {
            return Err(IpxeError::InvalidInitrdSpec(s.to_string()));
        }
        let label = parts.next().map(str::to_string);
        Ok(Self {
            path: path.to_string(),
            label,
        })
    }
}

/// Static boot configuration, set once at startup
#[derive(Debug, Clone, Default)]
pub struct BootConfig {
    /// Kernel path relative to the image root; empty means boot is not
    /// configured
    pub kernel_path: String,

    /// Kernel command line, passed through verbatim
    pub kernel_params: String,

    /// Ramdisk entries in the order they were given
    pub initrds: Vec<InitrdSpec>,
}

impl BootConfig {
    /// Create a new config with a kernel path and command line
    pub fn new(kernel_path: impl Into<String>, kernel_params: impl Into<String>) -> Self {
        Self {
            kernel_path: kernel_path.into(),
            kernel_params: kernel_params.into(),
            initrds: Vec::new(),
        }
    }

    /// Append a ramdisk entry
    pub fn with_initrd(mut self, spec: InitrdSpec) -> Self {
        self.initrds.push(spec);
        self
    }

    /// Generate the iPXE script for a request addressed to `host`.
    ///
    /// Returns `None` when the configuration is unset, meaning the kernel
    /// path is empty or there are no ramdisk entries; a partial script is
    /// never produced. `host` is echoed into every URL exactly as the
    /// client sent it.
    ///
    /// The kernel command line is appended verbatim, so an empty one leaves
    /// a trailing space on the kernel directive. iPXE accepts that and
    /// existing clients depend on the script text staying stable.
    pub fn script(&self, host: &str) -> Option<String> {
        if self.kernel_path.is_empty() || self.initrds.is_empty() {
            return None;
        }

        let mut script = String::from("#!ipxe\n");
        script.push_str(&format!(
            "kernel http://{}{} {}\n",
            host, self.kernel_path, self.kernel_params
        ));
        for initrd in &self.initrds {
            match &initrd.label {
                Some(label) => {
                    script.push_str(&format!("initrd http://{}{} {}\n", host, initrd.path, label));
                }
                None => {
                    script.push_str(&format!("initrd http://{}{}\n", host, initrd.path));
                }
            }
        }
        script.push_str("boot");
        Some(script)
    }
}
