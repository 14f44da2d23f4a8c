//! Isopod iPXE script generation
//!
//! This crate turns the static boot configuration into the iPXE script a
//! network-boot client chains at `/boot.ipxe`. The script points the client
//! back at whatever host it addressed, so the same configuration works no
//! matter which interface the server is reached on.
//!
//! # Example
//!
//! ```
//! use isopod_ipxe::BootConfig;
//!
//! let config = BootConfig::new("/vmlinuz", "console=ttyS0")
//!     .with_initrd("/initrd.img,main".parse().unwrap());
//!
//! let script = config.script("192.168.1.1:8080").unwrap();
//! assert!(script.starts_with("#!ipxe"));
//! assert!(script.ends_with("boot"));
//! ```

pub mod error;
pub mod script;

pub use error::*;
pub use script::*;
