//! Pure Rust SSH transport.
//!
//! ## Modules
//!
//! - [`config`] - connection settings and host key policy
//! - [`keys`] - private key parsing and fingerprints
//! - [`client`] - SSH connection management
//! - [`exec`] - remote command execution
//! - [`sftp`] - file transfer via SFTP

mod client;
pub mod config;
mod exec;
mod keys;
mod sftp;

pub use client::SshConnection;
pub use config::{HostKeyPolicy, SshSettings};
pub use keys::{decode_private_key, key_fingerprint};
