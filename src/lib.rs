//! Remote provisioning of AEM instances.
//!
//! The core is a transport-agnostic remote client: a [`client::Client`] over
//! one [`connection::Connection`] (SSH, AWS Systems Manager or the local
//! machine) offering shell commands, file transfer, environment injection,
//! scoped sudo and connect-with-retry. The [`instance`] layer drives AEM
//! Compose on top of it.

pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod instance;
pub mod ssh;
pub mod utils;
