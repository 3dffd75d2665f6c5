//! SSH key parsing and fingerprint calculation.

use ssh_key::HashAlg;

use crate::client::error::{ClientError, ClientResult, ConnectFailure};

/// Parse private key content, decrypting it when a passphrase is given.
pub fn decode_private_key(
    content: &str,
    passphrase: Option<&str>,
) -> ClientResult<russh_keys::PrivateKey> {
    russh_keys::decode_secret_key(content, passphrase).map_err(|e| {
        let what = if passphrase.is_some() {
            "cannot parse private key with passphrase"
        } else {
            "cannot parse private key"
        };
        ClientError::connect("ssh", ConnectFailure::Auth, format!("{}: {}", what, e))
    })
}

/// Calculate the SHA256 fingerprint of an OpenSSH private key.
///
/// Returns fingerprint in the format: `SHA256:base64hash`, or `None` when the
/// content is not an OpenSSH key (e.g. legacy PEM).
pub fn key_fingerprint(content: &str) -> Option<String> {
    ssh_key::PrivateKey::from_openssh(content)
        .ok()
        .map(|key| key.public_key().fingerprint(HashAlg::Sha256).to_string())
}
