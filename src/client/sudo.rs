//! Scoped sudo elevation.

use std::ops::{Deref, DerefMut};

use super::Client;

/// Client with `sudo` switched on until the guard is dropped.
///
/// The previous value is restored on every exit path: normal return, `?`
/// early return, panic unwinding and future cancellation.
pub struct SudoGuard<'a> {
    client: &'a mut Client,
    previous: bool,
}

impl Client {
    /// Enable sudo for the lifetime of the returned guard.
    ///
    /// ```
    /// use aem_provision::client::Client;
    ///
    /// let mut client = Client::local();
    /// {
    ///     let elevated = client.with_sudo();
    ///     assert!(elevated.sudo);
    /// }
    /// assert!(!client.sudo);
    /// ```
    pub fn with_sudo(&mut self) -> SudoGuard<'_> {
        let previous = self.sudo;
        self.sudo = true;
        SudoGuard {
            client: self,
            previous,
        }
    }
}

impl Deref for SudoGuard<'_> {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client
    }
}

impl DerefMut for SudoGuard<'_> {
    fn deref_mut(&mut self) -> &mut Client {
        self.client
    }
}

impl Drop for SudoGuard<'_> {
    fn drop(&mut self) {
        self.client.sudo = self.previous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::AssertUnwindSafe;

    #[tokio::test]
    async fn test_sudo_reset_after_error() {
        let mut client = Client::local();

        // Not connected, so the command fails
        let result = {
            let elevated = client.with_sudo();
            assert!(elevated.sudo);
            elevated.run_shell_purely("id -u").await
        };

        assert!(result.is_err());
        assert!(!client.sudo);
    }

    #[test]
    fn test_sudo_reset_after_panic() {
        let mut client = Client::local();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _elevated = client.with_sudo();
            panic!("operation blew up");
        }));

        assert!(result.is_err());
        assert!(!client.sudo);
    }

    #[test]
    fn test_nested_guards_restore_previous() {
        let mut client = Client::local();
        {
            let mut outer = client.with_sudo();
            {
                let inner = outer.with_sudo();
                assert!(inner.sudo);
            }
            assert!(outer.sudo);
        }
        assert!(!client.sudo);
    }
}
