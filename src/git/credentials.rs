//! git::credentials
//!
//! Transport credentials for fetch, push and remote listing.
//!
//! libgit2 asks for credentials repeatedly while a server keeps rejecting
//! them, so the callback gives up after a fixed number of attempts.

use std::cell::Cell;
use std::path::PathBuf;

use tracing::debug;

use crate::core::config::{BasicAuth, RunConfig};

const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Credentials offered to remotes.
#[derive(Debug, Clone, Default)]
pub struct GitAuth {
    /// User for ssh transports
    pub ssh_user: Option<String>,
    /// Private key; the ssh agent is used when unset
    pub ssh_key: Option<PathBuf>,
    /// Username/password for https transports
    pub basic: Option<BasicAuth>,
}

impl GitAuth {
    /// No credentials. Enough for `file://` remotes and public https.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            ssh_user: Some(config.ssh_user.clone()),
            ssh_key: config.ssh_key_location.clone(),
            basic: config.basic_auth.clone(),
        }
    }

    pub(crate) fn callbacks(&self) -> git2::RemoteCallbacks<'_> {
        let attempts = Cell::new(0usize);
        let mut callbacks = git2::RemoteCallbacks::new();

        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts.set(attempts.get() + 1);
            if attempts.get() > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str(&format!(
                    "authentication failed for {url}"
                )));
            }
            debug!(url, ?allowed, attempt = attempts.get(), "credentials requested");

            if allowed.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(basic) = &self.basic {
                    return git2::Cred::userpass_plaintext(&basic.username, &basic.password);
                }
            }

            if allowed.contains(git2::CredentialType::SSH_KEY) {
                let user = username_from_url
                    .or(self.ssh_user.as_deref())
                    .unwrap_or("git");
                return match &self.ssh_key {
                    Some(key) => git2::Cred::ssh_key(user, None, key, None),
                    None => git2::Cred::ssh_key_from_agent(user),
                };
            }

            if allowed.contains(git2::CredentialType::USERNAME) {
                let user = username_from_url
                    .or(self.ssh_user.as_deref())
                    .unwrap_or("git");
                return git2::Cred::username(user);
            }

            git2::Cred::default()
        });

        callbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigFile;

    #[test]
    fn from_config_copies_transport_settings() {
        let config = RunConfig::builder("bash")
            .apply(&ConfigFile {
                storage_addr: Some("memory://".into()),
                ..Default::default()
            })
            .build()
            .unwrap();
        let auth = GitAuth::from_config(&config);
        assert_eq!(auth.ssh_user.as_deref(), Some("git"));
        assert!(auth.ssh_key.is_none());
        assert!(auth.basic.is_none());
    }
}
