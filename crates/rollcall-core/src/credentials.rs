//! Remote service key storage in the OS keychain.

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "rollcall";

/// Keys are stored per remote base URL, so staging and production can coexist.
pub struct KeyStore;

impl KeyStore {
    pub fn store(remote_url: &str, api_key: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, remote_url).context("Failed to create keyring entry")?;
        entry
            .set_password(api_key)
            .context("Failed to store service key in keychain")?;
        Ok(())
    }

    pub fn get(remote_url: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, remote_url).context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve service key from keychain")
    }

    pub fn delete(remote_url: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, remote_url).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete service key from keychain")?;
        Ok(())
    }
}
