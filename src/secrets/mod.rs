// Credential provisioning from a password-protected archive
pub mod archive;
pub mod payload;

pub use archive::{read_entry, residue_path, ResidueGuard, MAX_CONFIG_BYTES};
pub use payload::parse_credentials;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ProvisionError;

pub const PASSPHRASE_PROMPT: &str = "Enter password for the credential archive: ";
pub const MAX_PASSPHRASE_ATTEMPTS: u8 = 2;

/// Exchange API key pair.
///
/// Not `Clone`: the bundle is moved into the data client and lives nowhere
/// else. `Debug` output is redacted.
#[derive(PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Where the archive passphrase comes from
pub trait PassphraseSource {
    fn read_passphrase(&mut self, prompt: &str) -> Result<String, ProvisionError>;
}

/// Reads the passphrase from the controlling terminal without echo
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl PassphraseSource for TerminalPrompt {
    fn read_passphrase(&mut self, prompt: &str) -> Result<String, ProvisionError> {
        match rpassword::prompt_password(prompt) {
            Ok(passphrase) if passphrase.is_empty() => Err(ProvisionError::PromptAbandoned),
            Ok(passphrase) => Ok(passphrase),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(ProvisionError::PromptAbandoned)
            }
            Err(e) => Err(ProvisionError::Prompt(e)),
        }
    }
}

/// Password-protected archive holding the exchange credentials
#[derive(Debug, Clone)]
pub struct CredentialVault {
    archive_path: PathBuf,
    entry: String,
    max_attempts: u8,
}

impl CredentialVault {
    pub fn new(archive_path: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self {
            archive_path: archive_path.into(),
            entry: entry.into(),
            max_attempts: MAX_PASSPHRASE_ATTEMPTS,
        }
    }

    /// Total passphrase attempts, clamped to 1..=2
    pub fn with_max_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_PASSPHRASE_ATTEMPTS);
        self
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Path of the plaintext copy that must never survive provisioning
    pub fn residue_path(&self) -> PathBuf {
        residue_path(&self.archive_path, &self.entry)
    }

    /// Decrypt and parse the archive with one passphrase
    pub fn unlock(&self, passphrase: &str) -> Result<Credentials, ProvisionError> {
        let _residue = ResidueGuard::new(self.residue_path());

        let plaintext = read_entry(&self.archive_path, &self.entry, passphrase)?;
        parse_credentials(&plaintext)
    }

    /// Prompt for the passphrase and unlock the archive.
    ///
    /// A rejected passphrase is asked for again while attempts remain; every
    /// other failure aborts at once.
    pub fn provision(
        &self,
        source: &mut dyn PassphraseSource,
    ) -> Result<Credentials, ProvisionError> {
        let _residue = ResidueGuard::new(self.residue_path());

        let mut attempt = 1;
        loop {
            let passphrase = source.read_passphrase(PASSPHRASE_PROMPT)?;

            match self.unlock(&passphrase) {
                Err(ProvisionError::Authentication) if attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "Archive rejected the passphrase"
                    );
                    attempt += 1;
                }
                Ok(credentials) => {
                    tracing::info!(
                        archive = %self.archive_path.display(),
                        "Credentials recovered from archive"
                    );
                    return Ok(credentials);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
