use config::{Config, ConfigError, File, FileFormat};

use super::Credentials;
use crate::error::ProvisionError;

pub const CREDENTIAL_SECTION: &str = "binance";
const API_KEY: &str = "api_key";
const API_SECRET: &str = "api_secret";

/// Parse the decrypted INI payload and pull out the exchange credentials
pub fn parse_credentials(plaintext: &[u8]) -> Result<Credentials, ProvisionError> {
    let text = std::str::from_utf8(plaintext)
        .map_err(|_| ProvisionError::ConfigFormat("payload is not valid UTF-8".to_string()))?;

    // Parser messages can quote payload lines, so they are not surfaced
    let parsed = Config::builder()
        .add_source(File::from_str(text, FileFormat::Ini))
        .build()
        .map_err(|_| ProvisionError::ConfigFormat("payload is not a valid INI document".to_string()))?;

    let api_key = required_value(&parsed, API_KEY)?;
    let api_secret = required_value(&parsed, API_SECRET)?;

    Ok(Credentials::new(api_key, api_secret))
}

fn required_value(parsed: &Config, key: &'static str) -> Result<String, ProvisionError> {
    let missing = ProvisionError::MissingCredential {
        section: CREDENTIAL_SECTION,
        key,
    };

    match parsed.get_string(&format!("{}.{}", CREDENTIAL_SECTION, key)) {
        Ok(value) if value.trim().is_empty() => Err(missing),
        Ok(value) => Ok(value.trim().to_string()),
        Err(ConfigError::NotFound(_)) => Err(missing),
        Err(_) => Err(ProvisionError::ConfigFormat(format!(
            "[{}] {} is not a string",
            CREDENTIAL_SECTION, key
        ))),
    }
}
