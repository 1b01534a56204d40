use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ProvisionError;

/// Upper bound on the decrypted configuration entry
pub const MAX_CONFIG_BYTES: u64 = 64 * 1024;

/// Removes the plaintext copy of the configuration entry when dropped.
///
/// Acquired before the archive is opened so the file is gone on every
/// exit path, including early failures.
pub struct ResidueGuard {
    path: PathBuf,
}

impl ResidueGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ResidueGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Removed decrypted configuration left on disk"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove decrypted configuration"
                );
            }
        }
    }
}

/// Path where an extracted copy of `entry` would land next to the archive
pub fn residue_path(archive_path: &Path, entry: &str) -> PathBuf {
    let file_name = Path::new(entry)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| entry.into());

    archive_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(file_name)
}

/// Decrypt one entry of a password-protected ZIP archive into memory.
///
/// The plaintext never touches the filesystem.
pub fn read_entry(
    archive_path: &Path,
    entry: &str,
    passphrase: &str,
) -> Result<Vec<u8>, ProvisionError> {
    let file = File::open(archive_path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ProvisionError::ArchiveNotFound(archive_path.to_path_buf()),
        _ => ProvisionError::ArchiveIo(e),
    })?;

    let mut archive = ZipArchive::new(file).map_err(|e| {
        tracing::debug!(error = %e, "Archive could not be opened");
        ProvisionError::Authentication
    })?;

    let mut zipped = archive
        .by_name_decrypt(entry, passphrase.as_bytes())
        .map_err(|e| match e {
            ZipError::FileNotFound => ProvisionError::MissingEntry(entry.to_string()),
            ZipError::InvalidPassword => ProvisionError::Authentication,
            other => {
                tracing::debug!(error = %other, "Archive entry could not be decrypted");
                ProvisionError::Authentication
            }
        })?;

    // The declared size comes from the archive itself and is not trusted.
    // AES entries verify their MAC, ZipCrypto entries their CRC, at end of read
    let mut plaintext = Vec::new();
    zipped
        .by_ref()
        .take(MAX_CONFIG_BYTES + 1)
        .read_to_end(&mut plaintext)
        .map_err(|e| {
            tracing::debug!(error = %e, "Archive entry failed integrity check");
            ProvisionError::Authentication
        })?;

    if plaintext.len() as u64 > MAX_CONFIG_BYTES {
        return Err(ProvisionError::ConfigFormat(format!(
            "configuration entry exceeds {} bytes",
            MAX_CONFIG_BYTES
        )));
    }

    tracing::debug!(bytes = plaintext.len(), "Decrypted archive entry into memory");
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{AesMode, ZipWriter};

    fn write_archive(path: &Path, entry: &str, body: &str, password: &str) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().with_aes_encryption(AesMode::Aes256, password);
        writer.start_file(entry, options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_residue_path_next_to_archive() {
        assert_eq!(
            residue_path(Path::new("secrets/protected_config.zip"), "config.ini"),
            PathBuf::from("secrets/config.ini")
        );
        assert_eq!(
            residue_path(Path::new("protected_config.zip"), "config.ini"),
            PathBuf::from("config.ini")
        );
        // Entry paths inside the archive never escape the archive directory
        assert_eq!(
            residue_path(Path::new("a/b.zip"), "../../etc/config.ini"),
            PathBuf::from("a/config.ini")
        );
    }

    #[test]
    fn test_guard_removes_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[binance]\napi_key = k\n").unwrap();

        {
            let guard = ResidueGuard::new(&path);
            assert_eq!(guard.path(), path.as_path());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_guard_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        drop(ResidueGuard::new(&path));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_entry_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("protected.zip");
        write_archive(&archive, "config.ini", "[binance]\napi_key = abc\n", "hunter2");

        let bytes = read_entry(&archive, "config.ini", "hunter2").unwrap();
        assert_eq!(bytes, b"[binance]\napi_key = abc\n");
    }

    #[test]
    fn test_wrong_passphrase_is_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("protected.zip");
        write_archive(&archive, "config.ini", "[binance]\n", "hunter2");

        let err = read_entry(&archive, "config.ini", "wrong").unwrap_err();
        assert!(matches!(err, ProvisionError::Authentication));
    }

    #[test]
    fn test_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("protected.zip");
        write_archive(&archive, "other.ini", "[binance]\n", "hunter2");

        let err = read_entry(&archive, "config.ini", "hunter2").unwrap_err();
        assert!(matches!(err, ProvisionError::MissingEntry(ref e) if e == "config.ini"));
    }

    #[test]
    fn test_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("nope.zip");

        let err = read_entry(&archive, "config.ini", "hunter2").unwrap_err();
        assert!(matches!(err, ProvisionError::ArchiveNotFound(_)));
    }

    #[test]
    fn test_oversize_entry_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("protected.zip");
        let body = format!(
            "[binance]\napi_key = k\napi_secret = s\n; {}\n",
            "x".repeat(MAX_CONFIG_BYTES as usize)
        );
        write_archive(&archive, "config.ini", &body, "hunter2");

        let err = read_entry(&archive, "config.ini", "hunter2").unwrap_err();
        assert!(matches!(err, ProvisionError::ConfigFormat(_)));
    }

    #[test]
    fn test_corrupt_archive_is_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("protected.zip");
        std::fs::write(&archive, b"definitely not a zip file").unwrap();

        let err = read_entry(&archive, "config.ini", "hunter2").unwrap_err();
        assert!(matches!(err, ProvisionError::Authentication));
    }
}
