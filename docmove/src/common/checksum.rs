use crate::errors::MoveResult;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Computes the SHA-256 digest of `bytes` as lowercase hex.
///
/// ```rust
/// use docmove::common::checksum;
///
/// assert_eq!(checksum(b"abc"), checksum(b"abc"));
/// assert_ne!(checksum(b"abc"), checksum(b"abd"));
/// ```
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Checksum of a single file's content.
pub fn checksum_file(path: &Path) -> MoveResult<String> {
    let bytes = fs::read(path)?;
    Ok(checksum(&bytes))
}

/// Checksum over the names and contents of several files.
///
/// Files are fed to the hasher sorted by path, so the digest does not depend on
/// the order the files were listed in. Each file contributes its length-prefixed
/// file name followed by its length-prefixed content, so renaming a file or
/// moving bytes between files changes the digest. The parent directory is not
/// hashed.
pub fn checksum_files(paths: &[PathBuf]) -> MoveResult<String> {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    for path in sorted {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = fs::read(path)?;

        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }
    Ok(hex::encode(hasher.finalize()))
}
