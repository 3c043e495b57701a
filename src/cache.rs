use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Hex characters of the hash used in output file names.
pub const FINGERPRINT_LEN: usize = 8;

/// Lowercase hex SHA-256 of `bytes`.
pub fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Content fingerprint: the first 8 hex characters of the SHA-256.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hash = compute_hash(bytes);
    hash.truncate(FINGERPRINT_LEN);
    hash
}

/// `"{stem}.{fingerprint}.{extension}"`
pub fn output_file_name(stem: &str, fingerprint: &str, extension: &str) -> String {
    format!(
        "{}.{}.{}",
        stem,
        fingerprint,
        extension.trim_start_matches('.')
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// An identical file already existed; nothing was written.
    Unchanged,
}

/// Output directory that skips rewriting files whose bytes are unchanged.
pub struct OutputCache {
    dir: PathBuf,
}

impl OutputCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub fn is_current(&self, file_name: &str, contents: &[u8]) -> bool {
        let path = self.path_for(file_name);
        match fs::read(&path) {
            Ok(existing) => compute_hash(&existing) == compute_hash(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("cannot read existing output {}: {}", path.display(), e);
                false
            }
        }
    }

    pub fn store(&self, file_name: &str, contents: &[u8]) -> io::Result<WriteOutcome> {
        if self.is_current(file_name, contents) {
            debug!("{} is up to date", file_name);
            return Ok(WriteOutcome::Unchanged);
        }
        fs::write(self.path_for(file_name), contents)?;
        Ok(WriteOutcome::Written)
    }
}
