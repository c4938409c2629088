use std::path::{Path, PathBuf};

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::persist::{AtomicFileWriter, PersistError};
use crate::staging::{StagingArea, StorageError};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// `None` skips the manifest.
    pub manifest_filename: Option<String>,
    /// Timestamp recorded in the manifest; supplied by the caller's clock.
    pub exported_utc: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            manifest_filename: Some("manifest.json".to_string()),
            exported_utc: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub file_count: usize,
    pub total_bytes: u64,
    pub output_dir: PathBuf,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("manifest name {0:?} collides with an exported file")]
    ManifestCollision(String),
}

/// Copy `names` out of `staging` into `dest`, plus a JSON manifest listing
/// each file's name, size and sha256.
pub fn export_batch(
    staging: &dyn StagingArea,
    names: &[String],
    dest: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    if let Some(manifest) = &options.manifest_filename {
        if names.iter().any(|name| name == manifest) {
            return Err(ExportError::ManifestCollision(manifest.clone()));
        }
    }

    let writer = AtomicFileWriter::new(dest.to_path_buf());
    let mut total_bytes: u64 = 0;
    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let content = staging.read(name)?;
        writer.write(name, &content)?;
        total_bytes += content.len() as u64;
        entries.push(json!({
            "name": name,
            "bytes": content.len(),
            "sha256": sha256_hex(&content),
        }));
    }

    let manifest_path = match &options.manifest_filename {
        Some(manifest_name) => {
            let manifest = json!({
                "file_count": names.len(),
                "total_bytes": total_bytes,
                "exported_utc": options.exported_utc,
                "files": entries,
            });
            Some(writer.write(manifest_name, manifest.to_string().as_bytes())?)
        }
        None => None,
    };

    Ok(ExportSummary {
        file_count: names.len(),
        total_bytes,
        output_dir: dest.to_path_buf(),
        manifest_path,
    })
}

fn sha256_hex(content: &[u8]) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(content);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
