//! Local persistence for fetched documents
//!
//! The relay keeps a copy of the profile photo (`<digilockerid>.jpeg`) and
//! of every downloaded PDF (`<fileId>.pdf`). Decoding is separate from
//! writing so each step can be exercised on its own.
//!
//! Writes go to a temp file in the target directory and are renamed into
//! place, so a crash never leaves a half-written document under its final
//! name. The file handle lives only inside `write_file`; the temp file is
//! removed on every failure path. Permissions are 0600 on unix because the
//! documents are identity records.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};

/// Standard alphabet, tolerant of missing or present padding
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Validate an identifier that will become a file name.
///
/// Accepts a non-blank single path component: no separators, not `.` or
/// `..`, and no control characters, so the id is also usable in a
/// `Content-Disposition` header.
pub fn file_name_component(id: &str) -> Result<&str> {
    let invalid = id.trim().is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.chars().any(char::is_control);
    if invalid {
        return Err(Error::InvalidFileName(id.to_string()));
    }
    Ok(id)
}

/// Decode a base64 image, with or without a `data:image/<type>;base64,` prefix.
pub fn decode_data_uri_image(picture: &str) -> Result<Vec<u8>> {
    let data = strip_data_uri_prefix(picture);
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT_STANDARD
        .decode(compact)
        .map_err(|e| Error::Decode(format!("profile picture is not base64: {e}")))
}

fn strip_data_uri_prefix(picture: &str) -> &str {
    picture
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .filter(|(kind, _)| {
            !kind.is_empty() && kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .map_or(picture, |(_, data)| data)
}

/// Directory that receives persisted documents.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode a profile picture and store it as `<digilocker_id>.jpeg`.
    pub async fn save_profile_image(&self, digilocker_id: &str, picture: &str) -> Result<PathBuf> {
        let id = file_name_component(digilocker_id)?;
        let bytes = decode_data_uri_image(picture)?;
        self.save(&format!("{id}.jpeg"), &bytes).await
    }

    /// Store a downloaded document as `<file_id>.pdf`.
    pub async fn save_file(&self, file_id: &str, bytes: &[u8]) -> Result<PathBuf> {
        let id = file_name_component(file_id)?;
        self.save(&format!("{id}.pdf"), bytes).await
    }

    /// Atomically write `bytes` to `<dir>/<name>`, replacing any previous copy.
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = file_name_component(name)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Io(format!("creating {}: {e}", self.dir.display())))?;

        let target = self.dir.join(name);
        let tmp = self.dir.join(format!(
            ".{name}.tmp.{}.{}",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = write_file(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Io(format!("renaming into {}: {e}", target.display())));
        }

        debug!(path = %target.display(), bytes = bytes.len(), "artifact persisted");
        Ok(target)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| Error::Io(format!("creating {}: {e}", path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| Error::Io(format!("setting permissions on {}: {e}", path.display())))?;
    }

    file.write_all(bytes)
        .await
        .map_err(|e| Error::Io(format!("writing {}: {e}", path.display())))?;
    file.sync_all()
        .await
        .map_err(|e| Error::Io(format!("syncing {}: {e}", path.display())))?;
    Ok(())
}
