//! Session Files
//!
//! One upload slot: the latest video replaces the previous one, and
//! rendered images live next to it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::StorageError;

/// File layout of the session directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub videos_dir: PathBuf,
    pub video_file: String,
    pub transcoded_file: String,
    pub plot_file: String,
    pub pie_file: String,
    /// Analysis records kept in memory
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            videos_dir: PathBuf::from("videos"),
            video_file: "session.mp4".to_string(),
            transcoded_file: "session_transcoded.mp4".to_string(),
            plot_file: "eye_tracking_plot.png".to_string(),
            pie_file: "attention_pie.png".to_string(),
            history_limit: 100,
        }
    }
}

/// Session directory access
#[derive(Debug, Clone)]
pub struct SessionStore {
    config: StorageConfig,
}

impl SessionStore {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        for name in [
            &config.video_file,
            &config.transcoded_file,
            &config.plot_file,
            &config.pie_file,
        ] {
            validate_file_name(name)?;
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn dir(&self) -> &Path {
        &self.config.videos_dir
    }

    pub fn video_path(&self) -> PathBuf {
        self.config.videos_dir.join(&self.config.video_file)
    }

    pub fn transcoded_path(&self) -> PathBuf {
        self.config.videos_dir.join(&self.config.transcoded_file)
    }

    pub fn plot_path(&self) -> PathBuf {
        self.config.videos_dir.join(&self.config.plot_file)
    }

    pub fn pie_path(&self) -> PathBuf {
        self.config.videos_dir.join(&self.config.pie_file)
    }

    pub fn has_video(&self) -> bool {
        self.video_path().is_file()
    }

    /// Create the session directory if missing
    pub fn ensure_dir(&self) -> Result<&Path, StorageError> {
        let dir = self.dir();
        std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        Ok(dir)
    }

    /// Start replacing the session video
    ///
    /// Chunks go to a sibling `.part` file that [`VideoUpload::commit`]
    /// renames into place, so readers never observe a half-written video.
    pub async fn begin_video(&self) -> Result<VideoUpload, StorageError> {
        let dir = self.dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::io(dir, e))?;

        let target = self.video_path();
        let partial = partial_path(&target);
        let file = File::create(&partial)
            .await
            .map_err(|e| StorageError::io(&partial, e))?;
        debug!("Receiving session video into {}", partial.display());
        Ok(VideoUpload {
            file,
            partial,
            target,
            written: 0,
        })
    }

    /// Move a transcoded file over the session video
    pub fn promote_transcoded(&self) -> Result<PathBuf, StorageError> {
        let from = self.transcoded_path();
        if !from.is_file() {
            return Err(StorageError::NotFound);
        }
        let to = self.video_path();
        std::fs::rename(&from, &to).map_err(|e| StorageError::io(&to, e))?;
        debug!("Promoted {} to {}", from.display(), to.display());
        Ok(to)
    }

    /// Remove a leftover transcode output; missing files are fine
    pub fn discard_transcoded(&self) {
        let path = self.transcoded_path();
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Session video being received
pub struct VideoUpload {
    file: File,
    partial: PathBuf,
    target: PathBuf,
    written: u64,
}

impl VideoUpload {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| StorageError::io(&self.partial, e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush and move the received file over the session video
    pub async fn commit(mut self) -> Result<PathBuf, StorageError> {
        self.file
            .flush()
            .await
            .map_err(|e| StorageError::io(&self.partial, e))?;
        drop(self.file);
        tokio::fs::rename(&self.partial, &self.target)
            .await
            .map_err(|e| StorageError::io(&self.target, e))?;

        info!("Saved {} byte session video to: {}", self.written, self.target.display());
        Ok(self.target)
    }

    /// Drop the partial file, leaving the previous session video in place
    pub async fn abort(self) {
        drop(self.file);
        if let Err(e) = tokio::fs::remove_file(&self.partial).await {
            warn!("Could not remove {}: {}", self.partial.display(), e);
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    target.with_file_name(name)
}

/// Session file names are bare names inside the session directory
fn validate_file_name(name: &str) -> Result<(), StorageError> {
    let bare = Path::new(name)
        .file_name()
        .map(|n| n == std::ffi::OsStr::new(name))
        .unwrap_or(false);
    if name.is_empty() || !bare || name == "." || name == ".." {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> SessionStore {
        SessionStore::new(StorageConfig {
            videos_dir: dir.join("videos"),
            ..Default::default()
        })
        .unwrap()
    }

    async fn save(store: &SessionStore, chunks: &[&[u8]]) -> PathBuf {
        let mut upload = store.begin_video().await.unwrap();
        for chunk in chunks {
            upload.write_chunk(chunk).await.unwrap();
        }
        upload.commit().await.unwrap()
    }

    #[tokio::test]
    async fn test_upload_replaces_previous() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        assert!(!store.has_video());

        let path = save(&store, &[b"first"]).await;
        assert_eq!(path, tmp.path().join("videos").join("session.mp4"));
        assert!(store.has_video());

        save(&store, &[b"second ", b"upload"]).await;
        assert_eq!(std::fs::read(&path).unwrap(), b"second upload");
        assert!(!partial_path(&path).exists());
    }

    #[tokio::test]
    async fn test_aborted_upload_keeps_previous_video() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let path = save(&store, &[b"kept"]).await;

        let mut upload = store.begin_video().await.unwrap();
        upload.write_chunk(b"half a vid").await.unwrap();
        assert_eq!(upload.bytes_written(), 10);
        assert!(partial_path(&path).exists());
        upload.abort().await;

        assert_eq!(std::fs::read(&path).unwrap(), b"kept");
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_paths_share_session_dir() {
        let store = SessionStore::new(StorageConfig::default()).unwrap();
        assert_eq!(store.plot_path(), PathBuf::from("videos/eye_tracking_plot.png"));
        assert_eq!(store.pie_path(), PathBuf::from("videos/attention_pie.png"));
        assert_eq!(store.video_path().parent(), store.plot_path().parent());
    }

    #[test]
    fn test_rejects_nested_file_names() {
        for bad in ["", "..", "../escape.mp4", "a/b.png"] {
            let config = StorageConfig {
                plot_file: bad.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(SessionStore::new(config), Err(StorageError::InvalidName(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn test_promote_transcoded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        store.ensure_dir().unwrap();
        assert!(matches!(store.promote_transcoded(), Err(StorageError::NotFound)));

        std::fs::write(store.transcoded_path(), b"h264").unwrap();
        let promoted = store.promote_transcoded().unwrap();
        assert_eq!(std::fs::read(promoted).unwrap(), b"h264");
        assert!(!store.transcoded_path().exists());

        // Second discard is a no-op
        store.discard_transcoded();
    }
}
