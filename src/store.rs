use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::AppError;
use crate::tts::AudioFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAudioFile {
    pub path: PathBuf,
    pub file_name: String,
    pub byte_length: usize,
    pub final_text: String,
}

/// Flat directory of `audio_<unix_ms>.<ext>` files shared by all sessions.
pub struct AudioStore {
    dir: PathBuf,
    last_stamp: AtomicU64,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            last_stamp: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Millisecond timestamp, bumped past the previous one so two sessions
    /// finishing in the same millisecond still get distinct names.
    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);

        now.max(previous + 1)
    }

    /// Write `audio` as one new file. Bytes land in a hidden temp file first
    /// and are renamed into place, so readers never see a partial file.
    pub async fn persist(
        &self,
        audio: &[u8],
        format: AudioFormat,
        final_text: &str,
    ) -> Result<StoredAudioFile, AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!("audio_{}.{}", self.next_stamp(), format.extension());
        let path = self.dir.join(&file_name);
        let tmp_path = self.dir.join(format!(".{}.tmp", file_name));

        if let Err(e) = tokio::fs::write(&tmp_path, audio).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), bytes = audio.len(), "Stored audio file");

        Ok(StoredAudioFile {
            path,
            file_name,
            byte_length: audio.len(),
            final_text: final_text.to_string(),
        })
    }

    pub async fn read(&self, file: &StoredAudioFile) -> Result<Vec<u8>, AppError> {
        tokio::fs::read(&file.path)
            .await
            .map_err(AppError::StorageReadError)
    }
}
