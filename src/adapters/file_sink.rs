use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::domain::{Artifact, DomainError};
use crate::ports::ArtifactSink;

/// Saves artifacts into a directory, the way a browser download would.
pub struct FileArtifactSink {
    dir: PathBuf,
}

impl FileArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink writing to the OS download directory.
    pub fn downloads() -> Result<Self, DomainError> {
        dirs::download_dir()
            .map(Self::new)
            .ok_or_else(|| DomainError::Config("Could not find download directory".to_string()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free path for `filename`, adding " (n)" before the extension.
    fn unique_path(&self, filename: &str) -> PathBuf {
        let candidate = self.dir.join(filename);
        if !candidate.exists() {
            return candidate;
        }

        let (stem, ext) = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (filename, None),
        };
        (1..)
            .map(|n| match ext {
                Some(ext) => self.dir.join(format!("{} ({}).{}", stem, n, ext)),
                None => self.dir.join(format!("{} ({})", stem, n)),
            })
            .find(|p| !p.exists())
            .unwrap_or(candidate)
    }
}

/// Reject anything that is not a bare file name.
fn sanitize(filename: &str) -> Result<&str, DomainError> {
    match Path::new(filename).file_name().and_then(|n| n.to_str()) {
        Some(name) if name == filename => Ok(name),
        _ => Err(DomainError::InvalidInput {
            field: "filename",
            message: format!("'{}' is not a plain file name", filename),
        }),
    }
}

#[async_trait]
impl ArtifactSink for FileArtifactSink {
    async fn save(&self, artifact: &Artifact, filename: &str) -> Result<PathBuf, DomainError> {
        let filename = sanitize(filename)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.unique_path(filename);
        // Ephemeral reference: renamed into place on success, removed otherwise.
        let temp_path = self.dir.join(format!(".{}.part", filename));

        let cleanup_temp = || {
            let temp = temp_path.clone();
            async move {
                let _ = tokio::fs::remove_file(&temp).await;
            }
        };

        let write = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(artifact.bytes()).await?;
            file.flush().await?;
            Ok::<(), std::io::Error>(())
        };
        if let Err(e) = write.await {
            cleanup_temp().await;
            return Err(DomainError::Io(e.to_string()));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &target).await {
            cleanup_temp().await;
            return Err(DomainError::Io(e.to_string()));
        }

        debug!(temp = ?temp_path, "Ephemeral save reference released");
        info!(path = ?target, bytes = artifact.len(), "Artifact saved");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_writes_bytes_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileArtifactSink::new(dir.path());
        let artifact = Artifact::new(b"mp4-bytes".to_vec(), "video/mp4");

        let path = sink.save(&artifact, "presentation-video.mp4").await.unwrap();
        assert_eq!(path, dir.path().join("presentation-video.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), b"mp4-bytes");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_save_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileArtifactSink::new(dir.path());

        let first = sink
            .save(&Artifact::new(vec![1], "video/mp4"), "clip.mp4")
            .await
            .unwrap();
        let second = sink
            .save(&Artifact::new(vec![2], "video/mp4"), "clip.mp4")
            .await
            .unwrap();

        assert_eq!(second, dir.path().join("clip (1).mp4"));
        assert_eq!(std::fs::read(first).unwrap(), vec![1]);
        assert_eq!(std::fs::read(second).unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_save_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileArtifactSink::new(dir.path());
        let result = sink
            .save(&Artifact::new(vec![1], "video/mp4"), "../escape.mp4")
            .await;
        assert!(matches!(result, Err(DomainError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileArtifactSink::new(dir.path().join("nested").join("videos"));
        let path = sink
            .save(&Artifact::new(vec![7; 4], "video/mp4"), "a.mp4")
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(sink.dir(), dir.path().join("nested").join("videos"));
    }
}
