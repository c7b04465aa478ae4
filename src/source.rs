use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::io;
use std::path::PathBuf;
use tokio::fs as tokio_fs;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file handed to the analysis, not yet read.
#[async_trait]
pub trait SourceFile: Send + Sync {
    /// Relative, `/`-separated path as reported by the directory picker.
    fn path(&self) -> &str;

    /// Declared media type, empty when unknown.
    fn mime_type(&self) -> &str;

    fn size(&self) -> u64;

    async fn read_text(&self) -> io::Result<String>;

    async fn read_base64(&self) -> io::Result<String>;

    fn name(&self) -> &str {
        let path = self.path();
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// A file posted by the browser. `data` is omitted for large non-image files,
/// which are never read.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub path: String,
    #[serde(default)]
    pub mime_type: String,
    pub size: u64,
    #[serde(default)]
    pub data: Option<String>,
}

impl UploadedFile {
    fn decoded(&self) -> io::Result<Vec<u8>> {
        let data = self.data.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No content was uploaded for '{}'", self.path),
            )
        })?;
        STANDARD
            .decode(data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[async_trait]
impl SourceFile for UploadedFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_text(&self) -> io::Result<String> {
        Ok(String::from_utf8_lossy(&self.decoded()?).into_owned())
    }

    async fn read_base64(&self) -> io::Result<String> {
        // Validate before handing the payload on unchanged.
        self.decoded()?;
        self.data
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing upload data"))
    }
}

/// A file on the server's disk, read lazily.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub mime_type: String,
    pub size: u64,
}

impl LocalFile {
    pub fn new(relative_path: String, absolute_path: PathBuf, size: u64) -> Self {
        let mime_type = mime_guess::from_path(&absolute_path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();
        LocalFile {
            relative_path,
            absolute_path,
            mime_type,
            size,
        }
    }
}

#[async_trait]
impl SourceFile for LocalFile {
    fn path(&self) -> &str {
        &self.relative_path
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_text(&self) -> io::Result<String> {
        let bytes = tokio_fs::read(&self.absolute_path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn read_base64(&self) -> io::Result<String> {
        let bytes = tokio_fs::read(&self.absolute_path).await?;
        Ok(STANDARD.encode(bytes))
    }
}
