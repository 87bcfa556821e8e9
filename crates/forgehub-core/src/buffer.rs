//! Package byte streams handed back by `get_module_buffer`.

use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

enum Body {
    Bytes(Bytes),
    Reader(BoxedReader),
}

/// A module package, either held in memory or streamed from a file or a
/// remote response.
pub struct ModuleBuffer {
    size: Option<u64>,
    body: Body,
}

impl ModuleBuffer {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            size: Some(bytes.len() as u64),
            body: Body::Bytes(bytes),
        }
    }

    /// Stream from any reader; `size` is reported as `Content-Length` when known.
    pub fn from_reader(reader: impl AsyncRead + Send + 'static, size: Option<u64>) -> Self {
        Self {
            size,
            body: Body::Reader(Box::pin(reader)),
        }
    }

    /// Open a package file for streaming.
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self::from_reader(file, Some(size)))
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn into_reader(self) -> BoxedReader {
        match self.body {
            Body::Bytes(bytes) => Box::pin(io::Cursor::new(bytes)),
            Body::Reader(reader) => reader,
        }
    }

    /// Read the whole package into memory.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self.body {
            Body::Bytes(bytes) => Ok(bytes),
            Body::Reader(mut reader) => {
                let mut data = Vec::with_capacity(self.size.unwrap_or(0) as usize);
                reader.read_to_end(&mut data).await?;
                Ok(Bytes::from(data))
            }
        }
    }
}

impl fmt::Debug for ModuleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            Body::Bytes(_) => "bytes",
            Body::Reader(_) => "stream",
        };
        f.debug_struct("ModuleBuffer")
            .field("size", &self.size)
            .field("body", &kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bytes_buffer_reports_size() {
        let buffer = ModuleBuffer::from_bytes(vec![1u8, 2, 3]);
        assert_eq!(buffer.size(), Some(3));
        assert_eq!(buffer.into_bytes().await.unwrap(), Bytes::from_static(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn test_file_buffer_streams_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.tar.gz");
        std::fs::write(&path, b"archive").unwrap();

        let buffer = ModuleBuffer::open(&path).await.unwrap();
        assert_eq!(buffer.size(), Some(7));

        let mut reader = buffer.into_reader();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"archive");
    }
}
