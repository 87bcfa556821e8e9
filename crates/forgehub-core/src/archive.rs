//! Reading and writing gzip-compressed tar packages.
//!
//! Everything here is blocking; async callers go through
//! `tokio::task::spawn_blocking`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use regex::Regex;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("No archive entry matches {0}")]
    EntryNotFound(String),

    #[error("Archive I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Reads text entries out of a `.tar.gz` stream.
pub struct ArchiveReader<R: Read> {
    archive: tar::Archive<GzDecoder<R>>,
}

impl ArchiveReader<File> {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            archive: tar::Archive::new(GzDecoder::new(reader)),
        }
    }

    /// Contents of the first entry whose path matches `pattern`.
    pub fn read_entry(self, pattern: &Regex) -> Result<String, ArchiveError> {
        self.read_entries(&[pattern])?
            .pop()
            .flatten()
            .ok_or_else(|| ArchiveError::EntryNotFound(pattern.as_str().to_string()))
    }

    /// Scan the archive once and return, for each pattern, the contents of
    /// the first matching entry.
    pub fn read_entries(mut self, patterns: &[&Regex]) -> Result<Vec<Option<String>>, ArchiveError> {
        let mut found: Vec<Option<String>> = vec![None; patterns.len()];

        for entry in self.archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.to_string_lossy().into_owned();

            let Some(slot) = patterns
                .iter()
                .zip(found.iter())
                .position(|(pattern, value)| value.is_none() && pattern.is_match(&path))
            else {
                continue;
            };

            let mut contents = String::new();
            entry.read_to_string(&mut contents)?;
            found[slot] = Some(contents);

            if found.iter().all(Option::is_some) {
                break;
            }
        }

        Ok(found)
    }
}

type EntryWriter = Box<dyn FnOnce(&mut Vec<u8>) -> io::Result<()> + Send>;

struct GeneratedEntry {
    mode: u32,
    write: EntryWriter,
}

/// Builds a `.tar.gz` from an optional directory tree plus generated files.
///
/// Generated files replace directory files at the same relative path. All
/// entries are placed under `prefix` when one is set.
#[derive(Default)]
pub struct ArchiveWriter {
    prefix: Option<PathBuf>,
    directory: Option<PathBuf>,
    generated: BTreeMap<String, GeneratedEntry>,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Include every file below `directory`, keeping relative paths.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Add a file whose contents are produced by `write` when the archive is built.
    pub fn add_file<F>(&mut self, path: &str, mode: u32, write: F)
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()> + Send + 'static,
    {
        self.generated.insert(
            path.trim_start_matches('/').to_string(),
            GeneratedEntry {
                mode,
                write: Box::new(write),
            },
        );
    }

    fn entry_path(&self, relative: &Path) -> PathBuf {
        match &self.prefix {
            Some(prefix) => prefix.join(relative),
            None => relative.to_path_buf(),
        }
    }

    /// Write the compressed archive into `writer` and hand it back.
    pub fn write_to<W: Write>(self, writer: W) -> Result<W, ArchiveError> {
        let mut builder = tar::Builder::new(GzEncoder::new(writer, Compression::default()));
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);

        if let Some(prefix) = &self.prefix {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_mtime(now);
            builder.append_data(&mut header, prefix, io::empty())?;
        }

        if let Some(directory) = &self.directory {
            for entry in WalkDir::new(directory).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(io::Error::from)?;
                let relative = entry
                    .path()
                    .strip_prefix(directory)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
                if self.generated.contains_key(&*relative.to_string_lossy()) {
                    continue;
                }

                let name = self.entry_path(relative);
                if entry.file_type().is_dir() {
                    builder.append_dir(&name, entry.path())?;
                } else {
                    builder.append_path_with_name(entry.path(), &name)?;
                }
            }
        }

        let prefix = self.prefix.clone();
        for (path, generated) in self.generated {
            let mut data = Vec::new();
            (generated.write)(&mut data)?;

            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(generated.mode);
            header.set_mtime(now);

            let name = match &prefix {
                Some(prefix) => prefix.join(&path),
                None => PathBuf::from(&path),
            };
            builder.append_data(&mut header, name, data.as_slice())?;
        }

        let encoder = builder.into_inner()?;
        Ok(encoder.finish()?)
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, ArchiveError> {
        self.write_to(Vec::new())
    }
}
