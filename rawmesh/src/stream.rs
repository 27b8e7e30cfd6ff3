//! Byte stream contract shared by all readers
//!
//! Readers only ever see a [`SourceStream`]: they read and seek, ask for the
//! size and use the name for diagnostics. Ownership stays with the caller;
//! readers never close or reopen the stream.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Readable, seekable asset source
pub trait SourceStream: Read + Seek {
    /// Name used in log messages and for format detection (usually a file name)
    fn name(&self) -> &str;

    /// Directory used to resolve side files (glTF external buffers)
    fn base_dir(&self) -> Option<&Path> {
        None
    }

    /// Total size of the stream in bytes
    fn size_in_bytes(&mut self) -> io::Result<u64> {
        let current = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(current))?;
        Ok(end)
    }
}

/// Read everything from the current position to the end of the stream
pub fn read_to_end(stream: &mut dyn SourceStream) -> io::Result<Vec<u8>> {
    let remaining = stream
        .size_in_bytes()?
        .saturating_sub(stream.stream_position()?);
    let mut data = Vec::with_capacity(remaining as usize);
    stream.read_to_end(&mut data)?;
    Ok(data)
}

/// Buffered file stream
pub struct FileStream {
    reader: BufReader<File>,
    path: PathBuf,
    name: String,
}

impl FileStream {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            reader: BufReader::new(file),
            name: path.display().to_string(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl SourceStream for FileStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_dir(&self) -> Option<&Path> {
        self.path.parent()
    }

    fn size_in_bytes(&mut self) -> io::Result<u64> {
        Ok(self.reader.get_ref().metadata()?.len())
    }
}

/// In-memory stream, e.g. for assets embedded in a pack or generated by tests
pub struct MemoryStream {
    cursor: Cursor<Vec<u8>>,
    name: String,
    base_dir: Option<PathBuf>,
}

impl MemoryStream {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(data),
            name: name.into(),
            base_dir: None,
        }
    }

    /// Resolve side files relative to `dir`
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl SourceStream for MemoryStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    fn size_in_bytes(&mut self) -> io::Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }
}
