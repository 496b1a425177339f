use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Object-safe `Read + Seek`.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// A named, rewindable byte stream handed to detectors and handlers.
///
/// Detection probes read from the start and must leave the source rewound, so
/// every handler needs random access. Non-seekable input is buffered up front.
pub struct Source {
    name: String,
    inner: Box<dyn ReadSeek>,
}

impl Source {
    /// Open a file; the source is named after the final path component.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self::from_seekable(name, BufReader::new(file)))
    }

    pub fn from_seekable(name: impl Into<String>, reader: impl Read + Seek + 'static) -> Self {
        Self {
            name: name.into(),
            inner: Box::new(reader),
        }
    }

    /// Buffer a forward-only stream so it can be probed more than once.
    pub fn from_reader(name: impl Into<String>, mut reader: impl Read) -> io::Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(Self::from_seekable(name, Cursor::new(buf)))
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_seekable(name, Cursor::new(bytes.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Read up to `n` bytes from the start, then rewind.
    pub fn peek(&mut self, n: usize) -> io::Result<Vec<u8>> {
        self.rewind()?;
        let mut buf = Vec::with_capacity(n);
        (&mut self.inner).take(n as u64).read_to_end(&mut buf)?;
        self.rewind()?;
        Ok(buf)
    }

    /// Total length in bytes. Leaves the source rewound.
    pub fn len(&mut self) -> io::Result<u64> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.rewind()?;
        Ok(len)
    }

    pub fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drain the whole stream into memory, from the start.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        self.rewind()?;
        let mut buf = Vec::new();
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for Source {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source").field("name", &self.name).finish_non_exhaustive()
    }
}
