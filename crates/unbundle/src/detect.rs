//! Format detection: an explicit, ordered registry of format handlers.

use tracing::{debug, info};

use crate::backend;
use crate::error::{Error, Result};
use crate::format::{Category, Format};
use crate::session::Session;
use crate::source::Source;

/// A format backend that can recognise a stream and open a session over it.
pub trait FormatHandler: Send + Sync {
    /// The format this handler produces when it claims a stream.
    ///
    /// Tar reports the uncompressed variant; the session carries the exact one.
    fn format(&self) -> Format;

    fn category(&self) -> Category {
        self.format().category()
    }

    /// Whether this handler claims `source`.
    ///
    /// Never fails: I/O or parse trouble while probing is a non-match. The
    /// registry rewinds the source after every probe.
    fn detect(&self, source: &mut Source) -> bool;

    /// Open a session. Fails with [`Error::FormatOpen`] if the body is
    /// unusable even though detection passed.
    fn open(&self, source: Source) -> Result<Box<dyn Session>>;
}

/// Ordered handler lists consulted by the archive and compression detectors.
pub struct Registry {
    archives: Vec<Box<dyn FormatHandler>>,
    compressions: Vec<Box<dyn FormatHandler>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            archives: Vec::new(),
            compressions: Vec::new(),
        }
    }

    /// Every handler compiled into this build, in detection order:
    /// tar, zip, 7z, then bzip2, gzip, xz, zstd.
    pub fn standard() -> Self {
        let mut registry = Self::empty().with_archive(backend::tar::TarHandler);
        #[cfg(feature = "zip")]
        {
            registry = registry.with_archive(backend::zip::ZipHandler);
        }
        #[cfg(feature = "sevenz")]
        {
            registry = registry.with_archive(backend::sevenz::SevenZipHandler);
        }
        registry = registry
            .with_compression(backend::compressed::CompressedHandler::BZIP2)
            .with_compression(backend::compressed::CompressedHandler::GZIP);
        #[cfg(feature = "xz")]
        {
            registry = registry.with_compression(backend::compressed::CompressedHandler::XZ);
        }
        #[cfg(feature = "zstd")]
        {
            registry = registry.with_compression(backend::compressed::CompressedHandler::ZSTD);
        }
        registry
    }

    pub fn with_archive(mut self, handler: impl FormatHandler + 'static) -> Self {
        self.archives.push(Box::new(handler));
        self
    }

    pub fn with_compression(mut self, handler: impl FormatHandler + 'static) -> Self {
        self.compressions.push(Box::new(handler));
        self
    }

    pub fn archives(&self) -> impl Iterator<Item = &dyn FormatHandler> {
        self.archives.iter().map(|h| &**h)
    }

    pub fn compressions(&self) -> impl Iterator<Item = &dyn FormatHandler> {
        self.compressions.iter().map(|h| &**h)
    }

    /// First handler claiming `source`, archives before compressions.
    pub fn identify(&self, source: &mut Source) -> Result<&dyn FormatHandler> {
        match self.identify_archive(source) {
            Err(Error::UnrecognizedFormat) => self.identify_compression(source),
            found => found,
        }
    }

    pub fn identify_archive(&self, source: &mut Source) -> Result<&dyn FormatHandler> {
        probe(self.archives(), source)
    }

    pub fn identify_compression(&self, source: &mut Source) -> Result<&dyn FormatHandler> {
        probe(self.compressions(), source)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

fn probe<'a>(
    handlers: impl Iterator<Item = &'a dyn FormatHandler>,
    source: &mut Source,
) -> Result<&'a dyn FormatHandler> {
    for handler in handlers {
        source.rewind()?;
        let claimed = handler.detect(source);
        source.rewind()?;
        debug!(source = source.name(), format = %handler.format(), claimed, "probed");
        if claimed {
            info!(source = source.name(), format = %handler.format(), "identified");
            return Ok(handler);
        }
    }
    Err(Error::UnrecognizedFormat)
}

/// Identify and open `source` with the standard registry.
pub fn open(mut source: Source) -> Result<Box<dyn Session>> {
    let registry = Registry::standard();
    let handler = registry.identify(&mut source)?;
    handler.open(source)
}
