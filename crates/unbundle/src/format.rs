use std::fmt;
use std::io::{self, Read};

pub const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
pub const BZIP2_MAGIC: &[u8] = b"BZh";
pub const XZ_MAGIC: &[u8] = &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
pub const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
pub const SEVEN_ZIP_MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

/// Which detector a handler belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    /// Multi-member containers, identified structurally.
    Archive,
    /// Single-file codecs, identified by magic bytes.
    Compression,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Tar(Codec),
    Zip,
    SevenZip,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Format {
    pub fn category(self) -> Category {
        match self {
            Self::Tar(_) | Self::Zip | Self::SevenZip => Category::Archive,
            Self::Gzip | Self::Bzip2 | Self::Xz | Self::Zstd => Category::Compression,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tar(Codec::None) => "tar",
            Self::Tar(Codec::Gzip) => "tar.gz",
            Self::Tar(Codec::Bzip2) => "tar.bz2",
            Self::Tar(Codec::Xz) => "tar.xz",
            Self::Tar(Codec::Zstd) => "tar.zst",
            Self::Zip => "zip",
            Self::SevenZip => "7z",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single-stream compression codec, standalone or wrapped around a tar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Codec {
    /// Guess the outer codec from the first bytes of a stream.
    ///
    /// Codecs whose feature is disabled are never reported.
    pub fn sniff(prefix: &[u8]) -> Self {
        if prefix.starts_with(GZIP_MAGIC) {
            Self::Gzip
        } else if prefix.starts_with(BZIP2_MAGIC) {
            Self::Bzip2
        } else if cfg!(feature = "xz") && prefix.starts_with(XZ_MAGIC) {
            Self::Xz
        } else if cfg!(feature = "zstd") && prefix.starts_with(ZSTD_MAGIC) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Create a decoder for this compression codec.
    pub fn decoder<R: Read>(self, reader: R) -> io::Result<Decoder<R>> {
        match self {
            Self::None => Ok(Decoder::Passthrough(reader)),
            Self::Gzip => Ok(Decoder::Gzip(Box::new(flate2::read::MultiGzDecoder::new(
                reader,
            )))),
            Self::Bzip2 => Ok(Decoder::Bzip2(Box::new(
                bzip2::read::MultiBzDecoder::new(reader),
            ))),
            #[cfg(feature = "xz")]
            Self::Xz => Ok(Decoder::Xz(Box::new(xz2::read::XzDecoder::new_multi_decoder(
                reader,
            )))),
            #[cfg(feature = "zstd")]
            Self::Zstd => Ok(Decoder::Zstd(Box::new(zstd::stream::read::Decoder::new(
                reader,
            )?))),
            #[allow(unreachable_patterns)]
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "compression codec not enabled",
            )),
        }
    }
}

/// Streaming decoder over one of the supported codecs.
pub enum Decoder<R: Read> {
    Passthrough(R),
    Gzip(Box<flate2::read::MultiGzDecoder<R>>),
    Bzip2(Box<bzip2::read::MultiBzDecoder<R>>),
    #[cfg(feature = "xz")]
    Xz(Box<xz2::read::XzDecoder<R>>),
    #[cfg(feature = "zstd")]
    Zstd(Box<zstd::stream::read::Decoder<'static, io::BufReader<R>>>),
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Passthrough(r) => r.read(buf),
            Self::Gzip(d) => d.read(buf),
            Self::Bzip2(d) => d.read(buf),
            #[cfg(feature = "xz")]
            Self::Xz(d) => d.read(buf),
            #[cfg(feature = "zstd")]
            Self::Zstd(d) => d.read(buf),
        }
    }
}
