use std::io::{self, Read, Write};

use tracing::debug;

use crate::detect::FormatHandler;
use crate::error::{Error, Result};
use crate::format::{BZIP2_MAGIC, Codec, Format, GZIP_MAGIC, XZ_MAGIC, ZSTD_MAGIC};
use crate::session::{Member, Session};
use crate::source::Source;

/// A single-file codec identified by a fixed magic prefix.
#[derive(Clone, Copy, Debug)]
pub struct CompressedHandler {
    format: Format,
    codec: Codec,
    magic: &'static [u8],
}

impl CompressedHandler {
    pub const BZIP2: Self = Self::new(Format::Bzip2, Codec::Bzip2, BZIP2_MAGIC);
    pub const GZIP: Self = Self::new(Format::Gzip, Codec::Gzip, GZIP_MAGIC);
    pub const XZ: Self = Self::new(Format::Xz, Codec::Xz, XZ_MAGIC);
    pub const ZSTD: Self = Self::new(Format::Zstd, Codec::Zstd, ZSTD_MAGIC);

    pub const fn new(format: Format, codec: Codec, magic: &'static [u8]) -> Self {
        Self {
            format,
            codec,
            magic,
        }
    }

    pub fn magic(&self) -> &'static [u8] {
        self.magic
    }
}

impl FormatHandler for CompressedHandler {
    fn format(&self) -> Format {
        self.format
    }

    fn detect(&self, source: &mut Source) -> bool {
        source
            .peek(self.magic.len())
            .is_ok_and(|prefix| prefix == self.magic)
    }

    fn open(&self, source: Source) -> Result<Box<dyn Session>> {
        Ok(Box::new(CompressedSession::new(source, self.format, self.codec)?))
    }
}

/// A compressed file presented as a one-member archive named after its source.
pub struct CompressedSession {
    format: Format,
    codec: Codec,
    source: Source,
    members: [Member; 1],
}

impl CompressedSession {
    /// Decode the whole body once so a corrupt stream fails here rather than
    /// halfway through a later read.
    pub fn new(mut source: Source, format: Format, codec: Codec) -> Result<Self> {
        source.rewind()?;
        let size = codec
            .decoder(&mut source)
            .and_then(|mut d| io::copy(&mut d, &mut io::sink()))
            .map_err(|e| Error::open(format, e))?;
        source.rewind()?;
        debug!(source = source.name(), %format, size, "compressed body verified");
        let member = Member::file(source.name(), size);
        Ok(Self {
            format,
            codec,
            source,
            members: [member],
        })
    }
}

impl Session for CompressedSession {
    fn format(&self) -> Format {
        self.format
    }

    fn members(&self) -> &[Member] {
        &self.members
    }

    fn read_member(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        if name != self.members[0].name {
            return Err(Error::MemberNotFound(name.to_string()));
        }
        self.source.rewind()?;
        Ok(Box::new(self.codec.decoder(&mut self.source)?))
    }

    fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        let member = &self.members[0];
        writeln!(out, "{} ({}, {} bytes)", member.name, self.format, member.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bzip2(data: &[u8]) -> Vec<u8> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn magic_prefix_detection() {
        let handler = CompressedHandler::BZIP2;
        assert!(handler.detect(&mut Source::from_bytes("a.bz2", b"BZh91AY&SY".to_vec())));
        assert!(!handler.detect(&mut Source::from_bytes("a.bz2", b"BZ".to_vec())));
        assert!(CompressedHandler::GZIP.detect(&mut Source::from_bytes("a.gz", vec![0x1F, 0x8B, 8])));
    }

    #[test]
    fn single_synthetic_member() {
        let source = Source::from_bytes("hello.txt.bz2", bzip2(b"hello world"));
        let mut session = CompressedHandler::BZIP2.open(source).unwrap();
        assert_eq!(session.format(), Format::Bzip2);
        assert_eq!(session.member_names(), ["hello.txt.bz2"]);
        assert_eq!(session.members()[0].size, 11);

        let mut out = String::new();
        session
            .read_member("hello.txt.bz2")
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello world");

        // Reads restart from the beginning
        let mut again = Vec::new();
        session.read_member("hello.txt.bz2").unwrap().read_to_end(&mut again).unwrap();
        assert_eq!(again, b"hello world");
    }

    #[test]
    fn other_names_are_missing() {
        let source = Source::from_bytes("x.bz2", bzip2(b"x"));
        let mut session = CompressedHandler::BZIP2.open(source).unwrap();
        assert!(matches!(session.read_member("y"), Err(Error::MemberNotFound(_))));
    }

    #[test]
    fn corrupt_bzip2_body() {
        let source = Source::from_bytes("bad.bz2", b"BZh9 this is not a bzip2 block".to_vec());
        assert!(matches!(
            CompressedHandler::BZIP2.open(source),
            Err(Error::FormatOpen {
                format: Format::Bzip2,
                ..
            })
        ));
    }

    #[test]
    fn corrupt_gzip_body() {
        let mut data = vec![0x1F, 0x8B, 0x08, 0, 0, 0, 0, 0, 0, 0xFF];
        data.extend_from_slice(&[0xFF; 16]);
        let source = Source::from_bytes("bad.gz", data);
        assert!(matches!(
            CompressedHandler::GZIP.open(source),
            Err(Error::FormatOpen {
                format: Format::Gzip,
                ..
            })
        ));
    }

    #[test]
    fn listing_names_format() {
        let source = Source::from_bytes("n.bz2", bzip2(b"abc"));
        let session = CompressedHandler::BZIP2.open(source).unwrap();
        let mut out = Vec::new();
        session.list(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "n.bz2 (bzip2, 3 bytes)\n");
    }
}
