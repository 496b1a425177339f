//! Uniform iteration over "whatever this file is": the members of an archive,
//! or the single decompressed body of a compressed file.

use std::io::{Cursor, Read};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::detect::{FormatHandler, Registry};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::session::Session;
use crate::source::Source;

/// Open `source` as an archive if an archive handler claims it, otherwise as
/// a compressed file.
///
/// Input nobody recognizes is an error, never an empty bundle. When a handler
/// claims the stream but cannot open it, the compression failure is reported
/// ahead of the archive failure.
pub fn files_in_bundle(source: Source) -> Result<Bundle> {
    open_bundle(&Registry::standard(), source)
}

pub fn open_bundle(registry: &Registry, mut source: Source) -> Result<Bundle> {
    let archive = claimed(registry.identify_archive(&mut source))?;
    let compression = claimed(registry.identify_compression(&mut source))?;

    let session = match (archive, compression) {
        (None, None) => return Err(Error::UnrecognizedFormat),
        (Some(handler), None) | (None, Some(handler)) => handler.open(source)?,
        (Some(archive), Some(compression)) => {
            // Both claim it (a compressed tarball, say); keep the bytes so
            // the second open still has input if the first one fails.
            let name = source.name().to_string();
            let bytes: Arc<[u8]> = source.into_bytes()?.into();
            let copy = |bytes: &Arc<[u8]>| Source::from_seekable(name.clone(), Cursor::new(Arc::clone(bytes)));
            match archive.open(copy(&bytes)) {
                Ok(session) => session,
                Err(e) => {
                    warn!(source = %name, format = %archive.format(), error = %e, "archive open failed, trying compression");
                    compression.open(copy(&bytes))?
                }
            }
        }
    };
    debug!(format = %session.format(), members = session.members().len(), "bundle opened");
    Ok(Bundle { session, next: 0 })
}

fn claimed(found: Result<&dyn FormatHandler>) -> Result<Option<&dyn FormatHandler>> {
    match found {
        Ok(handler) => Ok(Some(handler)),
        Err(Error::UnrecognizedFormat) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Lazily yields `(name, content)` pairs in member order.
///
/// Each content reader borrows the bundle, so it must be dropped before the
/// next entry is requested.
pub struct Bundle {
    session: Box<dyn Session>,
    next: usize,
}

impl Bundle {
    pub fn format(&self) -> Format {
        self.session.format()
    }

    pub fn names(&self) -> Vec<&str> {
        self.session.member_names()
    }

    pub fn next_entry(&mut self) -> Option<Result<(String, Box<dyn Read + '_>)>> {
        let name = self.session.members().get(self.next)?.name.clone();
        self.next += 1;
        Some(self.session.read_member(&name).map(|reader| (name, reader)))
    }

    pub fn into_session(self) -> Box<dyn Session> {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::format::Codec;

    fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn drain(bundle: &mut Bundle) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(entry) = bundle.next_entry() {
            let (name, mut reader) = entry.unwrap();
            let mut data = Vec::new();
            reader.read_to_end(&mut data).unwrap();
            out.push((name, data));
        }
        out
    }

    #[test]
    fn archive_members_in_order() {
        let data = tarball(&[("a.txt", b"hi"), ("b/c.txt", b"bye")]);
        let mut bundle = files_in_bundle(Source::from_bytes("t.tar", data)).unwrap();
        assert_eq!(bundle.names(), ["a.txt", "b/c.txt"]);
        assert_eq!(
            drain(&mut bundle),
            [
                ("a.txt".to_string(), b"hi".to_vec()),
                ("b/c.txt".to_string(), b"bye".to_vec())
            ]
        );
        assert!(bundle.next_entry().is_none());
    }

    #[test]
    fn compressed_tarball_opens_as_archive() {
        let data = gzip(&tarball(&[("a.txt", b"hi")]));
        let mut bundle = files_in_bundle(Source::from_bytes("t.tar.gz", data)).unwrap();
        assert_eq!(bundle.format(), Format::Tar(Codec::Gzip));
        assert_eq!(drain(&mut bundle), [("a.txt".to_string(), b"hi".to_vec())]);
    }

    #[test]
    fn single_compressed_file() {
        let data = gzip(b"hello world");
        let mut bundle = files_in_bundle(Source::from_bytes("hello.txt.gz", data)).unwrap();
        assert_eq!(bundle.format(), Format::Gzip);
        assert_eq!(
            drain(&mut bundle),
            [("hello.txt.gz".to_string(), b"hello world".to_vec())]
        );
    }

    #[test]
    fn unrecognized_input_is_an_error() {
        let source = Source::from_bytes("junk", b"nothing to see here".to_vec());
        assert!(matches!(files_in_bundle(source), Err(Error::UnrecognizedFormat)));
    }

    #[test]
    fn corrupt_compressed_body_reports_open_failure() {
        // Valid header, then a deflate block of the reserved type
        let mut data = vec![0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 0xFF];
        data.extend_from_slice(&[0xFF; 16]);
        let source = Source::from_bytes("bad.gz", data);
        assert!(matches!(
            files_in_bundle(source),
            Err(Error::FormatOpen {
                format: Format::Gzip,
                ..
            })
        ));
    }
}
