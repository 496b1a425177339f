use std::io::{self, Read, Seek, SeekFrom, Write};

use ::zip::ZipArchive;
use ::zip::result::ZipError;
use tracing::debug;

use crate::detect::FormatHandler;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::session::{Member, MemberKind, Session};
use crate::source::Source;

const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";
const EOCD_LEN: usize = 22;
const MAX_COMMENT: usize = u16::MAX as usize;

pub struct ZipHandler;

impl FormatHandler for ZipHandler {
    fn format(&self) -> Format {
        Format::Zip
    }

    fn detect(&self, source: &mut Source) -> bool {
        match tail(source) {
            Ok(tail) => has_end_of_central_directory(&tail),
            Err(e) => {
                debug!(source = source.name(), error = %e, "zip probe failed");
                false
            }
        }
    }

    fn open(&self, source: Source) -> Result<Box<dyn Session>> {
        Ok(Box::new(ZipSession::new(source)?))
    }
}

/// The region that can hold the end-of-central-directory record.
fn tail(source: &mut Source) -> io::Result<Vec<u8>> {
    let len = source.len()?;
    let window = len.min((EOCD_LEN + MAX_COMMENT) as u64);
    source.seek(SeekFrom::Start(len - window))?;
    let mut buf = Vec::with_capacity(window as usize);
    source.read_to_end(&mut buf)?;
    source.rewind()?;
    Ok(buf)
}

/// Find an EOCD record whose comment runs exactly to end of stream.
fn has_end_of_central_directory(tail: &[u8]) -> bool {
    if tail.len() < EOCD_LEN {
        return false;
    }
    (0..=tail.len() - EOCD_LEN).rev().any(|at| {
        let record = &tail[at..];
        record.starts_with(EOCD_SIGNATURE)
            && usize::from(u16::from_le_bytes([record[20], record[21]])) == record.len() - EOCD_LEN
    })
}

pub struct ZipSession {
    archive: ZipArchive<Source>,
    members: Vec<Member>,
}

impl ZipSession {
    pub fn new(source: Source) -> Result<Self> {
        let mut archive = ZipArchive::new(source).map_err(|e| Error::open(Format::Zip, e))?;
        let mut members = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| Error::open(Format::Zip, e))?;
            let kind = if file.is_dir() {
                MemberKind::Directory
            } else {
                MemberKind::File
            };
            members.push(Member {
                name: file.name().to_string(),
                size: file.size(),
                kind,
                mode: file.unix_mode().map(|m| m & 0o7777),
            });
        }
        Ok(Self { archive, members })
    }
}

impl Session for ZipSession {
    fn format(&self) -> Format {
        Format::Zip
    }

    fn members(&self) -> &[Member] {
        &self.members
    }

    fn read_member(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        if !self.contains(name) {
            return Err(Error::MemberNotFound(name.to_string()));
        }
        match self.archive.by_name(name) {
            Ok(file) => Ok(Box::new(file)),
            Err(ZipError::FileNotFound) => Err(Error::MemberNotFound(name.to_string())),
            Err(e) => Err(Error::Io(e.into())),
        }
    }

    fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{:<46} {:>12}", "File Name", "Size")?;
        for member in &self.members {
            writeln!(out, "{:<46} {:>12}", member.name, member.size)?;
        }
        Ok(())
    }
}
