use std::io::{self, Cursor, Read, Write};

use sevenz_rust::{Password, SevenZReader};
use tracing::debug;

use crate::detect::FormatHandler;
use crate::error::{Error, Result};
use crate::format::{Format, SEVEN_ZIP_MAGIC};
use crate::session::{Member, MemberKind, Session};
use crate::source::Source;

pub struct SevenZipHandler;

impl FormatHandler for SevenZipHandler {
    fn format(&self) -> Format {
        Format::SevenZip
    }

    fn detect(&self, source: &mut Source) -> bool {
        source
            .peek(SEVEN_ZIP_MAGIC.len())
            .is_ok_and(|prefix| prefix == SEVEN_ZIP_MAGIC)
    }

    fn open(&self, source: Source) -> Result<Box<dyn Session>> {
        Ok(Box::new(SevenZipSession::new(source)?))
    }
}

/// 7z reads go through the folder decoders, so each read re-opens the
/// reader over the owned source instead of keeping one alive.
pub struct SevenZipSession {
    source: Source,
    members: Vec<Member>,
}

fn reader(source: &mut Source) -> Result<SevenZReader<&mut Source>> {
    let len = source.len()?;
    SevenZReader::new(source, len, Password::empty())
        .map_err(|e| Error::open(Format::SevenZip, e.to_string()))
}

impl SevenZipSession {
    pub fn new(mut source: Source) -> Result<Self> {
        let members = reader(&mut source)?
            .archive()
            .files
            .iter()
            .map(|entry| {
                if entry.is_directory {
                    Member::directory(entry.name.clone())
                } else {
                    Member::file(entry.name.clone(), entry.size)
                }
            })
            .collect();
        source.rewind()?;
        Ok(Self { source, members })
    }
}

impl Session for SevenZipSession {
    fn format(&self) -> Format {
        Format::SevenZip
    }

    fn members(&self) -> &[Member] {
        &self.members
    }

    fn read_member(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        let member = self
            .members
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::MemberNotFound(name.to_string()))?;
        if member.kind != MemberKind::File || member.size == 0 {
            return Ok(Box::new(io::empty()));
        }

        let mut content = None;
        let mut failure = None;
        reader(&mut self.source)?
            .for_each_entries(|entry, data| {
                if entry.name != name {
                    // Drain so solid blocks stay aligned for the next entry
                    if let Err(e) = io::copy(data, &mut io::sink()) {
                        failure = Some(e);
                        return Ok(false);
                    }
                    return Ok(true);
                }
                let mut buf = Vec::new();
                match data.read_to_end(&mut buf) {
                    Ok(_) => content = Some(buf),
                    Err(e) => failure = Some(e),
                }
                Ok(false)
            })
            .map_err(|e| Error::open(Format::SevenZip, e.to_string()))?;
        self.source.rewind()?;

        if let Some(e) = failure {
            return Err(Error::Io(e));
        }
        debug!(member = name, "7z member decoded");
        match content {
            Some(buf) => Ok(Box::new(Cursor::new(buf))),
            None => Err(Error::MemberNotFound(name.to_string())),
        }
    }

    fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{:>12}  Name", "Size")?;
        writeln!(out, "{:->12}  {:-<24}", "", "")?;
        for member in &self.members {
            let suffix = if member.kind == MemberKind::Directory { "/" } else { "" };
            writeln!(out, "{:>12}  {}{}", member.size, member.name, suffix)?;
        }
        Ok(())
    }
}
