use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::backend::read_up_to;
use crate::detect::FormatHandler;
use crate::error::{Error, Result};
use crate::format::{Codec, Format};
use crate::session::{Member, MemberKind, Session, mode_string};
use crate::source::Source;

const BLOCK: usize = 512;
const CHECKSUM: std::ops::Range<usize> = 148..156;

/// Tar archives, bare or wrapped in a single compression layer.
pub struct TarHandler;

impl FormatHandler for TarHandler {
    fn format(&self) -> Format {
        Format::Tar(Codec::None)
    }

    fn detect(&self, source: &mut Source) -> bool {
        match first_block(source) {
            Ok(Some(block)) => is_tar_header(&block),
            Ok(None) => false,
            Err(e) => {
                debug!(source = source.name(), error = %e, "tar probe failed");
                false
            }
        }
    }

    fn open(&self, source: Source) -> Result<Box<dyn Session>> {
        Ok(Box::new(TarSession::new(source)?))
    }
}

/// Decode just enough of the stream to see the first header block.
fn first_block(source: &mut Source) -> io::Result<Option<[u8; BLOCK]>> {
    let codec = Codec::sniff(&source.peek(8)?);
    let mut decoder = codec.decoder(&mut *source)?;
    let mut block = [0u8; BLOCK];
    let n = read_up_to(&mut decoder, &mut block)?;
    Ok((n == BLOCK).then_some(block))
}

/// Verify the header checksum, accepting both the unsigned sum and the
/// signed sum some historic writers produced.
fn is_tar_header(block: &[u8; BLOCK]) -> bool {
    if block.iter().all(|&b| b == 0) {
        return false;
    }
    let Some(stored) = parse_octal(&block[CHECKSUM]) else {
        return false;
    };
    let mut unsigned = 0u64;
    let mut signed = 0i64;
    for (i, &b) in block.iter().enumerate() {
        let b = if CHECKSUM.contains(&i) { b' ' } else { b };
        unsigned += u64::from(b);
        signed += i64::from(b as i8);
    }
    stored == unsigned || i64::try_from(stored).is_ok_and(|s| s == signed)
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let digits: Vec<u8> = field
        .iter()
        .copied()
        .skip_while(|&b| b == b' ')
        .take_while(|&b| b != 0 && b != b' ')
        .collect();
    if digits.is_empty() {
        return None;
    }
    let text = std::str::from_utf8(&digits).ok()?;
    u64::from_str_radix(text, 8).ok()
}

/// Where a member's data lives inside the decoded tar body.
#[derive(Clone, Copy, Debug)]
struct Span {
    offset: u64,
    size: u64,
}

pub struct TarSession {
    format: Format,
    body: Source,
    members: Vec<Member>,
    spans: Vec<Span>,
}

impl TarSession {
    /// Index every entry once. Compressed tarballs are decoded into memory so
    /// later reads can seek.
    pub fn new(mut source: Source) -> Result<Self> {
        let codec = Codec::sniff(&source.peek(8)?);
        let format = Format::Tar(codec);
        let mut body = if codec == Codec::None {
            source
        } else {
            let mut decoded = Vec::new();
            codec
                .decoder(&mut source)
                .and_then(|mut d| d.read_to_end(&mut decoded))
                .map_err(|e| Error::open(format, e))?;
            Source::from_bytes(source.name(), decoded)
        };

        let (members, spans) = index(&mut body).map_err(|e| Error::open(format, e))?;
        debug!(source = body.name(), %format, members = members.len(), "tar indexed");
        Ok(Self {
            format,
            body,
            members,
            spans,
        })
    }

    /// Latest entry with this name wins, as when the archive is unpacked.
    fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().rposition(|m| m.name == name)
    }
}

fn index(body: &mut Source) -> io::Result<(Vec<Member>, Vec<Span>)> {
    let mut members = Vec::new();
    let mut spans = Vec::new();
    let mut archive = ::tar::Archive::new(body);

    for entry in archive.entries()? {
        let entry = entry?;
        let header = entry.header();
        let entry_type = header.entry_type();
        if entry_type.is_pax_global_extensions()
            || entry_type.is_pax_local_extensions()
            || entry_type.is_gnu_longname()
            || entry_type.is_gnu_longlink()
        {
            continue;
        }

        let mut name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let mode = header.mode().ok();
        let kind = if entry_type.is_dir() {
            if name.len() > 1 {
                name.truncate(name.trim_end_matches('/').len());
            }
            MemberKind::Directory
        } else if entry_type.is_symlink() {
            let target = entry
                .link_name()?
                .map(|t| t.into_owned())
                .unwrap_or_default();
            MemberKind::Symlink { target }
        } else {
            MemberKind::File
        };

        let mut span = Span {
            offset: entry.raw_file_position(),
            size: if kind == MemberKind::File { entry.size() } else { 0 },
        };
        // Hard links share the data of an earlier member, named from the archive root
        if entry_type.is_hard_link() {
            let linked = entry
                .link_name()?
                .map(|t| t.to_string_lossy().replace('\\', "/"));
            match linked.and_then(|t| members.iter().rposition(|m: &Member| m.name == t && m.is_file())) {
                Some(i) => span = spans[i],
                None => debug!(member = %name, "hard link target not in archive"),
            }
        }

        spans.push(span);
        members.push(Member {
            name,
            size: span.size.max(entry.size()),
            kind,
            mode,
        });
    }
    Ok((members, spans))
}

/// Resolve a symlink's target against the directory holding the link.
fn link_target(link: &str, target: &Path) -> String {
    let mut resolved = PathBuf::new();
    if let Some(parent) = Path::new(link).parent() {
        resolved.push(parent);
    }
    for component in target.components() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => resolved.push(part),
            _ => {}
        }
    }
    resolved.to_string_lossy().replace('\\', "/")
}

impl Session for TarSession {
    fn format(&self) -> Format {
        self.format
    }

    fn members(&self) -> &[Member] {
        &self.members
    }

    fn read_member(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        let mut index = self
            .position(name)
            .ok_or_else(|| Error::MemberNotFound(name.to_string()))?;

        // Follow at most one link, onto a regular file
        if let MemberKind::Symlink { target } = &self.members[index].kind {
            let resolved = link_target(name, target);
            index = self
                .position(&resolved)
                .filter(|&i| self.members[i].is_file())
                .ok_or_else(|| Error::MemberNotFound(name.to_string()))?;
        }

        let span = self.spans[index];
        self.body.seek(SeekFrom::Start(span.offset))?;
        Ok(Box::new((&mut self.body).take(span.size)))
    }

    fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        for member in &self.members {
            write!(
                out,
                "{} {:>10} {}",
                mode_string(&member.kind, member.mode),
                member.size,
                member.name
            )?;
            match &member.kind {
                MemberKind::Directory => writeln!(out, "/")?,
                MemberKind::Symlink { target } => writeln!(out, " -> {}", target.display())?,
                MemberKind::File => writeln!(out)?,
            }
        }
        Ok(())
    }
}
