use std::io::{self, Read, Write};
use std::path::Path;

use crate::detect::Registry;
use crate::entry::ExtractReport;
use crate::error::{Error, Result};
use crate::extract::extract_session;
use crate::format::Format;
use crate::options::ExtractOptions;
use crate::sanitize;
use crate::session::{Member, Session};
use crate::source::Source;

/// A multi-member archive: tar (optionally compressed), zip or 7z.
pub struct Archive {
    session: Box<dyn Session>,
}

impl Archive {
    /// Identify `source` among the archive handlers and open it.
    pub fn open(source: Source) -> Result<Self> {
        Self::open_with(&Registry::standard(), source)
    }

    pub fn open_with(registry: &Registry, mut source: Source) -> Result<Self> {
        let handler = registry.identify_archive(&mut source)?;
        Ok(Self {
            session: handler.open(source)?,
        })
    }

    pub fn format(&self) -> Format {
        self.session.format()
    }

    pub fn members(&self) -> &[Member] {
        self.session.members()
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.session.member_names()
    }

    pub fn read_member(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        self.session.read_member(name)
    }

    pub fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        self.session.list(out)
    }

    /// Fail with [`Error::UnsafeMember`] if any member would land outside
    /// `to_path`. Nothing is written.
    pub fn check_members(&self, to_path: &Path) -> Result<()> {
        sanitize::check_members(to_path, self.session.member_names()).map(|_| ())
    }

    pub fn extract(&mut self, to_path: &Path, options: &ExtractOptions) -> Result<ExtractReport> {
        extract_session(self.session.as_mut(), to_path, options)
    }

    pub fn into_session(self) -> Box<dyn Session> {
        self.session
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("format", &self.format())
            .field("members", &self.members().len())
            .finish()
    }
}

/// A single compressed file, exposed as one member named after the source.
pub struct CompressedFile {
    session: Box<dyn Session>,
    member: Member,
}

impl CompressedFile {
    /// Identify `source` among the compression handlers and open it.
    ///
    /// Archives are not considered, so a `.tar.gz` opens as a gzip file whose
    /// content is the inner tarball.
    pub fn open(source: Source) -> Result<Self> {
        Self::open_with(&Registry::standard(), source)
    }

    /// Fails with [`Error::FormatOpen`] if the handler's session does not
    /// hold exactly one member.
    pub fn open_with(registry: &Registry, mut source: Source) -> Result<Self> {
        let handler = registry.identify_compression(&mut source)?;
        let session = handler.open(source)?;
        let member = match session.members() {
            [member] => member.clone(),
            members => {
                return Err(Error::open(
                    session.format(),
                    format!("expected one member, found {}", members.len()),
                ));
            }
        };
        Ok(Self { session, member })
    }

    pub fn format(&self) -> Format {
        self.session.format()
    }

    pub fn name(&self) -> &str {
        &self.member.name
    }

    /// Decompressed size in bytes.
    pub fn size(&self) -> u64 {
        self.member.size
    }

    /// Stream the decompressed content from the start.
    pub fn reader(&mut self) -> Result<Box<dyn Read + '_>> {
        self.session.read_member(&self.member.name)
    }

    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size() as usize);
        self.reader()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        self.session.list(out)
    }

    pub fn into_session(self) -> Box<dyn Session> {
        self.session
    }
}

impl std::fmt::Debug for CompressedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedFile")
            .field("format", &self.format())
            .field("name", &self.name())
            .finish()
    }
}
