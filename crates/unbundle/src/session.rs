use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::error::Result;
use crate::format::Format;

/// A named entry inside an opened archive or compressed file.
///
/// `name` comes straight from untrusted archive content and may contain `..`
/// segments or be absolute; run it through [`crate::check_members`] before
/// using it as a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub size: u64,
    pub kind: MemberKind,
    pub mode: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemberKind {
    File,
    Directory,
    Symlink { target: PathBuf },
}

impl Member {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            kind: MemberKind::File,
            mode: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            kind: MemberKind::Directory,
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: Option<u32>) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == MemberKind::File
    }
}

/// An opened, backend-specific view of one source.
///
/// A session owns exactly one underlying stream and releases it when dropped.
pub trait Session {
    fn format(&self) -> Format;

    /// Members in the order the container stores them.
    fn members(&self) -> &[Member];

    fn member_names(&self) -> Vec<&str> {
        self.members().iter().map(|m| m.name.as_str()).collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.members().iter().any(|m| m.name == name)
    }

    /// Stream the decoded content of `name`, positioned at its first byte.
    fn read_member(&mut self, name: &str) -> Result<Box<dyn Read + '_>>;

    /// Human-readable listing; not meant for parsing.
    fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        for member in self.members() {
            writeln!(out, "{}", member.name)?;
        }
        Ok(())
    }
}

/// Render a unix mode the way `ls -l` does, e.g. `-rw-r--r--`.
pub(crate) fn mode_string(kind: &MemberKind, mode: Option<u32>) -> String {
    let mut out = String::with_capacity(10);
    out.push(match kind {
        MemberKind::File => '-',
        MemberKind::Directory => 'd',
        MemberKind::Symlink { .. } => 'l',
    });
    let mode = mode.unwrap_or(0);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_strings() {
        assert_eq!(mode_string(&MemberKind::File, Some(0o644)), "-rw-r--r--");
        assert_eq!(mode_string(&MemberKind::Directory, Some(0o755)), "drwxr-xr-x");
        assert_eq!(
            mode_string(
                &MemberKind::Symlink {
                    target: PathBuf::from("a")
                },
                None
            ),
            "l---------"
        );
    }

    #[test]
    fn member_constructors() {
        let file = Member::file("a.txt", 2).with_mode(Some(0o600));
        assert!(file.is_file());
        assert_eq!(file.mode, Some(0o600));
        assert!(!Member::directory("b/").is_file());
    }
}
