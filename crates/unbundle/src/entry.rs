use std::path::{Path, PathBuf};

use crate::format::Format;
use crate::session::{Member, MemberKind};

/// A member that was written to disk.
#[derive(Clone, Debug)]
pub struct ExtractedEntry {
    pub member: String,
    pub target_path: PathBuf,
    pub size: u64,
    pub kind: MemberKind,
}

impl ExtractedEntry {
    pub fn new(member: &Member, target_path: PathBuf, size: u64) -> Self {
        Self {
            member: member.name.clone(),
            target_path,
            size,
            kind: member.kind.clone(),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, MemberKind::Directory)
    }

    pub fn symlink_target(&self) -> Option<&Path> {
        match &self.kind {
            MemberKind::Symlink { target } => Some(target),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExtractReport {
    pub format: Format,
    pub entry_count: usize,
    pub total_bytes: u64,
    pub entries: Vec<ExtractedEntry>,
}

impl ExtractReport {
    pub fn new(format: Format, entries: Vec<ExtractedEntry>) -> Self {
        Self {
            format,
            entry_count: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
            entries,
        }
    }
}
