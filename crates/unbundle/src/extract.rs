//! Writing an opened session's members to disk.
//!
//! In [`ExtractMode::Safe`] every member path is validated before the first
//! byte is written, so one escaping member aborts the whole extraction.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::detect;
use crate::entry::{ExtractReport, ExtractedEntry};
use crate::error::{Error, Result};
use crate::options::{ExtractMode, ExtractOptions};
use crate::sanitize;
use crate::session::{Member, MemberKind, Session};
use crate::source::Source;

/// Extract every member of `session` under `to_path`.
///
/// An empty `to_path` means the current working directory. Member names are
/// kept as relative paths; in insecure mode absolute names are written where
/// they point.
pub fn extract_session(
    session: &mut dyn Session,
    to_path: &Path,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let members = session.members().to_vec();

    let (plan, root): (Vec<PathBuf>, Option<PathBuf>) = match options.mode {
        ExtractMode::Safe => {
            let plan = sanitize::check_members(to_path, members.iter().map(|m| m.name.as_str()))?;
            let root = sanitize::resolve_target(to_path)?;
            for (member, destination) in members.iter().zip(&plan) {
                if let MemberKind::Symlink { target } = &member.kind {
                    sanitize::check_symlink_target(&member.name, target, destination, &root)?;
                }
            }
            (plan, Some(root))
        }
        ExtractMode::Insecure => {
            warn!(to = %to_path.display(), "extracting without member path validation");
            (members.iter().map(|m| to_path.join(&m.name)).collect(), None)
        }
    };

    let mut entries = Vec::with_capacity(members.len());
    for (member, destination) in members.iter().zip(plan) {
        if let Some(root) = &root {
            recheck(member, &destination, root)?;
        }
        if let Some(size) = write_member(session, member, &destination, options)? {
            entries.push(ExtractedEntry::new(member, destination, size));
        }
    }

    let report = ExtractReport::new(session.format(), entries);
    info!(
        format = %report.format,
        entries = report.entry_count,
        bytes = report.total_bytes,
        "extracted"
    );
    Ok(report)
}

/// Identify, open and extract `source` in one call.
pub fn extract(source: Source, to_path: &Path, options: &ExtractOptions) -> Result<ExtractReport> {
    let mut session = crate::Archive::open(source)?;
    session.extract(to_path, options)
}

/// Identify and open with the standard registry, then extract, accepting
/// compressed files as well as archives.
pub fn extract_any(source: Source, to_path: &Path, options: &ExtractOptions) -> Result<ExtractReport> {
    let mut session = detect::open(source)?;
    extract_session(session.as_mut(), to_path, options)
}

/// Validate a destination against the disk just before writing it; symlinks
/// created by earlier members are now real and get followed.
fn recheck(member: &Member, destination: &Path, root: &Path) -> Result<()> {
    match &member.kind {
        MemberKind::Symlink { target } => {
            // The link itself is replaced, so only its directory is followed
            if let Some(parent) = destination.parent() {
                sanitize::check_on_disk(&member.name, parent, root)?;
            }
            sanitize::check_symlink_target(&member.name, target, destination, root)?;
            Ok(())
        }
        _ => sanitize::check_on_disk(&member.name, destination, root),
    }
}

/// Returns the bytes written, or `None` when the member was skipped.
fn write_member(
    session: &mut dyn Session,
    member: &Member,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<Option<u64>> {
    match &member.kind {
        MemberKind::Directory => {
            ensure_directory(destination)?;
            Ok(Some(0))
        }
        MemberKind::File => {
            if let Some(parent) = destination.parent() {
                ensure_directory(parent)?;
            }
            if !options.overwrite && destination.exists() {
                warn!(member = %member.name, "destination exists, skipping");
                return Ok(None);
            }
            let mut reader = session.read_member(&member.name)?;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(destination)
                .map_err(|e| Error::ExtractionFailed {
                    path: destination.to_path_buf(),
                    source: e,
                })?;
            let written = io::copy(&mut reader, &mut file).map_err(|e| Error::ExtractionFailed {
                path: destination.to_path_buf(),
                source: e,
            })?;
            Ok(Some(written))
        }
        MemberKind::Symlink { target } => {
            if let Some(parent) = destination.parent() {
                ensure_directory(parent)?;
            }
            write_symlink(target, destination)?;
            Ok(Some(0))
        }
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path).map_err(|e| Error::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(unix)]
fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    use std::os::unix::fs::symlink;
    if link.symlink_metadata().is_ok() {
        fs::remove_file(link)?;
    }
    symlink(target, link).map_err(|e| Error::SymlinkCreationFailed {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    warn!(link = %link.display(), target = %target.display(), "symlink members are not extracted on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::format::Format;

    /// In-memory session for exercising the writer without a backend.
    struct Fixed {
        members: Vec<Member>,
        data: Vec<Vec<u8>>,
    }

    impl Fixed {
        fn new(files: &[(&str, &[u8])]) -> Self {
            Self {
                members: files
                    .iter()
                    .map(|(n, d)| Member::file(*n, d.len() as u64))
                    .collect(),
                data: files.iter().map(|(_, d)| d.to_vec()).collect(),
            }
        }
    }

    impl Session for Fixed {
        fn format(&self) -> Format {
            Format::Zip
        }

        fn members(&self) -> &[Member] {
            &self.members
        }

        fn read_member(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
            let i = self
                .members
                .iter()
                .position(|m| m.name == name)
                .ok_or_else(|| Error::MemberNotFound(name.to_string()))?;
            Ok(Box::new(&self.data[i][..]))
        }
    }

    #[test]
    fn writes_members_under_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Fixed::new(&[("a.txt", b"hi"), ("b/c.txt", b"bye")]);
        let report = extract_session(&mut session, dir.path(), &ExtractOptions::default()).unwrap();
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.total_bytes, 5);
        assert_eq!(fs::read(dir.path().join("b/c.txt")).unwrap(), b"bye");
    }

    #[test]
    fn one_bad_member_blocks_everything() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        fs::create_dir(&target).unwrap();
        let mut session = Fixed::new(&[("safe.txt", b"ok"), ("../escape.txt", b"bad")]);

        let result = extract_session(&mut session, &target, &ExtractOptions::default());
        assert!(matches!(result, Err(Error::UnsafeMember { .. })));
        assert!(!target.join("safe.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn insecure_mode_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        fs::create_dir(&target).unwrap();
        let mut session = Fixed::new(&[("../escape.txt", b"bad")]);

        let options = ExtractOptions::default().mode(ExtractMode::Insecure);
        extract_session(&mut session, &target, &options).unwrap();
        assert_eq!(fs::read(dir.path().join("escape.txt")).unwrap(), b"bad");
    }

    #[test]
    fn existing_files_kept_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"old").unwrap();
        let mut session = Fixed::new(&[("a.txt", b"new")]);

        let options = ExtractOptions::default().overwrite(false);
        let report = extract_session(&mut session, dir.path(), &options).unwrap();
        assert_eq!(report.entry_count, 0);
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"old");
    }

    #[test]
    #[cfg(unix)]
    fn chained_symlinks_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        fs::create_dir(&target).unwrap();
        let link = |name: &str, to: &str| Member {
            name: name.to_string(),
            size: 0,
            kind: MemberKind::Symlink {
                target: PathBuf::from(to),
            },
            mode: None,
        };
        let mut session = Fixed::new(&[]);
        session.members.push(link("d", "."));
        session.members.push(link("l", "d/.."));
        session.members.push(Member::file("l/escape.txt", 6));
        session.data = vec![Vec::new(), Vec::new(), b"gotcha".to_vec()];

        let result = extract_session(&mut session, &target, &ExtractOptions::default());
        assert!(matches!(result, Err(Error::UnsafeMember { member, .. }) if member == "l"));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    #[cfg(unix)]
    fn escaping_symlink_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Fixed::new(&[]);
        session.members.push(Member {
            name: "link".to_string(),
            size: 0,
            kind: MemberKind::Symlink {
                target: PathBuf::from("../../etc/passwd"),
            },
            mode: None,
        });
        let result = extract_session(&mut session, dir.path(), &ExtractOptions::default());
        assert!(matches!(result, Err(Error::UnsafeMember { .. })));
        assert!(dir.path().join("link").symlink_metadata().is_err());
    }
}
