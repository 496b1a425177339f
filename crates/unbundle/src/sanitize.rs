//! Zip-slip prevention: every member must land inside the target directory.

use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Resolve a path the way `realpath` would, tolerating a missing tail.
///
/// Components are applied in order; whenever the path built so far exists it
/// is canonicalized, so symlinks are followed before a later `..` pops them.
pub fn resolve(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => resolved.push(prefix.as_os_str()),
            Component::RootDir => resolved.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                if fs::symlink_metadata(&resolved).is_ok() {
                    if let Ok(real) = fs::canonicalize(&resolved) {
                        resolved = real;
                    }
                }
            }
        }
    }
    Ok(resolved)
}

/// The canonical extraction root; an empty path means the working directory.
pub fn resolve_target(to_path: &Path) -> io::Result<PathBuf> {
    if to_path.as_os_str().is_empty() {
        env::current_dir()?.canonicalize()
    } else {
        resolve(to_path)
    }
}

/// Component-wise containment; `/foo2` is not inside `/foo`.
pub fn is_descendant(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

/// Where `member` would be written under the already-resolved `target`.
pub fn member_destination(target: &Path, member: &str) -> Result<PathBuf> {
    if member.contains('\0') {
        return Err(Error::UnsafeMember {
            member: member.to_string(),
            resolved: target.to_path_buf(),
        });
    }
    let resolved = resolve(&target.join(member))?;
    if !is_descendant(&resolved, target) {
        return Err(Error::UnsafeMember {
            member: member.to_string(),
            resolved,
        });
    }
    Ok(resolved)
}

/// Validate every member name against `to_path` before anything is written.
///
/// One escaping member rejects the whole set. On success the destinations
/// are returned in member order.
pub fn check_members<'a>(
    to_path: &Path,
    members: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<PathBuf>> {
    let target = resolve_target(to_path)?;
    let destinations = members
        .into_iter()
        .map(|member| member_destination(&target, member))
        .collect::<Result<Vec<_>>>()?;
    debug!(target = %target.display(), checked = destinations.len(), "member paths validated");
    Ok(destinations)
}

/// Re-resolve `path` against the filesystem as it is now.
///
/// Links written earlier in the same extraction are followed, so a chain of
/// individually harmless symlinks cannot carry a later write outside `target`.
pub fn check_on_disk(member: &str, path: &Path, target: &Path) -> Result<()> {
    let resolved = resolve(path)?;
    if !is_descendant(&resolved, target) {
        return Err(Error::UnsafeMember {
            member: member.to_string(),
            resolved,
        });
    }
    Ok(())
}

/// Validate a symlink's target relative to the link's own location.
pub fn check_symlink_target(
    member: &str,
    link_target: &Path,
    link_location: &Path,
    target: &Path,
) -> Result<PathBuf> {
    let joined = match link_location.parent() {
        Some(parent) => parent.join(link_target),
        None => link_target.to_path_buf(),
    };
    let resolved = resolve(&joined)?;
    if !is_descendant(&resolved, target) {
        return Err(Error::UnsafeMember {
            member: member.to_string(),
            resolved,
        });
    }
    Ok(resolved)
}
