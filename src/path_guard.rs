// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Allow-list enforcement for directory listings
//!
//! Requested paths are resolved against a fixed base directory and
//! canonicalized before they are compared with the allow-list, so `..`
//! segments and symlinks cannot escape a root. The comparison is
//! component-wise (`Path::starts_with`), never a raw string prefix:
//! `shared_evil` is not inside `shared`.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{MonitorError, Result};

/// Canonical absolute directory roots, fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct AllowList {
    roots: Vec<PathBuf>,
}

impl AllowList {
    /// Create every directory (if absent) and canonicalize it.
    ///
    /// Relative entries are taken relative to `base`.
    pub fn prepare(base: &Path, dirs: &[PathBuf]) -> Result<Self> {
        let mut roots = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let path = base.join(dir);
            fs::create_dir_all(&path)?;
            let canonical = path.canonicalize()?;
            if !roots.contains(&canonical) {
                roots.push(canonical);
            }
        }
        Ok(Self { roots })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Equal to, or a descendant of, at least one root
    pub fn permits(&self, canonical: &Path) -> bool {
        self.roots.iter().any(|root| canonical.starts_with(root))
    }
}

/// Resolves `listdir` arguments into paths inside the allow-list
#[derive(Debug, Clone)]
pub struct PathGuard {
    base: PathBuf,
    allow_list: AllowList,
}

impl PathGuard {
    /// Canonicalize `base_dir` and prepare the allow-list under it
    pub fn new(base_dir: &Path, allowed_dirs: &[PathBuf]) -> Result<Self> {
        let base = base_dir.canonicalize().map_err(|e| {
            MonitorError::Configuration(format!(
                "base directory {} is unusable: {}",
                base_dir.display(),
                e
            ))
        })?;
        let allow_list = AllowList::prepare(&base, allowed_dirs)?;
        Ok(Self { base, allow_list })
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Resolve a requested path.
    ///
    /// An empty argument resolves to the base directory. The deepest existing
    /// ancestor is canonicalized (symlinks included) and any missing trailing
    /// components are applied on top of it, so a missing target inside a root
    /// still reports a listing error rather than a denial. An entry that exists
    /// but cannot be resolved, such as a dangling symlink, is denied.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let joined = self.base.join(requested.trim());
        match canonicalize_existing_prefix(&joined) {
            Some(resolved) if self.allow_list.permits(&resolved) => Ok(resolved),
            Some(resolved) => {
                log::warn!(
                    "listdir denied for {:?} (resolved to {})",
                    requested,
                    resolved.display()
                );
                Err(MonitorError::AccessDenied(requested.to_string()))
            }
            None => {
                log::warn!("listdir denied for {:?} (unresolvable entry)", requested);
                Err(MonitorError::AccessDenied(requested.to_string()))
            }
        }
    }
}

/// One-level, non-recursive entry names in the order the OS returns them
pub fn list_entries(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Canonicalize the longest prefix of `path` that exists, then apply the
/// remaining components lexically.
///
/// `None` when some prefix exists on disk but cannot be canonicalized.
fn canonicalize_existing_prefix(path: &Path) -> Option<PathBuf> {
    let components: Vec<Component> = path.components().collect();
    for split in (1..=components.len()).rev() {
        let prefix: PathBuf = components[..split].iter().collect();
        match prefix.canonicalize() {
            Ok(mut resolved) => {
                for component in &components[split..] {
                    match component {
                        Component::CurDir => {}
                        Component::ParentDir => {
                            resolved.pop();
                        }
                        other => resolved.push(other.as_os_str()),
                    }
                }
                return Some(resolved);
            }
            Err(_) if fs::symlink_metadata(&prefix).is_ok() => return None,
            Err(_) => continue,
        }
    }
    Some(normalize_lexically(path))
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
