//! Capability sandbox.
//!
//! Every filesystem-touching tool resolves its paths here. A relative path
//! is mapped by its first segment onto one of two roots (vault or code),
//! normalized lexically, then canonicalized; the result must stay under the
//! chosen root or access is denied.

use crate::config::AuraConfig;
use anyhow::Context;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level vault entries. A bare `.` also maps to the vault.
pub const VAULT_ENTRIES: &[&str] = &[
    "0-Core",
    "1-Inbox",
    "2-Journal",
    "3-Task_Queue.md",
    "4-Async_Mailbox.md",
    "5-Current_Task.md",
    "Knowledge",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    #[error("absolute paths are not allowed: '{0}'")]
    AbsolutePath(String),

    #[error("parent-directory traversal is not allowed: '{0}'")]
    Traversal(String),

    #[error("'{0}' is not inside any sandbox root")]
    UnknownRoot(String),

    #[error("'{0}' resolves outside its sandbox root")]
    Escape(String),

    #[error("'{0}' is not in a writable area")]
    WriteDenied(String),

    #[error("invalid path '{0}'")]
    Invalid(String),

    #[error("cannot resolve '{path}': {reason}")]
    Unresolvable { path: String, reason: String },
}

/// The base directory a path resolves into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    Vault,
    Code,
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vault => write!(f, "vault"),
            Self::Code => write!(f, "code"),
        }
    }
}

/// Fixed mapping from a path's first segment to its root.
#[derive(Debug, Clone)]
pub struct RootMap {
    entries: HashMap<String, RootKind>,
    default: RootKind,
}

impl RootMap {
    pub fn new(default: RootKind) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    pub fn with(mut self, segment: impl Into<String>, kind: RootKind) -> Self {
        self.entries.insert(segment.into(), kind);
        self
    }

    /// Vault entries plus the given code entries, defaulting to the vault.
    pub fn standard(code_entries: &[String]) -> Self {
        let mut map = Self::new(RootKind::Vault);
        for entry in VAULT_ENTRIES {
            map = map.with(*entry, RootKind::Vault);
        }
        for entry in code_entries {
            map = map.with(entry.clone(), RootKind::Code);
        }
        map
    }

    pub fn lookup(&self, segment: &str) -> Option<RootKind> {
        self.entries.get(segment).copied()
    }

    /// Segments mapped to `kind`, sorted for stable iteration.
    pub fn entries_for(&self, kind: RootKind) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(s, _)| s.as_str())
            .collect();
        out.sort_unstable();
        out
    }
}

/// The resolved sandbox: canonical roots, root map, write allow-list.
#[derive(Debug, Clone)]
pub struct Sandbox {
    vault_root: PathBuf,
    code_root: PathBuf,
    map: RootMap,
    writable: Vec<Vec<String>>,
}

impl Sandbox {
    /// Build a sandbox over existing root directories.
    pub fn new(
        vault_root: &Path,
        code_root: &Path,
        map: RootMap,
        writable: &[String],
    ) -> anyhow::Result<Self> {
        let vault_root = vault_root
            .canonicalize()
            .with_context(|| format!("Vault root unavailable: {}", vault_root.display()))?;
        let code_root = code_root
            .canonicalize()
            .with_context(|| format!("Code root unavailable: {}", code_root.display()))?;

        let writable = writable
            .iter()
            .filter_map(|w| lexical_segments(w).ok())
            .filter(|segs| !segs.is_empty())
            .map(|segs| segs.into_iter().map(str::to_string).collect())
            .collect();

        Ok(Self {
            vault_root,
            code_root,
            map,
            writable,
        })
    }

    pub fn from_config(config: &AuraConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.resolved_vault_path(),
            &config.resolved_code_path(),
            RootMap::standard(&config.sandbox.code_entries),
            &config.sandbox.writable,
        )
    }

    pub fn root(&self, kind: RootKind) -> &Path {
        match kind {
            RootKind::Vault => &self.vault_root,
            RootKind::Code => &self.code_root,
        }
    }

    pub fn root_map(&self) -> &RootMap {
        &self.map
    }

    /// Resolve a relative path to an absolute path inside its root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxError> {
        self.resolve_inner(relative).map(|(path, _)| path)
    }

    /// Like [`Sandbox::resolve`], and the path must also sit under a
    /// writable prefix.
    pub fn resolve_for_write(&self, relative: &str) -> Result<PathBuf, SandboxError> {
        let (path, segments) = self.resolve_inner(relative)?;
        let allowed = self.writable.iter().any(|prefix| {
            prefix.len() <= segments.len()
                && prefix.iter().zip(segments.iter()).all(|(p, s)| p == s)
        });
        if !allowed {
            return Err(SandboxError::WriteDenied(relative.to_string()));
        }
        Ok(path)
    }

    /// Render an absolute path back into its sandbox-relative form.
    pub fn relative_display(&self, absolute: &Path) -> Option<String> {
        // The deeper root wins when one root is nested in the other.
        let mut roots = [&self.code_root, &self.vault_root];
        roots.sort_by_key(|r| std::cmp::Reverse(r.components().count()));
        roots
            .into_iter()
            .find_map(|root| absolute.strip_prefix(root).ok())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
    }

    fn resolve_inner(&self, relative: &str) -> Result<(PathBuf, Vec<String>), SandboxError> {
        if relative.contains('\0') {
            return Err(SandboxError::Invalid(relative.to_string()));
        }
        if is_absolute_like(relative) {
            return Err(SandboxError::AbsolutePath(relative.to_string()));
        }
        let segments = lexical_segments(relative)?;

        let kind = match segments.first() {
            None => self.map.default,
            Some(first) => self
                .map
                .lookup(first)
                .ok_or_else(|| SandboxError::UnknownRoot(relative.to_string()))?,
        };
        let root = self.root(kind);

        let mut joined = root.to_path_buf();
        for seg in &segments {
            joined.push(seg);
        }

        let resolved = canonicalize_within(&joined, relative)?;
        if !resolved.starts_with(root) {
            return Err(SandboxError::Escape(relative.to_string()));
        }

        let owned = segments.into_iter().map(str::to_string).collect();
        Ok((resolved, owned))
    }
}

fn is_absolute_like(path: &str) -> bool {
    let bytes = path.as_bytes();
    Path::new(path).is_absolute()
        || path.starts_with('/')
        || path.starts_with('\\')
        || (bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic())
}

/// Split on either separator, drop `.` and empty parts, fold `x/..`.
///
/// A `..` that would climb above the first segment is a traversal attempt.
fn lexical_segments(path: &str) -> Result<Vec<&str>, SandboxError> {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if out.pop().is_none() {
                    return Err(SandboxError::Traversal(path.to_string()));
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Canonicalize the longest existing ancestor and re-append the rest.
///
/// A missing component that exists as a dangling symlink is refused, since
/// writing through it would land wherever the link points.
fn canonicalize_within(path: &Path, requested: &str) -> Result<PathBuf, SandboxError> {
    let mut missing: Vec<OsString> = Vec::new();
    let mut cursor = path.to_path_buf();
    loop {
        match cursor.canonicalize() {
            Ok(mut base) => {
                for part in missing.iter().rev() {
                    base.push(part);
                }
                return Ok(base);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if std::fs::symlink_metadata(&cursor).is_ok() {
                    return Err(SandboxError::Escape(requested.to_string()));
                }
                match cursor.file_name() {
                    Some(name) => missing.push(name.to_os_string()),
                    None => {
                        return Err(SandboxError::Unresolvable {
                            path: requested.to_string(),
                            reason: e.to_string(),
                        })
                    }
                }
                if !cursor.pop() {
                    return Err(SandboxError::Unresolvable {
                        path: requested.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
            Err(e) => {
                return Err(SandboxError::Unresolvable {
                    path: requested.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
