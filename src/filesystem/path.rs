// src/filesystem/path.rs

//! Path containment validation
//!
//! Every mutation the engine performs goes through [`SafePath`], which is
//! constructed once per workflow from the target directory and enforces
//! that both endpoints of every operation stay inside the root's real
//! (symlink-resolved) form.
//!
//! Untrusted relative paths (archive entry names, journal entries read
//! back from disk) additionally pass through [`sanitize_rel`], which
//! rejects traversal components before any filesystem access happens.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Sanitize a relative path from an untrusted source
///
/// Rejects `..` components, skips `.`, strips leading separators and
/// Windows prefixes, and refuses paths that normalize to nothing.
/// This is the first line of defense for archive entry names.
pub fn sanitize_rel(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::PathEscape(path.display().to_string()));
            }
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath("empty path after sanitization".to_string()));
    }

    Ok(normalized)
}

/// Root-containment validator
///
/// Holds the target directory in two forms: the absolute path as given
/// (cwd-joined when relative) and its real, fully symlink-resolved form.
/// Containment is always decided against the real form.
#[derive(Debug, Clone)]
pub struct SafePath {
    abs: PathBuf,
    real: PathBuf,
}

impl SafePath {
    /// Construct a validator for `target`, which must be an existing
    /// directory.
    pub fn new(target: &Path) -> Result<Self> {
        let abs = if target.is_absolute() {
            target.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(Error::from)?
                .join(target)
        };

        let meta = fs::metadata(&abs).map_err(|e| Error::io(&abs, e))?;
        if !meta.is_dir() {
            return Err(Error::InvalidPath(format!(
                "{} is not a directory",
                abs.display()
            )));
        }

        let real = abs.canonicalize().map_err(|e| Error::io(&abs, e))?;
        Ok(Self { abs, real })
    }

    /// The root as given (absolute)
    pub fn root(&self) -> &Path {
        &self.abs
    }

    /// The root's real (symlink-resolved) form
    pub fn real_root(&self) -> &Path {
        &self.real
    }

    /// Relative form of `p` with respect to the root
    pub fn rel_of(&self, p: &Path) -> Result<PathBuf> {
        if let Ok(rel) = p.strip_prefix(&self.abs) {
            return Ok(rel.to_path_buf());
        }
        if let Ok(rel) = p.strip_prefix(&self.real) {
            return Ok(rel.to_path_buf());
        }
        Err(Error::InvalidPath(format!(
            "{} is not under root {}",
            p.display(),
            self.abs.display()
        )))
    }

    /// Absolutize `p` against the root when it is relative
    fn absolutize(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.abs.join(p)
        }
    }

    /// Validate a path for reading
    ///
    /// The path must exist and its real form must be a descendant of the
    /// root's real form. Returns the real form. Escapes through a symlink
    /// component report `SymlinkEscape`; lexical escapes report
    /// `PathEscape`.
    pub fn validate_read(&self, p: &Path) -> Result<PathBuf> {
        let abs = self.absolutize(p);
        fs::symlink_metadata(&abs).map_err(|e| Error::io(&abs, e))?;

        let real = abs.canonicalize().map_err(|e| Error::io(&abs, e))?;
        if real.starts_with(&self.real) {
            return Ok(real);
        }

        if self.has_symlink_component(&abs) {
            Err(Error::SymlinkEscape(abs.display().to_string()))
        } else {
            Err(Error::PathEscape(abs.display().to_string()))
        }
    }

    /// Validate a path for writing
    ///
    /// The path need not exist: the deepest existing ancestor must pass
    /// read validation and the remaining suffix must be free of traversal
    /// components.
    pub fn validate_write(&self, p: &Path) -> Result<()> {
        let abs = self.absolutize(p);

        for component in abs.components() {
            if component == Component::ParentDir {
                return Err(Error::PathEscape(abs.display().to_string()));
            }
        }

        let mut ancestor = abs.as_path();
        loop {
            if fs::symlink_metadata(ancestor).is_ok() {
                break;
            }
            ancestor = ancestor.parent().ok_or_else(|| {
                Error::InvalidPath(format!("{} has no existing ancestor", abs.display()))
            })?;
        }

        self.validate_read(ancestor)?;
        Ok(())
    }

    /// Join `rel` onto `base` and verify the result stays inside the root
    ///
    /// Rejects absolute `rel`, traversal components, empty results, and
    /// results that resolve to the root itself (destructive operations
    /// must never target the root).
    pub fn resolve_safe(&self, base: &Path, rel: &Path) -> Result<PathBuf> {
        if rel.is_absolute() {
            return Err(Error::PathEscape(rel.display().to_string()));
        }

        let sanitized = sanitize_rel(rel)?;
        let joined = self.absolutize(base).join(sanitized);
        self.validate_write(&joined)?;

        if joined == self.abs || joined == self.real {
            return Err(Error::InvalidPath(
                "path resolves to the root itself".to_string(),
            ));
        }

        Ok(joined)
    }

    /// Validated atomic rename
    ///
    /// Both endpoints must pass write validation; the destination must
    /// not already exist; parent directories of the destination are
    /// created. Same-device renames are atomic, cross-device moves fall
    /// back to copy+fsync+delete.
    pub fn safe_rename(&self, src: &Path, dst: &Path) -> Result<()> {
        let src = self.absolutize(src);
        let dst = self.absolutize(dst);

        self.validate_read(&src)?;
        self.validate_write(&dst)?;

        if fs::symlink_metadata(&dst).is_ok() {
            return Err(Error::AlreadyExists(dst.display().to_string()));
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        super::move_file_atomic(&src, &dst).map_err(|e| {
            Error::IoError(format!(
                "rename {} -> {}: {}",
                src.display(),
                dst.display(),
                e
            ))
        })
    }

    /// Validated file removal; the root can never be removed
    pub fn safe_remove(&self, p: &Path) -> Result<()> {
        let abs = self.absolutize(p);
        let real = self.validate_read(&abs)?;
        if real == self.real {
            return Err(Error::InvalidPath(
                "refusing to remove the root".to_string(),
            ));
        }
        fs::remove_file(&abs).map_err(|e| Error::io(&abs, e))
    }

    /// Validated removal of an empty directory
    pub fn safe_remove_dir(&self, p: &Path) -> Result<()> {
        let abs = self.absolutize(p);
        let real = self.validate_read(&abs)?;
        if real == self.real {
            return Err(Error::InvalidPath(
                "refusing to remove the root".to_string(),
            ));
        }
        fs::remove_dir(&abs).map_err(|e| Error::io(&abs, e))
    }

    /// Validated recursive directory removal
    pub fn safe_remove_dir_all(&self, p: &Path) -> Result<()> {
        let abs = self.absolutize(p);
        let real = self.validate_read(&abs)?;
        if real == self.real {
            return Err(Error::InvalidPath(
                "refusing to remove the root".to_string(),
            ));
        }
        fs::remove_dir_all(&abs).map_err(|e| Error::io(&abs, e))
    }

    /// Validated recursive directory creation
    pub fn safe_mkdir_all(&self, p: &Path) -> Result<()> {
        let abs = self.absolutize(p);
        self.validate_write(&abs)?;
        fs::create_dir_all(&abs).map_err(|e| Error::io(&abs, e))
    }

    /// True when some existing component of `p` below the root is itself
    /// a symlink.
    fn has_symlink_component(&self, p: &Path) -> bool {
        let Ok(suffix) = p.strip_prefix(&self.abs) else {
            return false;
        };
        let mut current = self.abs.clone();
        for component in suffix.components() {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => return true,
                Ok(_) => {}
                Err(_) => break,
            }
        }
        false
    }
}
