// src/metadir.rs

//! Per-root metadata directory and run identifiers
//!
//! Everything the engine persists lives under `<root>/.btidy/`:
//!
//! ```text
//! <root>/.btidy/
//!   lock
//!   journal/<runID>.jsonl
//!   journal/<runID>.rolled-back.jsonl
//!   manifests/<runID>.json
//!   trash/<runID>/<relative original path>
//! ```
//!
//! Run ids encode the command and wall-clock second plus a random suffix:
//! `<command>-<YYYYMMDD-HHMMSS>-<6 hex>`. The layout and the id format
//! are an on-disk contract; undo must be able to consume journals written
//! by other versions.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the metadata directory under the root
pub const META_DIR_NAME: &str = ".btidy";

/// The commands that can own a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Unzip,
    Rename,
    Flatten,
    Organize,
    Duplicate,
    Undo,
    Purge,
}

impl CommandKind {
    /// Command name as it appears in run ids
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unzip => "unzip",
            Self::Rename => "rename",
            Self::Flatten => "flatten",
            Self::Organize => "organize",
            Self::Duplicate => "duplicate",
            Self::Undo => "undo",
            Self::Purge => "purge",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CommandKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unzip" => Ok(Self::Unzip),
            "rename" => Ok(Self::Rename),
            "flatten" => Ok(Self::Flatten),
            "organize" => Ok(Self::Organize),
            "duplicate" => Ok(Self::Duplicate),
            "undo" => Ok(Self::Undo),
            "purge" => Ok(Self::Purge),
            _ => Err(Error::ParseError(format!("unknown command: {}", s))),
        }
    }
}

/// Unique identifier for one mutation run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Mint a fresh run id for `command`
    ///
    /// UTC truncated to the second plus a 6-hex random suffix, so two
    /// commands starting within the same second still get distinct ids.
    pub fn mint(command: CommandKind) -> Self {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let suffix: u32 = rand::random::<u32>() & 0x00ff_ffff;
        Self(format!("{}-{}-{:06x}", command, stamp, suffix))
    }

    /// Parse and validate an id in `<command>-<YYYYMMDD-HHMMSS>-<6 hex>`
    /// form.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::ParseError(format!("invalid run id: {}", s));

        let (command, rest) = s.split_once('-').ok_or_else(invalid)?;
        command.parse::<CommandKind>().map_err(|_| invalid())?;

        let mut parts = rest.splitn(3, '-');
        let date = parts.next().ok_or_else(invalid)?;
        let time = parts.next().ok_or_else(invalid)?;
        let suffix = parts.next().ok_or_else(invalid)?;

        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if time.len() != 6 || !time.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if suffix.len() != 6
            || !suffix
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(invalid());
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The command that owned this run
    pub fn command(&self) -> Option<CommandKind> {
        self.0.split('-').next()?.parse().ok()
    }

    /// Wall-clock second encoded in the id
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let rest = self.0.split_once('-')?.1;
        let stamp = rest.rsplit_once('-')?.0;
        NaiveDateTime::parse_from_str(stamp, "%Y%m%d-%H%M%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns the `.btidy/` layout for one root
#[derive(Debug, Clone)]
pub struct MetaDir {
    base: PathBuf,
}

impl MetaDir {
    /// Initialize `<root>/.btidy/` and its subdirectories
    pub fn init(root: &Path) -> Result<Self> {
        let base = root.join(META_DIR_NAME);
        for sub in ["trash", "journal", "manifests"] {
            let dir = base.join(sub);
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base.join("lock")
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.base.join("journal")
    }

    /// Path of the active journal for `run`
    pub fn journal_path(&self, run: &RunId) -> PathBuf {
        self.journal_dir().join(format!("{}.jsonl", run))
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.base.join("manifests")
    }

    /// Path of the pre-operation snapshot for `run`
    pub fn manifest_path(&self, run: &RunId) -> PathBuf {
        self.manifest_dir().join(format!("{}.json", run))
    }

    pub fn trash_root(&self) -> PathBuf {
        self.base.join("trash")
    }

    /// Per-run trash directory
    pub fn trash_dir(&self, run: &RunId) -> PathBuf {
        self.trash_root().join(run.as_str())
    }
}
