use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::DuplicateDetection;
use crate::data::store::{HashIndex, NameEntry};
use crate::error::EngineError;
use crate::models::plan::FileRecord;

/// Quarantine destinations; duplicate traffic never reaches a normal
/// classification target.
pub const EXACT_DUPES_FOLDER: &str = "!Dupes";
pub const NAME_COLLISION_FOLDER: &str = "!Dupes Size";

const HASH_CHUNK_SIZE: usize = 8192;

/// Two files count as contemporaneous within this window. A name collision
/// between files written at different times is a legitimate new version and
/// falls through to collision renaming instead of quarantine.
const SAME_DATE_TOLERANCE_SECS: i64 = 1;

fn same_date(a: Option<i64>, b: Option<i64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if (a - b).abs() <= SAME_DATE_TOLERANCE_SECS)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateStatus {
    Unique,
    /// Identical content already registered at this path.
    ExactDuplicate(PathBuf),
    /// Same file name and timestamp registered before with different
    /// content.
    NameCollisionDifferentContent(PathBuf),
}

impl DuplicateStatus {
    pub fn quarantine_folder(&self) -> Option<&'static str> {
        match self {
            Self::Unique => None,
            Self::ExactDuplicate(_) => Some(EXACT_DUPES_FOLDER),
            Self::NameCollisionDifferentContent(_) => Some(NAME_COLLISION_FOLDER),
        }
    }
}

/// Flags exact duplicates and name collisions against a persisted hash
/// index. Index trouble degrades to `Unique` with a warning; it never stops
/// the batch.
pub struct DuplicateDetector<'a> {
    index: &'a dyn HashIndex,
    mode: DuplicateDetection,
    /// Per-run name -> (size, modified, path) rows for size-only mode.
    seen: HashMap<String, Vec<(u64, Option<i64>, PathBuf)>>,
}

impl<'a> DuplicateDetector<'a> {
    pub fn new(index: &'a dyn HashIndex, mode: DuplicateDetection) -> Self {
        Self {
            index,
            mode,
            seen: HashMap::new(),
        }
    }

    pub fn check(&mut self, record: &FileRecord) -> DuplicateStatus {
        match self.mode {
            DuplicateDetection::ExactHash => match self.check_hashed(record) {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(
                        "duplicate index unavailable for {}: {e}; treating as unique",
                        record.path.display()
                    );
                    DuplicateStatus::Unique
                }
            },
            DuplicateDetection::SizeOnly => self.check_size_only(record),
        }
    }

    fn check_hashed(&self, record: &FileRecord) -> Result<DuplicateStatus, EngineError> {
        let hash = compute_hash(&record.path)?;

        if let Some(first_seen) = self.index.lookup_hash(&hash)? {
            if first_seen != record.path {
                return Ok(DuplicateStatus::ExactDuplicate(first_seen));
            }
            return Ok(DuplicateStatus::Unique);
        }

        let same_name = self.index.lookup_name(&record.file_name)?;
        let collision = same_name
            .into_iter()
            .find(|entry: &NameEntry| {
                entry.hash != hash && same_date(record.modified, entry.modified)
            })
            .map(|entry| entry.path);

        self.index.insert_hash(
            &hash,
            &record.path,
            &record.file_name,
            record.size,
            record.modified,
        )?;

        match collision {
            Some(path) => Ok(DuplicateStatus::NameCollisionDifferentContent(path)),
            None => Ok(DuplicateStatus::Unique),
        }
    }

    /// Cheap per-run mode: same name + same timestamp counts as an exact
    /// duplicate when sizes match, a collision when they differ. A
    /// different timestamp is a new version, not a duplicate. Nothing
    /// persists between runs.
    fn check_size_only(&mut self, record: &FileRecord) -> DuplicateStatus {
        let entries = self.seen.entry(record.file_name.clone()).or_default();
        let verdict = entries.iter().find_map(|(size, modified, path)| {
            if !same_date(record.modified, *modified) {
                return None;
            }
            if *size == record.size {
                Some(DuplicateStatus::ExactDuplicate(path.clone()))
            } else {
                Some(DuplicateStatus::NameCollisionDifferentContent(path.clone()))
            }
        });

        match verdict {
            Some(status) => status,
            None => {
                entries.push((record.size, record.modified, record.path.clone()));
                DuplicateStatus::Unique
            }
        }
    }
}

/// Streams the file through blake3 in fixed-size chunks; the file is never
/// loaded whole.
pub fn compute_hash(path: &Path) -> Result<String, EngineError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
