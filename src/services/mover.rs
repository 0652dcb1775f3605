use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_COLLISION_CAP;

/// Structured result of one move attempt. Failures are data, never panics,
/// and never silently swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved(PathBuf),
    Failed(String),
}

/// TOCTOU-guarded move with collision renaming and a cross-volume fallback.
pub struct MoveExecutor {
    collision_cap: usize,
}

impl Default for MoveExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COLLISION_CAP)
    }
}

impl MoveExecutor {
    pub fn new(collision_cap: usize) -> Self {
        Self { collision_cap }
    }

    pub fn move_file(&self, src: &Path, dest_folder: &Path, file_name: &str) -> MoveOutcome {
        // Guard #1: the plan may be stale by the time we get here.
        if !src.exists() {
            return MoveOutcome::Failed(format!("source no longer exists: {}", src.display()));
        }

        if let Err(e) = fs::create_dir_all(dest_folder) {
            return MoveOutcome::Failed(format!(
                "cannot create destination folder {}: {e}",
                dest_folder.display()
            ));
        }

        let dst = match self.resolve_collision(dest_folder, file_name) {
            Ok(dst) => dst,
            Err(reason) => return MoveOutcome::Failed(reason),
        };

        // Guard #2: re-verify immediately before the syscall.
        if !src.exists() {
            return MoveOutcome::Failed(format!(
                "source disappeared before move: {}",
                src.display()
            ));
        }

        match fs::rename(src, &dst) {
            Ok(()) => MoveOutcome::Moved(dst),
            // Rename cannot cross volumes; retry as copy + delete.
            Err(rename_err) => match self.copy_then_delete(src, &dst) {
                Ok(()) => MoveOutcome::Moved(dst),
                Err(fallback_err) => MoveOutcome::Failed(format!(
                    "failed to move {}: {rename_err} (fallback: {fallback_err})",
                    src.display()
                )),
            },
        }
    }

    /// Picks the first free name: `name.ext`, `name (2).ext`, `name (3).ext`,
    /// … up to the cap.
    fn resolve_collision(&self, dest_folder: &Path, file_name: &str) -> Result<PathBuf, String> {
        let first = dest_folder.join(file_name);
        if !first.exists() {
            return Ok(first);
        }

        let (base, ext) = split_name(file_name);
        for counter in 2..=self.collision_cap {
            let candidate = match ext {
                Some(ext) => dest_folder.join(format!("{base} ({counter}).{ext}")),
                None => dest_folder.join(format!("{base} ({counter})")),
            };
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(format!(
            "too many collisions for {file_name} (gave up after {})",
            self.collision_cap
        ))
    }

    /// Cross-device fallback. A half-written destination is removed before
    /// reporting failure, and the source is only deleted once the copy is
    /// complete.
    fn copy_then_delete(&self, src: &Path, dst: &Path) -> std::io::Result<()> {
        if let Err(copy_err) = fs::copy(src, dst) {
            let _ = fs::remove_file(dst);
            return Err(copy_err);
        }
        if let Err(remove_err) = fs::remove_file(src) {
            // Source is stuck; drop the copy rather than duplicate data.
            let _ = fs::remove_file(dst);
            return Err(remove_err);
        }
        Ok(())
    }
}

fn split_name(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, Some(ext)),
        _ => (file_name, None),
    }
}
