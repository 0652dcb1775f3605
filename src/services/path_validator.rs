use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

#[cfg(target_os = "windows")]
const PROTECTED_ROOTS: &[&str] = &[
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
    "C:\\ProgramData",
];

#[cfg(target_os = "macos")]
const PROTECTED_ROOTS: &[&str] = &[
    "/System",
    "/Library",
    "/Applications",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const PROTECTED_ROOTS: &[&str] = &[
    "/bin", "/boot", "/dev", "/etc", "/lib", "/proc", "/root", "/sbin", "/sys", "/usr", "/var",
];

/// Judges whether a directory may serve as an organize source or target.
/// Resolves symlinks first so a link into a system root is caught, then
/// verifies the directory is actually writable.
pub fn is_safe(path: &Path) -> Result<PathBuf, String> {
    let real = path
        .canonicalize()
        .map_err(|e| format!("invalid path {}: {e}", path.display()))?;

    if !real.is_dir() {
        return Err(format!("not a directory: {}", real.display()));
    }

    for root in PROTECTED_ROOTS {
        if starts_with_root(&real, Path::new(root)) {
            return Err(format!("cannot organize system directory: {root}"));
        }
    }

    probe_writable(&real)?;
    Ok(real)
}

fn starts_with_root(path: &Path, root: &Path) -> bool {
    if cfg!(windows) {
        let p = path.to_string_lossy().to_ascii_lowercase().replace('\\', "/");
        let r = root.to_string_lossy().to_ascii_lowercase().replace('\\', "/");
        p == r || p.starts_with(&format!("{r}/"))
    } else {
        path.starts_with(root)
    }
}

/// `fs::metadata` permission bits are unreliable for directories across
/// platforms, so write access is checked by creating and removing a probe
/// file.
fn probe_writable(dir: &Path) -> Result<(), String> {
    let probe = dir.join(format!(".curator-probe-{}", uuid::Uuid::new_v4()));
    match fs::File::create(&probe) {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            Ok(())
        }
        Err(e) => Err(format!("directory is not writable: {} ({e})", dir.display())),
    }
}

/// Pre-flight validation for one organize run. Any issue aborts before a
/// single file is touched.
pub fn validate_operation(
    sources: &[PathBuf],
    target: &Path,
    in_place: bool,
) -> Result<(Vec<PathBuf>, PathBuf), EngineError> {
    let mut issues = Vec::new();
    let mut canonical_sources = Vec::new();

    if sources.is_empty() {
        issues.push("no source directories selected".to_string());
    }
    for source in sources {
        match is_safe(source) {
            Ok(real) => canonical_sources.push(real),
            Err(reason) => issues.push(format!("source {}: {reason}", source.display())),
        }
    }

    let canonical_target = match is_safe(target) {
        Ok(real) => real,
        Err(reason) => {
            issues.push(format!("target {}: {reason}", target.display()));
            PathBuf::new()
        }
    };

    if issues.is_empty() && !in_place {
        for source in &canonical_sources {
            if *source == canonical_target {
                issues.push(format!(
                    "source and target are the same directory: {}",
                    source.display()
                ));
            } else if canonical_target.starts_with(source) {
                issues.push(format!(
                    "target cannot be inside source: {}",
                    source.display()
                ));
            }
        }
    }

    if issues.is_empty() {
        Ok((canonical_sources, canonical_target))
    } else {
        Err(EngineError::Validation(issues.join("; ")))
    }
}
