/// Characters SQLite, NTFS or POSIX filesystems cannot take in a path
/// component, plus anything below 0x20.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

pub const FALLBACK_FOLDER: &str = "Unsorted";

/// Normalizes a proposed folder name so it is legal on every host OS.
/// Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();

    let trimmed = cleaned.trim().trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        return FALLBACK_FOLDER.to_string();
    }

    if is_reserved(trimmed) {
        // The `_` goes on the stem so the result is no longer reserved;
        // appending after the extension would leave the stem intact.
        return match trimmed.split_once('.') {
            Some((stem, rest)) => format!("{stem}_.{rest}"),
            None => format!("{trimmed}_"),
        };
    }
    trimmed.to_string()
}

/// Windows treats "CON.anything" the same as "CON", so only the stem counts.
fn is_reserved(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name).to_uppercase();
    RESERVED_NAMES.contains(&stem.as_str())
}
