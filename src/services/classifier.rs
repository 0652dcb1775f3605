use crate::data::store::PatternStore;
use crate::models::plan::ClassificationResult;
use crate::services::learned;
use crate::services::sanitize::sanitize;

pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.85;
pub const MEDIUM_CONFIDENCE_THRESHOLD: f32 = 0.50;

pub const EXTENSION_CONFIDENCE: f32 = 1.0;
pub const CAMERA_TAG_CONFIDENCE: f32 = 0.95;
pub const SEQUENTIAL_CONFIDENCE: f32 = 0.90;
pub const DELIMITER_CONFIDENCE: f32 = 0.80;

/// Fixed vocabulary of camera filename prefixes.
const CAMERA_TAGS: &[&str] = &["DSCN", "DCSN", "IMG", "DSC", "DCS"];

/// One pure naming heuristic. Strategies never touch the filesystem.
pub trait Strategy: Send + Sync {
    fn id(&self) -> &'static str;
    fn classify(&self, file_name: &str) -> Option<ClassificationResult>;
}

/// Asked to place a file no strategy recognized. Implemented by the caller
/// (a prompt, a queue, a test stub); the engine only consumes the answer.
pub trait Resolver: Send + Sync {
    fn resolve(&self, file_name: &str) -> Option<String>;
}

/// Ordered, short-circuiting strategy chain with a learned-mapping lookup in
/// front. Every folder name it emits has passed through `sanitize`.
pub struct Classifier {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Classifier {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// Learned lookup first, then camera tags, sequential numbering, and
    /// delimiter canonicalization, mirroring the priority the detector was
    /// tuned with.
    pub fn with_default_strategies() -> Self {
        Self::new(vec![
            Box::new(CameraTagStrategy),
            Box::new(SequentialStrategy),
            Box::new(DelimiterStrategy),
        ])
    }

    pub fn classify(
        &self,
        file_name: &str,
        patterns: &dyn PatternStore,
    ) -> Option<ClassificationResult> {
        match learned::predict(patterns, file_name) {
            Ok(Some((folder, confidence))) => {
                return Some(ClassificationResult {
                    folder: sanitize(&folder),
                    strategy: "learned",
                    confidence,
                });
            }
            Ok(None) => {}
            Err(e) => {
                // A broken pattern store downgrades to heuristics only.
                tracing::warn!("learned-pattern lookup failed: {e}");
            }
        }

        self.strategies
            .iter()
            .find_map(|strategy| strategy.classify(file_name))
    }
}

fn stem_of(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Drops a trailing " (n)" duplicate marker, as produced by collision
/// renaming, so re-organized copies classify like their originals.
fn strip_copy_marker(stem: &str) -> &str {
    let trimmed = stem.trim_end();
    if let Some(open) = trimmed.rfind('(') {
        let inner = &trimmed[open + 1..];
        if let Some(body) = inner.strip_suffix(')') {
            if !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()) {
                return trimmed[..open].trim_end_matches([' ', '-', '_']);
            }
        }
    }
    trimmed
}

/// Python-style capitalize: first letter upper, the rest lower, unless the
/// word is already all uppercase.
fn capitalize(word: &str) -> String {
    if word.chars().all(|c| !c.is_lowercase()) {
        return word.to_string();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn smart_title(text: &str) -> String {
    text.split('_')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join("_")
}

/// Routes purely on the file extension: `report.pdf` goes to `PDF`. Not in
/// the default chain; callers opt in for a by-extension layout, usually as
/// the only strategy.
pub struct ExtensionStrategy;

impl Strategy for ExtensionStrategy {
    fn id(&self) -> &'static str {
        "extension"
    }

    fn classify(&self, file_name: &str) -> Option<ClassificationResult> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ClassificationResult {
            folder: sanitize(&ext.to_uppercase()),
            strategy: self.id(),
            confidence: EXTENSION_CONFIDENCE,
        })
    }
}

pub struct CameraTagStrategy;

impl Strategy for CameraTagStrategy {
    fn id(&self) -> &'static str {
        "camera_tag"
    }

    /// Matches IMG/DSC-family tags when followed by a digit, `_`, `.` or end
    /// of name, anywhere in the filename.
    fn classify(&self, file_name: &str) -> Option<ClassificationResult> {
        let upper = file_name.to_uppercase();
        for tag in CAMERA_TAGS {
            let mut search_from = 0;
            while let Some(offset) = upper[search_from..].find(tag) {
                let start = search_from + offset;
                let end = start + tag.len();
                let boundary_ok = match upper[end..].chars().next() {
                    None => true,
                    Some(next) => next.is_ascii_digit() || next == '_' || next == '.',
                };
                if boundary_ok {
                    return Some(ClassificationResult {
                        folder: sanitize(tag),
                        strategy: self.id(),
                        confidence: CAMERA_TAG_CONFIDENCE,
                    });
                }
                search_from = end;
            }
        }
        None
    }
}

pub struct SequentialStrategy;

impl Strategy for SequentialStrategy {
    fn id(&self) -> &'static str {
        "sequential"
    }

    /// Base name plus a trailing counter of at least two digits, with or
    /// without a `-`/`_` separator: `vacation-001`, `file_123`, `page07`.
    fn classify(&self, file_name: &str) -> Option<ClassificationResult> {
        let stem = strip_copy_marker(stem_of(file_name));

        // Separator form: everything after the last `-`/`_` is the counter.
        if let Some(split) = stem.rfind(['-', '_']) {
            let (base, counter) = (&stem[..split], &stem[split + 1..]);
            if !base.is_empty()
                && counter.len() >= 2
                && counter.chars().all(|c| c.is_ascii_digit())
            {
                return Some(ClassificationResult {
                    folder: sanitize(&capitalize(base)),
                    strategy: self.id(),
                    confidence: SEQUENTIAL_CONFIDENCE,
                });
            }
        }

        // Glued form: letters immediately followed by the counter.
        let digits_at = stem.find(|c: char| c.is_ascii_digit())?;
        let (base, counter) = stem.split_at(digits_at);
        if !base.is_empty()
            && base.chars().all(|c| c.is_ascii_alphabetic())
            && counter.len() >= 2
            && counter.chars().all(|c| c.is_ascii_digit())
        {
            return Some(ClassificationResult {
                folder: sanitize(&capitalize(base)),
                strategy: self.id(),
                confidence: SEQUENTIAL_CONFIDENCE,
            });
        }
        None
    }
}

pub struct DelimiterStrategy;

impl Strategy for DelimiterStrategy {
    fn id(&self) -> &'static str {
        "delimiter"
    }

    /// Canonicalizes `-`/`_` separated stems into a capitalized folder name,
    /// after shaving a trailing numeric suffix off the stem.
    fn classify(&self, file_name: &str) -> Option<ClassificationResult> {
        let mut stem = strip_copy_marker(stem_of(file_name));

        // Trailing counter (with its delimiter) is not part of the name.
        if let Some(split) = stem.rfind(['-', '_']) {
            let tail = &stem[split + 1..];
            if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
                stem = stem[..split].trim_end_matches([' ', '-', '_', '.']);
            }
        }

        let has_dash = stem.contains('-');
        let has_underscore = stem.contains('_');
        let folder = match (has_dash, has_underscore) {
            (false, false) => return None,
            (false, true) => smart_title(stem),
            (true, false) => stem.split('-').map(capitalize).collect::<Vec<_>>().join("-"),
            (true, true) => {
                // The later delimiter wins the canonicalization style.
                if stem.rfind('-') > stem.rfind('_') {
                    stem.split('-').map(capitalize).collect::<Vec<_>>().join("-")
                } else {
                    smart_title(stem)
                }
            }
        };

        if folder.chars().all(|c| !c.is_alphanumeric()) {
            return None;
        }
        Some(ClassificationResult {
            folder: sanitize(&folder),
            strategy: self.id(),
            confidence: DELIMITER_CONFIDENCE,
        })
    }
}
