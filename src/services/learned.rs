use crate::data::store::PatternStore;
use crate::error::EngineError;

/// Camera-style tokens stay verbatim in a signature; anything longer or
/// mixed-case collapses to TEXT.
const MAX_LITERAL_TOKEN: usize = 5;

pub const LEARNED_BASE_CONFIDENCE: f32 = 0.80;
pub const LEARNED_CONFIDENCE_STEP: f32 = 0.03;
pub const LEARNED_MAX_CONFIDENCE: f32 = 0.99;

/// Collapses a filename into a shape signature.
///
/// `vacation-001.jpg` -> `TEXT-NNN`, `IMG_1234.jpg` -> `IMG_NNNN`,
/// `file001.pdf` -> `TEXTNNN`, `031204-0022.jpg` -> `NNNNNN-NNNN`.
pub fn extract_signature(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };

    let mut signature = String::new();
    let chars: Vec<char> = stem.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                signature.push('N');
                i += 1;
            }
        } else if c.is_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_alphabetic() {
                i += 1;
            }
            let token: String = chars[start..i].iter().collect();
            if token.len() <= MAX_LITERAL_TOKEN && token.chars().all(|c| c.is_uppercase()) {
                signature.push_str(&token);
            } else {
                signature.push_str("TEXT");
            }
        } else {
            signature.push(c);
            i += 1;
        }
    }
    signature
}

/// Confidence grows with each confirmation of the same mapping.
pub fn confidence_for_count(count: u32) -> f32 {
    (LEARNED_BASE_CONFIDENCE + LEARNED_CONFIDENCE_STEP * count as f32)
        .min(LEARNED_MAX_CONFIDENCE)
}

/// Looks up a learned folder for this filename's signature.
pub fn predict(
    store: &dyn PatternStore,
    file_name: &str,
) -> Result<Option<(String, f32)>, EngineError> {
    let signature = extract_signature(file_name);
    Ok(store
        .get_pattern(&signature)?
        .map(|(folder, count)| (folder, confidence_for_count(count))))
}

/// Remembers a user's folder choice for every future file of this shape.
pub fn learn(store: &dyn PatternStore, file_name: &str, folder: &str) -> Result<(), EngineError> {
    store.record_pattern(&extract_signature(file_name), folder)
}
