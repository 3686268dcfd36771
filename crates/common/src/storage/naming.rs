//! Stored filename generation
//!
//! Stored names look like `{suffix}_{stem}.pdf`: a random hex suffix followed by
//! a filesystem-safe version of the client's original name.

use rand::RngCore;

/// Length of the hex suffix, in characters
pub const SUFFIX_LEN: usize = 16;

const MAX_STEM_LEN: usize = 100;
const FALLBACK_STEM: &str = "paper";

/// Source of the unique prefix for stored filenames
pub trait NameGenerator: Send + Sync {
    fn suffix(&self) -> String;
}

/// CSPRNG-backed suffix: 8 random bytes as 16 lowercase hex chars
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSuffix;

impl NameGenerator for RandomSuffix {
    fn suffix(&self) -> String {
        let mut bytes = [0u8; SUFFIX_LEN / 2];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

/// Reduce a client-supplied stem to `[A-Za-z0-9._-]`.
///
/// Whitespace runs become a single `_`, other characters are dropped,
/// leading/trailing `.` and `_` are trimmed and the result is capped at
/// 100 characters. An empty result becomes `paper`.
pub fn sanitize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut in_space = false;

    for ch in stem.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let capped = &trimmed[..trimmed.len().min(MAX_STEM_LEN)];
    let capped = capped.trim_end_matches(|c| c == '.' || c == '_');

    if capped.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        capped.to_string()
    }
}

/// Build the stored name for an uploaded file.
///
/// `original` must already have passed the `.pdf` extension check; the
/// extension is stripped case-insensitively and re-added in lower case.
pub fn unique_filename(generator: &dyn NameGenerator, original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);
    let stem = match base.len().checked_sub(4) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".pdf") => {
            &base[..cut]
        }
        _ => base,
    };

    format!("{}_{}.pdf", generator.suffix(), sanitize_stem(stem))
}
