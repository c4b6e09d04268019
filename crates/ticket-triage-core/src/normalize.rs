//! Ticket text normalization.
//!
//! Turns raw ticket text into a [`NormalizedText`]: a cleaned display form
//! that keeps the author's casing, a lowercased sentence used by the
//! classifier and the embedding engine, its word tokens, and a detected
//! language tag.
//!
//! # Pipeline
//!
//! 1. Reject text that is empty after trimming.
//! 2. Remove markup tags and HTML entities.
//! 3. Drop control and zero-width characters (whitespace controls become spaces).
//! 4. Collapse whitespace runs → display text.
//! 5. Lowercase, scrub URLs, e-mail addresses and phone numbers, collapse
//!    repeated `.`/`!`/`?` → cleaned sentence.
//! 6. Segment into Unicode words and tag the language by stopword overlap.

use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Result, TriageError};
use crate::models::LanguageTag;

static MARKUP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<[^>]*>|&amp;|&lt;|&gt;|&quot;|&apos;|&nbsp;|&#\d+;|&#x[0-9a-f]+;")
        .expect("MARKUP_REGEX: invalid pattern")
});

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://\S+|www\.\S+").expect("URL_REGEX: invalid pattern")
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").expect("EMAIL_REGEX: invalid pattern")
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").expect("PHONE_REGEX: invalid pattern")
});

static PUNCT_RUN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])[.!?]+").expect("PUNCT_RUN_REGEX: invalid pattern"));

/// Languages recognised by the stopword heuristic, in tie-break order.
const LANGUAGES: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "and", "is", "are", "was", "to", "of", "in", "it", "my", "i", "you", "have",
            "has", "not", "this", "that", "with", "for", "on", "be", "can", "please",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "das", "und", "ist", "nicht", "ich", "mit", "für", "zu", "ein", "eine",
            "es", "sie", "wir", "auf", "bitte", "mein", "meine", "kann",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "les", "et", "est", "pas", "je", "une", "avec", "pour", "dans", "mon",
            "ma", "ne", "vous", "des", "du", "sur", "merci",
        ],
    ),
    (
        "es",
        &[
            "el", "los", "las", "y", "es", "no", "con", "para", "una", "mi", "por", "que", "del",
            "se", "está", "gracias",
        ],
    ),
    (
        "it",
        &[
            "il", "lo", "gli", "e", "è", "non", "con", "per", "una", "mio", "che", "sono", "della",
            "grazie",
        ],
    ),
    (
        "pt",
        &[
            "o", "os", "as", "e", "é", "não", "com", "para", "uma", "meu", "que", "do", "da",
            "obrigado",
        ],
    ),
    (
        "nl",
        &[
            "de", "het", "een", "en", "is", "niet", "ik", "met", "voor", "van", "mijn", "dat",
            "op",
        ],
    ),
];

/// Canonical form of a ticket's text.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedText {
    /// Cleaned text with the author's original casing.
    pub display: String,
    /// Lowercased, scrubbed sentence fed to classification and embedding.
    pub cleaned: String,
    /// Lowercased word tokens of `cleaned`.
    pub tokens: Vec<String>,
    pub language: LanguageTag,
}

/// Stateless text normalizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize raw ticket text.
    ///
    /// Fails with [`TriageError::EmptyInput`] when the text is blank, or
    /// when nothing remains once markup and personal data are scrubbed.
    pub fn normalize(&self, raw: &str) -> Result<NormalizedText> {
        if raw.trim().is_empty() {
            return Err(TriageError::EmptyInput);
        }

        let without_markup = MARKUP_REGEX.replace_all(raw, " ");
        let display = collapse_whitespace(&strip_non_printable(&without_markup));

        let lowered = display.to_lowercase();
        let scrubbed = URL_REGEX.replace_all(&lowered, " ");
        let scrubbed = EMAIL_REGEX.replace_all(&scrubbed, " ");
        let scrubbed = PHONE_REGEX.replace_all(&scrubbed, " ");
        let scrubbed = PUNCT_RUN_REGEX.replace_all(&scrubbed, "$1");
        let cleaned = collapse_whitespace(&scrubbed);

        if cleaned.is_empty() {
            return Err(TriageError::EmptyInput);
        }

        let tokens: Vec<String> = cleaned.unicode_words().map(str::to_string).collect();
        let language = detect_language(&tokens);

        Ok(NormalizedText {
            display,
            cleaned,
            tokens,
            language,
        })
    }
}

fn strip_non_printable(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if c.is_control() || matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}') {
                None
            } else {
                Some(c)
            }
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Score each known language by how many tokens are among its stopwords.
///
/// Highest overlap wins, earlier languages win ties, and `en` is returned
/// with confidence 0.5 when nothing overlaps.
pub fn detect_language(tokens: &[String]) -> LanguageTag {
    let mut best: Option<(&str, usize)> = None;

    for (code, stopwords) in LANGUAGES {
        let hits = tokens
            .iter()
            .filter(|t| stopwords.contains(&t.as_str()))
            .count();
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((code, hits));
        }
    }

    match best {
        Some((code, hits)) => LanguageTag {
            code: code.to_string(),
            name: language_name(code),
            confidence: (0.5 + hits as f64 / tokens.len() as f64).min(0.99),
        },
        None => LanguageTag {
            code: "en".to_string(),
            name: language_name("en"),
            confidence: 0.5,
        },
    }
}

/// Display name for an ISO 639-1 code; unknown codes are uppercased.
pub fn language_name(code: &str) -> String {
    let known = match code {
        "en" => "English",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        other => return other.to_uppercase(),
    };
    known.to_string()
}
