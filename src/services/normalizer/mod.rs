// Text Normalizer - cleans raw OCR output before translation

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.,!?])").unwrap());

/// Sentence punctuation that gets a following space
const SENTENCE_PUNCT: [char; 4] = ['.', ',', '!', '?'];

/// Marks after which no space is inserted
const CLOSING_MARKS: [char; 7] = ['.', ',', '!', '?', '\'', '"', ')'];

/// Punctuation that survives the character filter
const KEPT_PUNCT: [char; 10] = ['.', ',', '!', '?', '\'', '"', '(', ')', ':', ';'];

/// Clean recognized text.
///
/// Applies, in order: whitespace collapsing, OCR confusion correction
/// (`|`, `0`, `5`), removal of unsupported characters, punctuation spacing,
/// and a final trim. An empty result means no text was detected.
pub fn normalize(raw: &str) -> String {
    let collapsed = collapse_whitespace(raw);

    let corrected: String = collapsed
        .chars()
        .map(|c| match c {
            '|' => 'I',
            '0' => 'O',
            '5' => 'S',
            other => other,
        })
        .collect();

    let filtered: String = corrected.chars().filter(|c| is_kept(*c)).collect();
    let filtered = collapse_whitespace(&filtered);

    let tightened = SPACE_BEFORE_PUNCT.replace_all(&filtered, "$1");
    let spaced = space_after_punctuation(&tightened);

    spaced.trim().to_string()
}

fn is_kept(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || KEPT_PUNCT.contains(&c)
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").into_owned()
}

fn space_after_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        out.push(c);
        if SENTENCE_PUNCT.contains(&c) {
            if let Some(&next) = chars.peek() {
                if !next.is_whitespace() && !CLOSING_MARKS.contains(&next) {
                    out.push(' ');
                }
            }
        }
    }

    out
}
