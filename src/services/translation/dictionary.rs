// Offline word-replacement tier; always produces an outcome

use once_cell::sync::Lazy;
use regex::Regex;

/// English to Thai word table, applied in this order
const ENGLISH_THAI: &[(&str, &str)] = &[
    ("hello", "สวัสดี"),
    ("yes", "ใช่"),
    ("no", "ไม่"),
    ("and", "และ"),
    ("the", ""),
    ("a", ""),
    ("an", ""),
    ("is", "คือ"),
    ("are", "คือ"),
    ("was", "เป็น"),
    ("were", "เป็น"),
    ("you", "คุณ"),
    ("i", "ฉัน"),
    ("me", "ฉัน"),
    ("my", "ของฉัน"),
    ("we", "เรา"),
    ("they", "พวกเขา"),
    ("he", "เขา"),
    ("she", "เธอ"),
    ("it", "มัน"),
    ("what", "อะไร"),
    ("where", "ที่ไหน"),
    ("when", "เมื่อไหร่"),
    ("why", "ทำไม"),
    ("how", "อย่างไร"),
    ("who", "ใคร"),
    ("can", "สามารถ"),
    ("will", "จะ"),
    ("would", "จะ"),
    ("could", "สามารถ"),
    ("should", "ควร"),
    ("must", "ต้อง"),
    ("have", "มี"),
    ("has", "มี"),
    ("had", "มี"),
    ("do", "ทำ"),
    ("does", "ทำ"),
    ("did", "ทำ"),
    ("go", "ไป"),
    ("come", "มา"),
    ("get", "ได้"),
    ("see", "เห็น"),
    ("know", "รู้"),
    ("think", "คิด"),
    ("want", "ต้องการ"),
    ("need", "ต้องการ"),
    ("like", "ชอบ"),
    ("love", "รัก"),
    ("good", "ดี"),
    ("bad", "แย่"),
    ("big", "ใหญ่"),
    ("small", "เล็ก"),
    ("new", "ใหม่"),
    ("old", "เก่า"),
    ("right", "ถูก"),
    ("wrong", "ผิด"),
    ("stop", "หยุด"),
    ("wait", "รอ"),
    ("look", "ดู"),
    ("listen", "ฟัง"),
    ("say", "พูด"),
    ("tell", "บอก"),
    ("ask", "ถาม"),
    ("help", "ช่วย"),
    ("thank", "ขอบคุณ"),
    ("sorry", "ขอโทษ"),
    ("please", "กรุณา"),
    ("okay", "โอเค"),
    ("ok", "โอเค"),
];

struct WordRule {
    pattern: Regex,
    replacement: &'static str,
}

static THAI_RULES: Lazy<Vec<WordRule>> = Lazy::new(|| compile(ENGLISH_THAI));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn compile(table: &'static [(&'static str, &'static str)]) -> Vec<WordRule> {
    table
        .iter()
        .map(|(word, replacement)| WordRule {
            // Table words are plain ASCII, so the escaped pattern always compiles
            pattern: Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).unwrap(),
            replacement,
        })
        .collect()
}

/// Word tables by target language code
fn rules_for(target_language: &str) -> Option<&'static [WordRule]> {
    match target_language.to_ascii_lowercase().as_str() {
        "th" => Some(THAI_RULES.as_slice()),
        _ => None,
    }
}

/// Prefix marking text that could not be translated, in the target's locale
fn untranslated_marker(target_language: &str) -> &'static str {
    match target_language.to_ascii_lowercase().as_str() {
        "th" => "[แปล]",
        _ => "[untranslated]",
    }
}

/// Basic dictionary translator. Total: never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DictionaryTranslator;

impl DictionaryTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Whether a word table exists for this target
    pub fn supports(&self, target_language: &str) -> bool {
        rules_for(target_language).is_some()
    }

    pub fn translate(&self, text: &str, target_language: &str) -> String {
        let Some(rules) = rules_for(target_language) else {
            return format!("{} {}", untranslated_marker(target_language), text);
        };

        let mut translated = text.to_lowercase();
        for rule in rules {
            translated = rule
                .pattern
                .replace_all(&translated, rule.replacement)
                .into_owned();
        }

        let translated = WHITESPACE_RUN.replace_all(&translated, " ").trim().to_string();

        if translated.is_empty() {
            format!("{} {}", untranslated_marker(target_language), text)
        } else {
            translated
        }
    }
}
