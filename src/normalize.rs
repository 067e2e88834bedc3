//! Text cleanup applied to extracted text before chunking.
//!
//! Three variants exist, chosen by how the text was obtained:
//!
//! | Variant | Input | Rules |
//! |---------|-------|-------|
//! | [`OcrNormalizer`] | OCR output (PDF and Word images) | charset strip, hyphen repair, boilerplate and noise removal, paragraph merge, misspelling table, whitespace |
//! | [`normalize_office`] | Word body text | allow-list, label-line removal, one paragraph per line |
//! | [`normalize_plain`] | text, markdown, csv, xlsx, pptx | control characters, whitespace |
//!
//! Every variant re-runs its rule sequence until the text stops changing, so
//! `normalize(normalize(x)) == normalize(x)`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::FileFormat;
use crate::models::{ContentKind, RawDocument};

/// Built-in OCR header/footer patterns (patent front-page furniture).
pub const DEFAULT_HEADER_PATTERNS: &[&str] = &[
    r"^WO\s?\d{4}/\d{6}(?:\s?[A-Z]\d?)?",
    r"^(?:\(?\d{1,3}\)?\s+)+",
    r"^INTERNATIONAL\b.*$",
    r"^World Intellectual Property Organization.*$",
    r"^Organization International Bureau.*$",
    r"^PCT/.*$",
    r"^(C|G)[0-9][A-Z]?\s\d+/\d+\s?\(\d{4}",
];

static NON_PRINTABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\x20-\x7E\n]").expect("Invalid non-printable regex"));
static HYPHEN_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-(?:[ \t]*\n\s*|[ \t]+)([a-z])").expect("Invalid hyphen break regex")
});
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4,}$").expect("Invalid digit regex"));
static UPPER_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{5,}$").expect("Invalid uppercase regex"));
static NOISE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[>a-zA-Z]{1,3}$").expect("Invalid noise token regex"));
static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z ]{5,}$").expect("Invalid heading regex"));
static HORIZONTAL_WS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("Invalid whitespace regex"));
static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Invalid newline regex"));
static SPACE_BEFORE_NEWLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" +\n").expect("Invalid trailing space regex"));

/// Known OCR misreadings and their canonical spelling.
static OCR_FIXES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\bW0\s?(\d{4}/\d+)\b", "WO $1"),
        (r"(?i)\blnternational\b", "International"),
        (r"(?i)\b1nternational\b", "International"),
        (r"(?i)\bPub['’`]?n?lication\b", "Publication"),
        (r"(?i)\bGOIN\b", "G01N"),
        (r"(?i)\bOx\s*ford\b", "Oxford"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("Invalid OCR fix regex"),
            replacement,
        )
    })
    .collect()
});

static OFFICE_DISALLOWED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[^\x{4e00}-\x{9fa5}A-Za-z0-9，。！？、,.!?\-:：；;（）()\[\]《》“”"'’‘\s]"#)
        .expect("Invalid office allow-list regex")
});
static OFFICE_LINE_HYPHEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-[ \t]*\n\s*([A-Za-z])").expect("Invalid office line hyphen regex")
});
static OFFICE_SPACE_HYPHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-\s+([A-Za-z])").expect("Invalid office hyphen regex"));
static ANY_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Template and label fragments found in controlled office documents.
static OFFICE_LABELS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"项目名称[：:].*",
        r"项目编号[：:].*",
        r"页码",
        r"文件名称[：:].*",
        r"文件编号[：:].*",
        r"修订记录.*",
        r"目录.*",
        r"^\d+\s*/\s*\d+$",
        r"(?i)document\s+(?:id|no\.?|number|name)\s*[：:].*",
        r"(?i)project\s+(?:name|no\.?|number)\s*[：:].*",
        r"(?i)revision\s+history.*",
        r"(?i)table\s+of\s+contents.*",
        r"(?i)^page\s+\d+(?:\s*(?:/|of)\s*\d+)?$",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid office label regex"))
    .collect()
});

static PLAIN_CONTROL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B-\x1F\x7F]").expect("Invalid control character regex")
});
static LINE_EDGE_SPACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^ +| +$").expect("Invalid line edge regex"));

/// Runs `pass` until its output is stable.
///
/// Rules only delete characters, collapse whitespace, or rewrite a known
/// misreading into a spelling that no rule matches again, so this ends.
fn to_fixpoint(text: &str, pass: impl Fn(&str) -> String) -> String {
    let mut current = pass(text);
    loop {
        let next = pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Normalizer for OCR output.
///
/// Holds the compiled header/footer patterns; everything else is fixed.
#[derive(Debug, Clone)]
pub struct OcrNormalizer {
    header_patterns: Vec<Regex>,
}

impl Default for OcrNormalizer {
    fn default() -> Self {
        let header_patterns = DEFAULT_HEADER_PATTERNS
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)).expect("Invalid default header regex"))
            .collect();
        Self { header_patterns }
    }
}

impl OcrNormalizer {
    /// Compiles custom header/footer patterns. Matching is case-insensitive
    /// and applied to each line on its own.
    pub fn with_header_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let header_patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { header_patterns })
    }

    pub fn normalize(&self, text: &str) -> String {
        to_fixpoint(text, |t| self.apply_rules(t))
    }

    fn apply_rules(&self, text: &str) -> String {
        let text = strip_non_printable(text);
        let text = rejoin_hyphenation(&text);
        let text = self.remove_boilerplate(&text);
        let lines = drop_noise_lines(&text);
        let text = merge_paragraphs(&lines);
        let text = fix_ocr_misspellings(&text);
        collapse_whitespace(&text)
    }

    /// Rule 3: strips header/footer matches from every line.
    pub fn remove_boilerplate(&self, text: &str) -> String {
        text.lines()
            .map(|line| self.strip_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Re-applies the patterns until none of them matches, trimming the
    /// leading whitespace a removal leaves so anchored patterns see the next
    /// token.
    fn strip_line(&self, line: &str) -> String {
        let mut current = line.to_string();
        loop {
            let next = self.header_patterns.iter().fold(current.clone(), |acc, re| {
                re.replace_all(&acc, "").trim_start().to_string()
            });
            if next == current {
                return current;
            }
            current = next;
        }
    }
}

/// Rule 1: keeps printable ASCII and newlines.
pub fn strip_non_printable(text: &str) -> String {
    NON_PRINTABLE.replace_all(text, "").into_owned()
}

/// Rule 2: `Ox-\n  ford` and `Ox- ford` become `Oxford`.
pub fn rejoin_hyphenation(text: &str) -> String {
    HYPHEN_BREAK.replace_all(text, "$1").into_owned()
}

/// Rule 4: trims lines and drops blanks and presumed OCR artifacts.
pub fn drop_noise_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !DIGIT_RUN.is_match(line)
                && !UPPER_RUN.is_match(line)
                && !NOISE_TOKEN.is_match(line)
        })
        .map(str::to_string)
        .collect()
}

fn is_heading(line: &str) -> bool {
    HEADING.is_match(line)
}

/// Rule 5: joins consecutive body lines with a space; headings keep their breaks.
pub fn merge_paragraphs(lines: &[String]) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        out.push_str(line);
        let joins_next =
            i + 1 < lines.len() && !is_heading(line) && !is_heading(&lines[i + 1]);
        out.push(if joins_next { ' ' } else { '\n' });
    }
    out
}

/// Rule 6.
pub fn fix_ocr_misspellings(text: &str) -> String {
    OCR_FIXES
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// Rule 7.
pub fn collapse_whitespace(text: &str) -> String {
    let text = HORIZONTAL_WS.replace_all(text, " ");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    let text = SPACE_BEFORE_NEWLINE.replace_all(&text, "\n");
    text.trim().to_string()
}

/// Normalizer for structured office text: one paragraph per non-empty line.
pub fn normalize_office(text: &str) -> String {
    to_fixpoint(text, office_pass)
}

fn office_pass(text: &str) -> String {
    let text = OFFICE_LINE_HYPHEN.replace_all(text, "$1");
    text.lines()
        .filter_map(|line| {
            let line = OFFICE_DISALLOWED.replace_all(line, "");
            let line = ANY_WS.replace_all(&line, " ");
            let line = OFFICE_SPACE_HYPHEN.replace_all(&line, "$1");
            let line = OFFICE_LABELS
                .iter()
                .fold(line.trim().to_string(), |acc, re| {
                    re.replace_all(&acc, "").trim().to_string()
                });
            (!line.is_empty()).then_some(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalizer for native text: control characters and whitespace only.
pub fn normalize_plain(text: &str) -> String {
    to_fixpoint(text, |t| {
        let t = PLAIN_CONTROL.replace_all(t, "");
        let t = HORIZONTAL_WS.replace_all(&t, " ");
        let t = LINE_EDGE_SPACES.replace_all(&t, "");
        let t = EXCESS_NEWLINES.replace_all(&t, "\n\n");
        t.trim().to_string()
    })
}

/// Which normalizer a document goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerKind {
    Ocr,
    Office,
    Plain,
}

impl NormalizerKind {
    pub fn select(kind: ContentKind, format: &FileFormat) -> Self {
        match (kind, format) {
            (ContentKind::OcrExtracted, _) => NormalizerKind::Ocr,
            (ContentKind::NativeText, FileFormat::Docx) => NormalizerKind::Office,
            (ContentKind::NativeText, _) => NormalizerKind::Plain,
        }
    }
}

/// Applies the variant appropriate to each [`RawDocument`].
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    ocr: OcrNormalizer,
}

impl TextNormalizer {
    pub fn new(header_patterns: Option<&[String]>) -> Result<Self, regex::Error> {
        let ocr = match header_patterns {
            Some(patterns) => OcrNormalizer::with_header_patterns(patterns)?,
            None => OcrNormalizer::default(),
        };
        Ok(Self { ocr })
    }

    pub fn normalize(&self, doc: &RawDocument) -> String {
        let text = doc.content.text();
        match NormalizerKind::select(doc.content_kind, &doc.format) {
            NormalizerKind::Ocr => self.ocr.normalize(&text),
            NormalizerKind::Office => normalize_office(&text),
            NormalizerKind::Plain => normalize_plain(&text),
        }
    }
}
