use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::extract::ParagraphSpan;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:Article|Section|Chapter|Part)\s+\d+|\d+[.)]\s|\b[IVXLCDM]+[.)]\s)").expect("heading")
});

const HEADING_STYLES: [&str; 5] = ["Heading1", "Heading2", "Heading3", "Title", "Subtitle"];
const MAX_CAPS_HEADING_LEN: usize = 120;

/// A run of segments opened by a heading-like paragraph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalSection {
    pub title: String,
    /// First segment of the heading paragraph.
    pub start_index: usize,
    /// Last segment before the next heading, inclusive.
    pub end_index: usize,
    pub level: u8,
}

fn heading_level(style: Option<&str>, text: &str) -> Option<u8> {
    let style = style.unwrap_or("");
    if HEADING_STYLES.iter().any(|h| style.contains(h)) {
        let level = if style.contains("Heading1") || style.contains("Title") {
            1
        } else if style.contains("Heading2") || style.contains("Subtitle") {
            2
        } else {
            3
        };
        return Some(level);
    }
    if HEADING_RE.is_match(text) {
        return Some(2);
    }
    let shouting = !text.is_empty()
        && text.encode_utf16().count() < MAX_CAPS_HEADING_LEN
        && text == text.to_uppercase()
        && text.chars().any(|c| c.is_ascii_uppercase());
    shouting.then_some(1)
}

/// Groups body segments under headings found by paragraph style, by a
/// numbering pattern ("Article 3", "2.", "IV)") or by short all-caps lines.
///
/// Each heading closes the section before it regardless of level; the last
/// section runs to the last segment of `paragraphs`.
pub fn detect_sections(paragraphs: &[ParagraphSpan]) -> Vec<LegalSection> {
    let Some(last_segment) = paragraphs.last().map(|p| p.segments.end.saturating_sub(1)) else {
        return Vec::new();
    };
    let mut sections: Vec<LegalSection> = Vec::new();
    for para in paragraphs {
        let title = para.text.trim();
        let Some(level) = heading_level(para.style.as_deref(), title) else {
            continue;
        };
        if let Some(prev) = sections.last_mut() {
            prev.end_index = para.segments.start.saturating_sub(1);
        }
        sections.push(LegalSection {
            title: title.to_string(),
            start_index: para.segments.start,
            end_index: last_segment,
            level,
        });
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(text: &str, style: Option<&str>, start: usize, len: usize) -> ParagraphSpan {
        ParagraphSpan {
            text: text.to_string(),
            style: style.map(str::to_string),
            segments: start..start + len,
        }
    }

    #[test]
    fn levels_from_style_pattern_and_capitals() {
        assert_eq!(heading_level(Some("Heading1"), "Intro"), Some(1));
        assert_eq!(heading_level(Some("Title"), "Agreement"), Some(1));
        assert_eq!(heading_level(Some("Subtitle"), "draft"), Some(2));
        assert_eq!(heading_level(Some("Heading3"), "Scope"), Some(3));
        assert_eq!(heading_level(None, "Article 12 Payment"), Some(2));
        assert_eq!(heading_level(None, "section 3"), Some(2));
        assert_eq!(heading_level(None, "4. Termination"), Some(2));
        assert_eq!(heading_level(None, "IV) Remedies"), Some(2));
        assert_eq!(heading_level(None, "DEFINITIONS"), Some(1));
        assert_eq!(heading_level(Some("Normal"), "The parties agree."), None);
        assert_eq!(heading_level(None, "2024"), None);
        assert_eq!(heading_level(None, &"LONG ".repeat(30)), None);
    }

    #[test]
    fn sections_close_at_the_next_heading() {
        let paragraphs = vec![
            para("MASTER AGREEMENT", None, 0, 1),
            para("Preamble text.", None, 1, 2),
            para("Article 1 Definitions", Some("Normal"), 3, 1),
            para("Terms mean things.", None, 4, 1),
            para("Scope", Some("Heading2"), 5, 1),
            para("Everything.", None, 6, 3),
        ];
        let sections = detect_sections(&paragraphs);
        let summary: Vec<(&str, usize, usize, u8)> = sections
            .iter()
            .map(|s| (s.title.as_str(), s.start_index, s.end_index, s.level))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("MASTER AGREEMENT", 0, 2, 1),
                ("Article 1 Definitions", 3, 4, 2),
                ("Scope", 5, 8, 2),
            ]
        );
    }

    #[test]
    fn no_headings_no_sections() {
        assert!(detect_sections(&[]).is_empty());
        assert!(detect_sections(&[para("just prose", None, 0, 4)]).is_empty());
    }
}
