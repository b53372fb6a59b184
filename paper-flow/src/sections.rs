//! Structural parsing of raw text extracted from research papers.
//!
//! Text coming out of a PDF rarely keeps usable markup, so every rule here is a
//! plain keyword search over the whole document rather than a line-anchored
//! heading match. A section runs from its heading keyword to the first boundary
//! keyword that follows it, or to the end of the text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The canonical sections recognised by [`SectionExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionName {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
}

impl SectionName {
    pub const ALL: [SectionName; 5] = [
        SectionName::Abstract,
        SectionName::Introduction,
        SectionName::Methods,
        SectionName::Results,
        SectionName::Discussion,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            SectionName::Abstract => "Abstract",
            SectionName::Introduction => "Introduction",
            SectionName::Methods => "Methods",
            SectionName::Results => "Results",
            SectionName::Discussion => "Discussion",
        }
    }

    /// Keywords that terminate this section's span.
    fn boundaries(self) -> &'static [&'static str] {
        match self {
            SectionName::Abstract => &["Introduction"],
            SectionName::Introduction => &["Methods", "Methodology"],
            SectionName::Methods => &["Results"],
            SectionName::Results => &["Discussion"],
            SectionName::Discussion => &["Conclusion", "References"],
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.heading())
    }
}

struct SectionRule {
    name: SectionName,
    heading: Regex,
    boundary: Regex,
}

static SECTION_RULES: Lazy<Vec<SectionRule>> = Lazy::new(|| {
    SectionName::ALL
        .iter()
        .map(|&name| SectionRule {
            name,
            heading: Regex::new(&format!("(?i){}", regex::escape(name.heading()))).unwrap(),
            boundary: Regex::new(&format!(
                "(?i){}",
                name.boundaries()
                    .iter()
                    .map(|keyword| regex::escape(keyword))
                    .collect::<Vec<_>>()
                    .join("|")
            ))
            .unwrap(),
        })
        .collect()
});

static FIGURE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Figure \d+:").unwrap());

static REFERENCES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"References").unwrap());

/// Structured view of a paper's text. All five sections are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedDocument {
    pub title: String,
    sections: BTreeMap<SectionName, String>,
    pub figures: Vec<String>,
    pub references: String,
}

impl ParsedDocument {
    pub fn section(&self, name: SectionName) -> &str {
        self.sections.get(&name).map(String::as_str).unwrap_or("")
    }

    pub fn sections(&self) -> impl Iterator<Item = (SectionName, &str)> {
        self.sections.iter().map(|(name, text)| (*name, text.as_str()))
    }

    /// True when nothing at all was recognised.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.sections.values().all(String::is_empty)
            && self.figures.is_empty()
            && self.references.is_empty()
    }

    /// Title and the five sections joined into the body handed to the model.
    pub fn analysis_body(&self) -> String {
        let mut body = format!("Title: {}\n", self.title);
        for (name, text) in self.sections() {
            body.push_str(&format!("\n{}: {}\n", name, text));
        }
        body
    }
}

/// Turns raw extracted text into a [`ParsedDocument`]. Never fails.
pub struct SectionExtractor;

impl SectionExtractor {
    pub fn extract(raw_text: &str) -> ParsedDocument {
        let sections = SECTION_RULES
            .iter()
            .map(|rule| (rule.name, extract_section(raw_text, rule)))
            .collect();

        ParsedDocument {
            title: extract_title(raw_text),
            sections,
            figures: extract_figures(raw_text),
            references: extract_references(raw_text),
        }
    }
}

fn extract_title(text: &str) -> String {
    text.split('\n').next().unwrap_or_default().trim().to_string()
}

fn extract_section(text: &str, rule: &SectionRule) -> String {
    let Some(heading) = rule.heading.find(text) else {
        return String::new();
    };
    let end = rule
        .boundary
        .find_at(text, heading.end())
        .map(|boundary| boundary.start())
        .unwrap_or(text.len());
    text[heading.start()..end].trim().to_string()
}

/// Each block runs up to the next `Figure N:` with trailing whitespace dropped.
fn extract_figures(text: &str) -> Vec<String> {
    let starts: Vec<usize> = FIGURE_RE.find_iter(text).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            text[start..end].trim_end().to_string()
        })
        .collect()
}

fn extract_references(text: &str) -> String {
    REFERENCES_RE
        .find(text)
        .map(|m| text[m.start()..].trim_end().to_string())
        .unwrap_or_default()
}
