use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("no response within {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A JSON object the model is asked to answer with.
pub trait ModelReply: DeserializeOwned {
    /// Name used in fallback notes, e.g. "Key points".
    const LABEL: &'static str;
}

/// Key points of a paper as requested from the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPoints {
    pub main_topic: String,
    pub methodology: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    pub conclusions: String,
    pub implications: String,
}

impl ModelReply for KeyPoints {
    const LABEL: &'static str = "Key points";
}

/// Sectioned summary of one paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSummary {
    pub main_findings: Vec<String>,
    pub methodology: Vec<String>,
    pub key_contributions: Vec<String>,
    pub limitations: Vec<String>,
    pub future_work: Vec<String>,
}

impl StructuredSummary {
    pub fn sections(&self) -> [(&'static str, &[String]); 5] {
        [
            ("Main findings", self.main_findings.as_slice()),
            ("Methodology", self.methodology.as_slice()),
            ("Key contributions", self.key_contributions.as_slice()),
            ("Limitations", self.limitations.as_slice()),
            ("Future work", self.future_work.as_slice()),
        ]
    }
}

impl ModelReply for StructuredSummary {
    const LABEL: &'static str = "Structured summary";
}

/// Cross-paper comparison of several analysed papers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub common_themes: Vec<String>,
    pub key_differences: Vec<String>,
    pub complementary_findings: Vec<String>,
    pub research_gaps: Vec<String>,
    pub synthesis: String,
}

impl ModelReply for Comparison {
    const LABEL: &'static str = "Comparison";
}

/// Outcome of interpreting a structured model response.
///
/// Model output is free text, so a response that does not parse is recorded as
/// [`Interpreted::Fallback`] instead of failing the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interpreted<T> {
    Parsed(T),
    Fallback { note: String, raw_response: String },
}

pub type KeyPointsOutcome = Interpreted<KeyPoints>;
pub type SummaryOutcome = Interpreted<StructuredSummary>;
pub type ComparisonOutcome = Interpreted<Comparison>;

impl<T> Interpreted<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Interpreted::Fallback { .. })
    }

    pub fn parsed(&self) -> Option<&T> {
        match self {
            Interpreted::Parsed(value) => Some(value),
            Interpreted::Fallback { .. } => None,
        }
    }
}

impl<T: ModelReply> Interpreted<T> {
    /// Strictly parse a model response as `T`'s JSON object.
    pub fn parse(raw: &str) -> Self {
        let cleaned = strip_code_fence(raw);
        match serde_json::from_str::<T>(cleaned) {
            Ok(value) => Interpreted::Parsed(value),
            Err(e) => {
                warn!("Could not parse {} from model response: {}", T::LABEL, e);
                Interpreted::Fallback {
                    note: format!("{} could not be interpreted: {}", T::LABEL, e),
                    raw_response: raw.to_string(),
                }
            }
        }
    }

    /// Placeholder for a call that did not answer within `after`.
    pub fn unavailable(after: Duration) -> Self {
        Interpreted::Fallback {
            note: format!(
                "{} unavailable: the model did not respond within {:.0} seconds.",
                T::LABEL,
                after.as_secs_f64()
            ),
            raw_response: String::new(),
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

pub fn summary_prompt(text: &str) -> String {
    format!(
        "Please provide a concise summary of the following research paper content.
        Focus on the main points, key findings, and conclusions.

        Text to summarize:
        {}

        Summary:",
        text
    )
}

pub fn key_points_prompt(text: &str) -> String {
    format!(
        r#"Extract the key points from the following research paper content.
        Respond **only** with a JSON object of the form
        {{ "main_topic": "...", "methodology": "...", "key_findings": ["..."], "conclusions": "...", "implications": "..." }}
        where main_topic is the research question, methodology the method used, key_findings the main findings,
        conclusions the main conclusions and implications the implications for future research.

        Text:
        {}"#,
        text
    )
}

pub fn structured_summary_prompt(text: &str) -> String {
    format!(
        r#"Summarize the following research paper content.
        Respond **only** with a JSON object of the form
        {{ "main_findings": ["..."], "methodology": ["..."], "key_contributions": ["..."], "limitations": ["..."], "future_work": ["..."] }}
        where every field is a list of short points and future_work holds suggested future research directions.

        {}"#,
        text
    )
}

/// Lays out per-paper digests as numbered blocks.
pub fn format_for_comparison(digests: &[String]) -> String {
    let mut formatted = String::new();
    for (i, digest) in digests.iter().enumerate() {
        formatted.push_str(&format!("\nPaper {}:\n{}\n---\n", i + 1, digest.trim_end()));
    }
    formatted
}

pub fn comparison_prompt(digests: &[String]) -> String {
    format!(
        r#"Compare the following research papers:
        {}
        Respond **only** with a JSON object of the form
        {{ "common_themes": ["..."], "key_differences": ["..."], "complementary_findings": ["..."], "research_gaps": ["..."], "synthesis": "..." }}
        where synthesis is a short paragraph combining the insights of all papers."#,
        format_for_comparison(digests)
    )
}

/// Remote text-generation capability used for summaries and key points.
///
/// Implementors only provide [`ModelGateway::generate`]; summaries, key points
/// and comparisons are built on it. Every call is bounded by the caller's timeout.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, GatewayError>;

    async fn summarize(&self, text: &str, timeout: Duration) -> Result<String, GatewayError> {
        let summary = self.generate(&summary_prompt(text), timeout).await?;
        Ok(summary.trim().to_string())
    }

    async fn extract_key_points(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<KeyPointsOutcome, GatewayError> {
        let raw = self.generate(&key_points_prompt(text), timeout).await?;
        Ok(KeyPointsOutcome::parse(&raw))
    }

    async fn structured_summary(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<SummaryOutcome, GatewayError> {
        let raw = self.generate(&structured_summary_prompt(text), timeout).await?;
        Ok(SummaryOutcome::parse(&raw))
    }

    /// Compare papers given one digest per paper.
    async fn compare_papers(
        &self,
        digests: &[String],
        timeout: Duration,
    ) -> Result<ComparisonOutcome, GatewayError> {
        let raw = self.generate(&comparison_prompt(digests), timeout).await?;
        Ok(ComparisonOutcome::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoGateway(String);

    #[async_trait]
    impl ModelGateway for EchoGateway {
        async fn generate(&self, _prompt: &str, _timeout: Duration) -> Result<String, GatewayError> {
            Ok(self.0.clone())
        }
    }

    const POINTS_JSON: &str = r#"{"main_topic":"Pruning","methodology":"Ablation","key_findings":["3% better"],"conclusions":"Works","implications":"Try larger models"}"#;

    #[test]
    fn test_parse_plain_json() {
        match KeyPointsOutcome::parse(POINTS_JSON) {
            KeyPointsOutcome::Parsed(points) => {
                assert_eq!(points.main_topic, "Pruning");
                assert_eq!(points.key_findings, vec!["3% better".to_string()]);
            }
            other => panic!("expected parsed key points, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{}\n```", POINTS_JSON);
        assert!(!KeyPointsOutcome::parse(&fenced).is_fallback());
    }

    #[test]
    fn test_prose_response_falls_back() {
        let raw = "main_topic: pruning\nkey_findings: it is faster";
        match KeyPointsOutcome::parse(raw) {
            KeyPointsOutcome::Fallback { raw_response, note } => {
                assert_eq!(raw_response, raw);
                assert!(note.starts_with("Key points could not be interpreted"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_fallback_serializes_with_kind_tag() {
        let value = serde_json::to_value(KeyPointsOutcome::parse("nope")).unwrap();
        assert_eq!(value["kind"], "fallback");
        assert_eq!(value["raw_response"], "nope");
    }

    #[test]
    fn test_structured_summary_requires_every_section() {
        let full = r#"{"main_findings":["faster"],"methodology":["pruning"],"key_contributions":["a method"],"limitations":["one dataset"],"future_work":["larger models"]}"#;
        let summary = SummaryOutcome::parse(full);
        assert_eq!(
            summary.parsed().unwrap().limitations,
            vec!["one dataset".to_string()]
        );

        let missing = SummaryOutcome::parse(r#"{"main_findings":["faster"]}"#);
        match missing {
            Interpreted::Fallback { note, .. } => {
                assert!(note.starts_with("Structured summary could not be interpreted"))
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_unavailable_names_the_output() {
        let outcome = ComparisonOutcome::unavailable(Duration::from_secs(120));
        match outcome {
            Interpreted::Fallback { note, raw_response } => {
                assert_eq!(
                    note,
                    "Comparison unavailable: the model did not respond within 120 seconds."
                );
                assert!(raw_response.is_empty());
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_prompt_numbers_each_paper() {
        let prompt = comparison_prompt(&["Title: A\n".to_string(), "Title: B".to_string()]);
        assert!(prompt.contains("Paper 1:\nTitle: A\n---"));
        assert!(prompt.contains("Paper 2:\nTitle: B\n---"));
        assert!(prompt.contains("\"common_themes\""));
        assert!(!prompt.contains("\"main_topic\""));
    }

    #[tokio::test]
    async fn test_comparison_parses_fenced_reply() {
        let gateway = EchoGateway(
            "```json\n{\"common_themes\":[\"attention\"],\"key_differences\":[],\"complementary_findings\":[],\"research_gaps\":[\"theory\"],\"synthesis\":\"Both prune.\"}\n```".to_string(),
        );
        let outcome = gateway
            .compare_papers(&["a".to_string(), "b".to_string()], Duration::from_secs(1))
            .await
            .unwrap();
        let comparison = outcome.parsed().unwrap();
        assert_eq!(comparison.common_themes, vec!["attention".to_string()]);
        assert_eq!(comparison.synthesis, "Both prune.");
    }

    #[tokio::test]
    async fn test_default_operations_use_generate() {
        let gateway = EchoGateway(format!("  {}  ", POINTS_JSON));
        let timeout = Duration::from_secs(1);

        let summary = gateway.summarize("body", timeout).await.unwrap();
        assert_eq!(summary, POINTS_JSON);

        let points = gateway.extract_key_points("body", timeout).await.unwrap();
        assert!(!points.is_fallback());
    }
}
