use async_trait::async_trait;
use serde::Serialize;

use crate::sections::ParsedDocument;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperRef {
    pub title: String,
    pub url: Option<String>,
    pub source: String,
}

/// Result of asking a [`PaperIndex`] for related work.
///
/// `NotImplemented` is distinct from `Found(vec![])`: the former means no
/// search backend exists, the latter that one ran and matched nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "papers", rename_all = "snake_case")]
pub enum RelatedPapers {
    Found(Vec<PaperRef>),
    NotImplemented,
}

/// External search capability (semantic search, arXiv, Scholar, ...).
#[async_trait]
pub trait PaperIndex: Send + Sync {
    async fn similar_to(&self, document: &ParsedDocument) -> RelatedPapers;
}

/// The index used when no search backend is configured.
pub struct UnconfiguredIndex;

#[async_trait]
impl PaperIndex for UnconfiguredIndex {
    async fn similar_to(&self, _document: &ParsedDocument) -> RelatedPapers {
        RelatedPapers::NotImplemented
    }
}
