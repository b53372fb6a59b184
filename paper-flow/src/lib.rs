pub mod error;
pub mod gateway;
pub mod pdf;
pub mod related;
pub mod runner;
pub mod sections;
pub mod storage;
pub mod task;

// Re-export commonly used types
pub use error::{AnalysisError, ErrorKind, Result};
pub use gateway::{
    Comparison, ComparisonOutcome, GatewayError, Interpreted, KeyPoints, KeyPointsOutcome,
    ModelGateway, ModelReply, StructuredSummary, SummaryOutcome,
};
pub use pdf::{LopdfPageText, PageText, PageTextSource};
pub use related::{PaperIndex, PaperRef, RelatedPapers, UnconfiguredIndex};
pub use runner::{AnalysisLimits, AnalysisTaskManager, AnalysisTaskManagerBuilder, validate_upload};
pub use sections::{ParsedDocument, SectionExtractor, SectionName};
pub use storage::TaskRegistry;
pub use task::{AnalysisReport, AnalysisTask, PageStats, Summary, TaskFailure, TaskId, TaskStatus, TaskView};
