//! Analysis for vellum: similarity banding, duplicate detection,
//! graph-aware link suggestion, auto-tagging, and the vault activity
//! digest over indexed notes.

pub mod band;
pub mod digest;
pub mod duplicates;
pub mod suggest;
pub mod tagger;

pub use band::SimilarityBand;
pub use digest::{DigestGenerator, DigestReport, SuggestedConnection, TrendingEntity};
pub use duplicates::{BufferSink, DuplicateDetector, LogSink, OverlapEntry, OverlapSink};
pub use suggest::{composite_score, NoteSuggester, Suggestion};
pub use tagger::{
    AutoTagger, KeywordClassifier, QuarantineState, TagClassifier, TagProposal, TagSuggestion,
};
