pub mod analyzer;
pub mod evidence;
pub mod types;

pub use analyzer::ScreenAnalyzer;
pub use evidence::EvidenceStore;
pub use types::{Bounds, MatchedElement, ScreenAnalysis, ScreenEvidence, SuggestedLocators};
