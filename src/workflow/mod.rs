pub mod analyze_flow;

pub use analyze_flow::{AnalyzeFlow, NicheReport};
