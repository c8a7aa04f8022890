pub mod llm_service;
pub mod prompts;
pub mod sanitizer;

pub use llm_service::{Generator, LlmService};
pub use sanitizer::{
    clean_model_text, dedupe, exclude_by_identity, sanitize_and_parse, sanitize_solution,
    select_best_candidate, strip_html,
};
