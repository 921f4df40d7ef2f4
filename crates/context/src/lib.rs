//! PaperMind Context Engine
//!
//! The read path of the system:
//! - [`assembler`]: tenant-safe, provenance-tagged context from the vector index
//! - [`prompts`]: prompt templates for chat, gap analysis and deep research
//! - [`analysis`]: tolerant parsing of the model's structured analysis
//! - [`citations`]: source markers cited in chat answers
//! - [`orchestrator`]: the three query modes end to end

pub mod analysis;
pub mod assembler;
pub mod citations;
pub mod orchestrator;
pub mod prompts;

pub use analysis::ParsedAnalysis;
pub use assembler::{AssembledContext, Breadth, ContextAssembler, ANALYSIS_PROBES};
pub use orchestrator::{ChatAnswer, ReasoningOrchestrator, ResearchReport};
pub use prompts::QueryCharacter;
