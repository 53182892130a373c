//! Question answering agents
//!
//! A keyword classifier picks the answer template, the search agent pulls
//! context from the active index and the answer generator prompts the
//! selected model. [`AgentOrchestrator`] runs them directly or through the
//! [`Workflow`] graph.

pub mod answer;
pub mod orchestrator;
pub mod query_analyzer;
pub mod search;
pub mod workflow;

pub use answer::{build_prompt, degraded_answer, AnswerGenerator, TEMPLATES};
pub use orchestrator::AgentOrchestrator;
pub use query_analyzer::{analyze, classify, QueryAnalysis, QueryType};
pub use search::{dedup_sources, SearchAgent, SearchOutcome};
pub use workflow::{AgentState, Next, Node, Workflow};
