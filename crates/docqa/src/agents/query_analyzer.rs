//! Keyword intent classification for incoming questions

use serde::{Deserialize, Serialize};

/// Intent of a question, selects the answer template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Definition,
    Process,
    Comparison,
    General,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Definition => "definition",
            QueryType::Process => "process",
            QueryType::Comparison => "comparison",
            QueryType::General => "general",
        }
    }
}

/// Keyword sets checked in order; the first set with a hit wins
const RULES: &[(QueryType, &[&str])] = &[
    (QueryType::Definition, &["what is", "define", "definition"]),
    (QueryType::Process, &["how", "process", "steps", "method"]),
    (QueryType::Comparison, &["compare", "difference", "vs", "versus"]),
];

/// Classification of one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub original_query: String,
    pub query_type: QueryType,
}

/// Classify a question by lower-cased substring match
pub fn analyze(query: &str) -> QueryAnalysis {
    QueryAnalysis {
        original_query: query.to_string(),
        query_type: classify(query),
    }
}

pub fn classify(query: &str) -> QueryType {
    let lowered = query.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(query_type, _)| *query_type)
        .unwrap_or(QueryType::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_each_intent() {
        assert_eq!(classify("What is a neural network?"), QueryType::Definition);
        assert_eq!(classify("Define entropy"), QueryType::Definition);
        assert_eq!(classify("How does backpropagation work?"), QueryType::Process);
        assert_eq!(classify("List the steps of onboarding"), QueryType::Process);
        assert_eq!(classify("Compare TCP and UDP"), QueryType::Comparison);
        assert_eq!(classify("cats versus dogs"), QueryType::Comparison);
        assert_eq!(classify("Tell me about the budget"), QueryType::General);
    }

    #[test]
    fn test_priority_order() {
        // definition beats process beats comparison
        assert_eq!(classify("What is the difference in how they work?"), QueryType::Definition);
        assert_eq!(classify("How do I compare them?"), QueryType::Process);
    }

    #[test]
    fn test_substring_matching() {
        // "show" contains "how"
        assert_eq!(classify("Show the revenue table"), QueryType::Process);
        assert_eq!(classify("Revenue by region"), QueryType::General);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let a = analyze("Define latency");
        let b = analyze("Define latency");
        assert_eq!(a, b);
        assert_eq!(a.original_query, "Define latency");
        assert_eq!(serde_json::to_value(&a).unwrap()["query_type"], "definition");
    }
}
