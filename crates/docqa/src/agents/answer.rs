//! Grounded answer generation from retrieved context

use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::LlmProvider;

use super::query_analyzer::{QueryAnalysis, QueryType};

/// Prompt template per intent; `{context}` and `{query}` are substituted
pub const TEMPLATES: &[(QueryType, &str)] = &[
    (QueryType::Definition, DEFINITION_TEMPLATE),
    (QueryType::Process, PROCESS_TEMPLATE),
    (QueryType::Comparison, COMPARISON_TEMPLATE),
    (QueryType::General, GENERAL_TEMPLATE),
];

const DEFINITION_TEMPLATE: &str = "Based EXCLUSIVELY on the provided document context, provide a comprehensive answer to the user's question.

DOCUMENT CONTEXT:
{context}

USER QUESTION: {query}

Please structure your answer as:
- **Clear Definition**: Start with a concise definition
- **Key Characteristics**: Main features or aspects
- **Importance/Significance**: Why it matters
- **Applications/Examples**: Where and how it's used
- **Summary**: Brief recap

Use markdown formatting with headers (##), bullet points, and **bold** for key terms.
Answer using ONLY the document context above. If the context doesn't contain enough information, say so.";

const PROCESS_TEMPLATE: &str = "Based EXCLUSIVELY on the provided document context, explain the process or method asked about.

DOCUMENT CONTEXT:
{context}

USER QUESTION: {query}

Please structure your answer as:
- **Overview**: Brief introduction to the process
- **Step-by-Step Explanation**: Clear sequential steps
- **Key Components**: Important elements involved
- **Applications**: Where this process is used
- **Considerations**: Important factors or limitations

Use markdown formatting and be practical. Answer using ONLY the document context above.";

const COMPARISON_TEMPLATE: &str = "Based EXCLUSIVELY on the provided document context, compare the concepts asked about.

DOCUMENT CONTEXT:
{context}

USER QUESTION: {query}

Please structure your answer as:
- **Overview**: Brief introduction to both concepts
- **Key Differences**: Clear comparison points
- **Similarities**: Common aspects
- **Use Cases**: When to use each
- **Summary**: Comparative conclusion

Use markdown formatting with tables or clear sections. Answer using ONLY the document context above.";

const GENERAL_TEMPLATE: &str = "Based EXCLUSIVELY on the provided document context, provide a comprehensive and well-structured answer to the user's question.

DOCUMENT CONTEXT:
{context}

USER QUESTION: {query}

Please provide a natural, flowing answer that:
- Directly addresses the question
- Explains key concepts clearly
- Uses appropriate examples from the context
- Highlights important points
- Maintains logical flow

Use markdown formatting with:
## Headers for main sections
- Bullet points for lists
**Bold** for key terms and definitions
Clear paragraph structure

Answer using ONLY the document context above. If the information is insufficient, acknowledge this politely.";

/// Template registered for an intent
pub fn template_for(query_type: QueryType) -> &'static str {
    TEMPLATES
        .iter()
        .find(|(t, _)| *t == query_type)
        .map(|(_, template)| *template)
        .unwrap_or(GENERAL_TEMPLATE)
}

/// Numbered source blocks separated by blank lines
pub fn format_context(chunks: &[String]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("📄 Source {}:\n{}", i + 1, chunk))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill a template; placeholder text inside the context is left alone
pub fn build_prompt(query_type: QueryType, query: &str, chunks: &[String]) -> String {
    let context = format_context(chunks);
    template_for(query_type)
        .split("{context}")
        .map(|part| part.replace("{query}", query))
        .collect::<Vec<_>>()
        .join(&context)
}

/// Answer returned when generation fails
pub fn degraded_answer(error: &Error) -> String {
    format!("I found relevant documents but encountered an error: {}", error)
}

/// Sends the filled template to the active model
pub struct AnswerGenerator {
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Generate, propagating model errors and timeouts
    pub async fn try_generate(
        &self,
        llm: &dyn LlmProvider,
        query: &str,
        chunks: &[String],
        analysis: &QueryAnalysis,
    ) -> Result<String> {
        let prompt = build_prompt(analysis.query_type, query, chunks);
        tracing::debug!(
            "Generating {} answer with {} ({} context chunks)",
            analysis.query_type.as_str(),
            llm.model(),
            chunks.len()
        );

        tokio::time::timeout(self.timeout, llm.generate(&prompt))
            .await
            .map_err(|_| Error::timeout("Answer generation", self.timeout))?
    }

    /// Generate, converting any failure into the degraded answer
    pub async fn generate(
        &self,
        llm: &dyn LlmProvider,
        query: &str,
        chunks: &[String],
        analysis: &QueryAnalysis,
    ) -> String {
        match self.try_generate(llm, query, chunks, analysis).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Answer generation failed: {}", e);
                degraded_answer(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::query_analyzer::analyze;
    use crate::providers::testing::FakeLlm;

    fn chunks() -> Vec<String> {
        vec![
            "A neural network is a layered function approximator.".to_string(),
            "Weights are learned by gradient descent.".to_string(),
        ]
    }

    #[test]
    fn test_every_intent_has_a_template() {
        for query_type in [
            QueryType::Definition,
            QueryType::Process,
            QueryType::Comparison,
            QueryType::General,
        ] {
            let template = template_for(query_type);
            assert!(template.starts_with("Based EXCLUSIVELY on the provided document context"));
            assert!(template.contains("{context}"));
            assert!(template.contains("{query}"));
        }
        assert!(template_for(QueryType::Definition).contains("**Clear Definition**"));
        assert!(template_for(QueryType::Process).contains("**Step-by-Step Explanation**"));
        assert!(template_for(QueryType::Comparison).contains("**Key Differences**"));
        assert!(template_for(QueryType::General).contains("acknowledge this politely"));
    }

    #[test]
    fn test_context_formatting() {
        let context = format_context(&chunks());
        assert_eq!(
            context,
            "📄 Source 1:\nA neural network is a layered function approximator.\n\n📄 Source 2:\nWeights are learned by gradient descent."
        );
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_prompt_embeds_question_and_context() {
        let prompt = build_prompt(QueryType::Definition, "What is a neural network?", &chunks());
        assert!(prompt.contains("DOCUMENT CONTEXT:\n📄 Source 1:\nA neural network"));
        assert!(prompt.contains("USER QUESTION: What is a neural network?"));
        assert!(prompt.ends_with("If the context doesn't contain enough information, say so."));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn test_placeholders_in_chunks_are_not_expanded() {
        let prompt = build_prompt(QueryType::General, "q?", &["literal {query} text".to_string()]);
        assert!(prompt.contains("literal {query} text"));
    }

    #[tokio::test]
    async fn test_generate_uses_selected_template() {
        let llm = FakeLlm::answering("## Neural network\nA layered model.");
        let generator = AnswerGenerator::new(Duration::from_secs(5));
        let analysis = analyze("How are weights learned?");

        let answer = generator.generate(&llm, &analysis.original_query, &chunks(), &analysis).await;
        assert_eq!(answer, "## Neural network\nA layered model.");

        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("explain the process or method asked about"));
        assert!(prompt.contains("USER QUESTION: How are weights learned?"));
    }

    #[tokio::test]
    async fn test_generate_failure_degrades() {
        let llm = FakeLlm::failing("quota exceeded");
        let generator = AnswerGenerator::new(Duration::from_secs(5));
        let analysis = analyze("What is a neural network?");

        let answer = generator.generate(&llm, &analysis.original_query, &chunks(), &analysis).await;
        assert!(answer.starts_with("I found relevant documents but encountered an error: "));
        assert!(answer.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_generate_timeout_degrades() {
        let llm = FakeLlm::answering("late").with_delay(Duration::from_millis(200));
        let generator = AnswerGenerator::new(Duration::from_millis(20));
        let analysis = analyze("Tell me everything");

        let err = generator
            .try_generate(&llm, &analysis.original_query, &[], &analysis)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
