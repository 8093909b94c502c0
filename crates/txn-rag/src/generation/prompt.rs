//! Prompt template for transaction questions

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the full prompt from the assembled context and the question
    pub fn build_prompt(context: &str, question: &str) -> String {
        format!(
            "You are analyzing mall transactions. Use the following data to answer:\n\
             {context}\n\
             \n\
             Question: {question}\n\
             Answer:",
            context = context,
            question = question
        )
    }
}
