pub const NOT_AVAILABLE: &str = "The information is not available in the provided context.";

/// Grounded-answer prompt for the generative fallback.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an assistant that answers questions from retrieved document context.

INSTRUCTIONS:
- Rely ONLY on the information in the context.
- Do NOT draw on outside knowledge.
- Do NOT copy sentences word for word from the context.
- When the same information appears in several chunks, merge it into one coherent answer.
- When the context does not contain the answer, reply: \"{NOT_AVAILABLE}\"

ANSWER STYLE:
- Concise but complete.
- Full sentences.
- For a list question, give a clean comma-separated list.
- For an explanation question, write a short structured paragraph.
- Never mention section names, chunk numbers or document metadata.

CONTEXT:
{context}

QUESTION:
{question}

ANSWER:
"
    )
}
