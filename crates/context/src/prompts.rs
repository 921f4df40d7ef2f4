//! Prompt templates for the three query modes

/// Exact reply the chat model gives when the context has no answer
pub const REFUSAL: &str = "I cannot answer this based on the provided documents.";

/// Stands in for the context of a deep research query with no usable chunks
pub const NO_CONTEXT_PLACEHOLDER: &str = "No specific documents found in the database. Please answer based on general research principles or theoretical knowledge, but clearly state that no specific project documents were cited.";

const NO_DESCRIPTION: &str = "No description provided.";

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "greetings", "thanks", "thank", "cheers", "good", "morning",
    "evening", "afternoon", "ok", "okay", "bye",
];

/// Shape of reply a deep research query calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCharacter {
    /// Greetings and very short clarifications
    Conversational,
    /// Anything that deserves a structured report
    Substantive,
}

impl QueryCharacter {
    /// Greeting-led queries of up to six words, and queries of one or two
    /// words, are conversational.
    pub fn classify(query: &str) -> Self {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        let greeting_led = words
            .first()
            .is_some_and(|w| GREETINGS.contains(&w.as_str()));

        if words.len() <= 2 || (greeting_led && words.len() <= 6) {
            Self::Conversational
        } else {
            Self::Substantive
        }
    }
}

/// Grounded question answering with inline source markers
pub fn chat_prompt(query: &str, context: &str, history: &str) -> String {
    format!(
        "You are a precise academic assistant. Answer the question based ONLY on the following context.\n\
         Do not use outside knowledge.\n\
         If the answer is not found in the context, reply exactly: \"{REFUSAL}\"\n\n\
         Chat History:\n{history}\n\
         Context:\n{context}\n\n\
         Question:\n{query}\n\n\
         Instructions:\n\
         1. Answer based ONLY on the provided context.\n\
         2. Cite your sources for every claim using the format [Source: filename, Page: number].\n   \
            Example: \"The model uses attention [Source: paper.pdf, Page: 3].\"\n\
         3. If the exact page is not clear, cite the document name alone as [Source: filename].\n\
         4. Keep the answer concise and academic.\n"
    )
}

/// Gap analysis over probe context, demanding a bare JSON object
pub fn analysis_prompt(context: &str) -> String {
    format!(
        "You are a principal investigator in AI research.\n\
         Synthesize the provided research context (excerpts from multiple papers) to identify critical gaps.\n\n\
         Step 1: Identify the common thread. What approaches do most papers here take?\n\
         Step 2: Detect missing links. Do they all evaluate on the same dataset? Do they ignore efficiency? Are metrics missing?\n\
         Step 3: Highlight unexplored scenarios. Which edge cases or domains are ignored?\n\n\
         Context:\n{context}\n\n\
         Instructions:\n\
         - Base your analysis ONLY on the provided context.\n\
         - Cite specific papers (e.g. [Paper: X]) where relevant.\n\
         - Return a single JSON object with exactly these keys:\n  \
           \"common_approaches\" (list of strings),\n  \
           \"missing_evaluations\" (list of strings),\n  \
           \"unexplored_scenarios\" (list of strings),\n  \
           \"research_gaps\" (list of strings),\n  \
           \"methodology_suggestions\" (list of objects, each with \"action\", \"reasoning\" and \"citations\" (list of strings)).\n\
         - Do not wrap the JSON in markdown code fences.\n"
    )
}

/// Inputs of a deep research prompt
#[derive(Debug, Clone)]
pub struct ResearchPrompt<'a> {
    pub query: &'a str,
    /// Rendered context, or [`NO_CONTEXT_PLACEHOLDER`]
    pub context: &'a str,
    pub history: &'a str,
    pub project_title: &'a str,
    pub project_description: Option<&'a str>,
    pub character: QueryCharacter,
}

impl ResearchPrompt<'_> {
    pub fn render(&self) -> String {
        let description = self
            .project_description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(NO_DESCRIPTION);

        let shape = match self.character {
            QueryCharacter::Conversational => {
                "The user is greeting you or asking a short clarification.\n\
                 - Do NOT write a report.\n\
                 - Reply conversationally, as a helpful research mentor, in a few sentences.\n\
                 - Ask which aspect of the project they want to work on.\n"
            }
            QueryCharacter::Substantive => {
                "The user is asking a research question. Write a structured report:\n\
                 # <Title>\n\
                 ## Summary\n\
                 ## Findings from the Project Papers\n\
                 ## Gaps and Open Problems\n\
                 ## Suggested Next Steps\n\
                 - Use Markdown headings and lists.\n\
                 - Cite sources inline as [Paper: filename].\n\
                 - If the context holds no project documents, say so and do not invent citations.\n"
            }
        };

        format!(
            "You are an expert AI project researcher assisting students with their project: \"{title}\".\n\
             Project Description: \"{description}\"\n\n\
             Your goal is to help them understand their project, identify gaps, and provide actionable suggestions.\n\n\
             Chat History (previous research turns):\n{history}\n\
             Current Problem Statement:\n{query}\n\n\
             Context (excerpts from available papers):\n{context}\n\n\
             If this is a follow-up question, keep strict continuity with the chat history.\n\n\
             {shape}\n\
             Be encouraging and educational, and match the length of your reply to the question.\n",
            title = self.project_title,
            history = self.history,
            query = self.query,
            context = self.context,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_greetings() {
        assert_eq!(QueryCharacter::classify("Hi"), QueryCharacter::Conversational);
        assert_eq!(QueryCharacter::classify("hello there!"), QueryCharacter::Conversational);
        assert_eq!(
            QueryCharacter::classify("Thanks, that helps a lot"),
            QueryCharacter::Conversational
        );
        assert_eq!(QueryCharacter::classify("   "), QueryCharacter::Conversational);
    }

    #[test]
    fn test_classify_research_questions() {
        assert_eq!(
            QueryCharacter::classify("How do existing papers evaluate robustness to distribution shift?"),
            QueryCharacter::Substantive
        );
        assert_eq!(
            QueryCharacter::classify("hello, can you compare the evaluation protocols used across these papers?"),
            QueryCharacter::Substantive
        );
    }

    #[test]
    fn test_chat_prompt_contents() {
        let prompt = chat_prompt("What is attention?", "[Document: a.pdf | Page: 1]\nx", "User: hi\n\n");
        assert!(prompt.contains(REFUSAL));
        assert!(prompt.contains("[Source: filename, Page: number]"));
        assert!(prompt.contains("What is attention?"));
        assert!(prompt.contains("User: hi"));
    }

    #[test]
    fn test_research_prompt_defaults_description() {
        let prompt = ResearchPrompt {
            query: "gaps?",
            context: NO_CONTEXT_PLACEHOLDER,
            history: "",
            project_title: "Robust Vision",
            project_description: None,
            character: QueryCharacter::Substantive,
        }
        .render();

        assert!(prompt.contains("\"Robust Vision\""));
        assert!(prompt.contains(NO_DESCRIPTION));
        assert!(prompt.contains(NO_CONTEXT_PLACEHOLDER));
        assert!(prompt.contains("[Paper: filename]"));
    }

    #[test]
    fn test_research_prompt_conversational_shape() {
        let prompt = ResearchPrompt {
            query: "hi",
            context: "",
            history: "",
            project_title: "T",
            project_description: Some("About T"),
            character: QueryCharacter::Conversational,
        }
        .render();

        assert!(prompt.contains("Do NOT write a report"));
        assert!(!prompt.contains("## Summary"));
        assert!(prompt.contains("About T"));
    }
}
