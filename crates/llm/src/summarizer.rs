//! Conversation-title generation via a lightweight secondary model run.

use std::sync::Arc;

use tablechat_tool_runtime::{ConversationMessage, LlmError, ModelProvider};

const TITLE_PROMPT: &str = "Generate a short title (5 words maximum) for a \
conversation that starts with the user message below. Reply with the title \
only: no quotes, no punctuation at the end, no explanation.";

/// Produces a short (≤5 words) conversation title from the first user
/// message.
#[derive(Clone)]
pub struct Summarizer {
    provider: Arc<dyn ModelProvider>,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    pub async fn title_for(&self, message: &str) -> Result<String, LlmError> {
        let raw = self
            .provider
            .complete(
                vec![ConversationMessage::User(message.to_string())],
                Some(TITLE_PROMPT.to_string()),
                0.0,
                64,
            )
            .await?;
        Ok(normalize_title(&raw))
    }
}

/// Trim, strip surrounding quote characters, collapse whitespace, cap at
/// five words. Models love to quote their own titles.
fn normalize_title(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '\u{201c}' | '\u{201d}' | '\u{2018}' | '\u{2019}'))
        .trim();
    trimmed
        .split_whitespace()
        .take(5)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablechat_tool_runtime::provider::mock::MockModelProvider;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("\"Sales Overview\"\n"), "Sales Overview");
        assert_eq!(normalize_title("  one   two  "), "one two");
        assert_eq!(
            normalize_title("one two three four five six seven"),
            "one two three four five"
        );
        assert_eq!(normalize_title("\u{201c}Quoted Title\u{201d}"), "Quoted Title");
    }

    #[tokio::test]
    async fn test_title_for() {
        let provider = Arc::new(MockModelProvider::new());
        provider.queue_text("\"Monthly Sales Trends Report\"");

        let summarizer = Summarizer::new(provider);
        let title = summarizer.title_for("show me sales by month").await.unwrap();
        assert_eq!(title, "Monthly Sales Trends Report");
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = Arc::new(MockModelProvider::new());
        provider.queue_failure(LlmError::AuthError);

        let summarizer = Summarizer::new(provider);
        assert!(summarizer.title_for("hello").await.is_err());
    }
}
