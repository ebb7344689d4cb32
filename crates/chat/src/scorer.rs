//! Relevance scoring — the precision stage of knowledge retrieval.
//!
//! Asks the completion provider to rate one candidate passage against one
//! query and parses the answer as a number in `[0.0, 1.0]`.
//!
//! Fail-closed: a completion that does not parse as a number scores
//! `0.0`, silently, so unparseable judgments never reach the results.

use std::sync::Arc;
use std::time::Duration;

use mnemo_core::error::ProviderError;
use mnemo_core::provider::CompletionProvider;
use tracing::trace;

/// Per-call deadline for scoring requests.
///
/// Scoring calls are not bound by the main completion deadline, so
/// retrieval over many candidates can be slow on a slow provider. This
/// cap only stops a dead provider from hanging a turn forever.
pub const SCORING_DEADLINE: Duration = Duration::from_secs(120);

/// Scores a candidate passage against a query via the completion provider.
pub struct RelevanceScorer {
    provider: Arc<dyn CompletionProvider>,
}

impl RelevanceScorer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Rate how relevant `passage` is to `query`, in `[0.0, 1.0]`.
    ///
    /// Provider failures propagate; an unparseable judgment does not.
    pub async fn score(&self, query: &str, passage: &str) -> Result<f64, ProviderError> {
        let prompt = format!(
            "Query: {query}\n\n\
             Potential relevant information: {passage}\n\n\
             Rate the relevance of this information to the query on a scale of 0.0 to 1.0.\n\
             Respond with only the number."
        );

        let completion = self.provider.complete(&prompt, SCORING_DEADLINE).await?;
        let score = parse_score(&completion);
        trace!(score, "Scored knowledge candidate");
        Ok(score)
    }
}

/// Parse a model judgment as a score. Non-numeric output is `0.0`;
/// out-of-range values are clamped into `[0.0, 1.0]`.
fn parse_score(completion: &str) -> f64 {
    match completion.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}
