use common::GenerationConfig;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::LlmProvider;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum BriefStatus {
    Success,
    Failed(String),
}

/// Outcome of one brief request. Failures carry empty content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefResult {
    pub title: String,
    /// Markdown, exactly as returned by the model
    pub content: String,
    pub status: BriefStatus,
}

impl BriefResult {
    pub fn success(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            status: BriefStatus::Success,
        }
    }

    pub fn failed(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
            status: BriefStatus::Failed(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BriefStatus::Success
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BriefError {
    #[error("no titles selected: select at least one title to generate a brief")]
    NoTitlesSelected,
}

/// Emitted once per finished brief.
#[derive(Debug, Clone, Copy)]
pub struct BriefProgress<'a> {
    /// Position of the title in the request
    pub index: usize,
    pub completed: usize,
    pub total: usize,
    pub result: &'a BriefResult,
}

impl BriefProgress<'_> {
    pub fn fraction(&self) -> f32 {
        self.completed as f32 / self.total as f32
    }
}

/// Fixed brief template; the title is the only input.
pub fn build_brief_prompt(title: &str) -> String {
    format!(
        r#"You are a Senior SEO Strategist for a top-tier news outlet.
Create a detailed SEO Content Brief for the following article title:

TOPIC: "{title}"

STRICT OUTPUT STRUCTURE (Markdown):

### Post Objective
[What the reader should learn or do. Be specific.]

### Target Audience
* **Primary:** [main reader segment]
* **Secondary:** [secondary reader segment]

### Tone & Style
* [e.g. Authoritative, Urgent, Educational, Speculative, Warning]
* *Constraint:* explain technical terms simply while keeping professional depth.

### Article Structure (H-Tags)
* **H1:** [final polished H1 title]
* **H2:** [key section 1]
* **H2:** [key section 2]
* **H2:** [key section 3]
* **H3:** [sub-points if needed]
* **Conclusion:** [key takeaway + call to action]

### Keywords Strategy
| Keyword | Intent | Search Vol (Est) | Context |
|---------|--------|------------------|---------|
| [Main Keyword] | [Info/Trans] | High | [where to use it] |
| [LSI Keyword 1] | [Info] | Med | [context] |
| [LSI Keyword 2] | [Nav] | Low | [context] |

### LLM Optimization Notes
[Instructions for the AI writer: metaphors to use, pitfalls to avoid, points to emphasize.]
"#
    )
}

/// Generates one brief. Never fails: errors become [`BriefStatus::Failed`].
pub async fn generate_brief<P: LlmProvider + ?Sized>(title: &str, provider: &P, max_tokens: usize) -> BriefResult {
    match provider.complete(&build_brief_prompt(title), max_tokens).await {
        Ok(content) if content.trim().is_empty() => {
            warn!("Brief for '{}' came back empty", title);
            BriefResult::failed(title, "empty response")
        }
        Ok(content) => BriefResult::success(title, content),
        Err(e) => {
            warn!("Brief for '{}' failed: {}", title, e);
            BriefResult::failed(title, e.to_string())
        }
    }
}

/// Generates one brief per title, in input order.
///
/// A failed title never stops the others. `on_progress` is called once per
/// finished title. With `brief_concurrency > 1` requests overlap, but results
/// and callbacks are still delivered in input order.
pub async fn generate_briefs<P, F>(
    titles: &[String],
    provider: &P,
    config: &GenerationConfig,
    mut on_progress: F,
) -> Result<Vec<BriefResult>, BriefError>
where
    P: LlmProvider + ?Sized,
    F: FnMut(BriefProgress<'_>) + Send,
{
    if titles.is_empty() {
        return Err(BriefError::NoTitlesSelected);
    }

    let total = titles.len();
    let max_tokens = config.brief_max_tokens;
    let requests: Vec<_> = titles
        .iter()
        .map(|title| generate_brief(title, provider, max_tokens))
        .collect();
    let mut pending = stream::iter(requests).buffered(config.brief_concurrency.max(1));

    let mut results = Vec::with_capacity(total);
    while let Some(result) = pending.next().await {
        on_progress(BriefProgress {
            index: results.len(),
            completed: results.len() + 1,
            total,
            result: &result,
        });
        results.push(result);
    }

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    info!("Generated {}/{} briefs successfully", succeeded, total);
    Ok(results)
}
