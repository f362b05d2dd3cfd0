use common::GenerationConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ingestion::HeadlineRecord;
use crate::llm::{LlmError, LlmProvider};

/// Rhetorical hooks the editor rotates through so a single story still
/// yields distinct angles.
pub const TITLE_HOOKS: &[&str] = &[
    "Fear",
    "Urgency / FOMO",
    "Technical",
    "Financial Impact",
    "Quotation",
    "Future Prediction",
];

/// Titles from one generation run, trimmed and non-empty, in model order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTitleBatch {
    titles: Vec<String>,
}

impl GeneratedTitleBatch {
    pub fn from_response(raw: &str) -> Self {
        Self {
            titles: parse_titles(raw),
        }
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.iter().any(|t| t == title)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TitleError {
    #[error("no headlines selected: select at least one headline to analyze")]
    NoSelection,
    #[error("title generation failed: {0}")]
    Generation(#[from] LlmError),
}

/// One line per headline: `- {title} ({source})`, in the order given.
pub fn build_headline_context(headlines: &[HeadlineRecord]) -> String {
    headlines
        .iter()
        .map(|h| format!("- {} ({})", h.title, h.source))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking for `count` titles grounded only in `headlines`.
pub fn build_title_prompt(headlines: &[HeadlineRecord], publication: &str, count: usize) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("You are the editor of '{}'.\n", publication));
    prompt.push_str("Read these headlines from the market:\n");
    prompt.push_str(&build_headline_context(headlines));
    prompt.push_str("\n\n");
    prompt.push_str(&format!(
        "Generate {} viral article titles based STRICTLY on the headlines above.\n\n",
        count
    ));

    prompt.push_str("CRITICAL RULES:\n");
    prompt.push_str(
        "1. SOURCE ADHERENCE: use ONLY the topics, companies, assets, people and events named in the headlines above.\n",
    );
    prompt.push_str(
        "2. NO HALLUCINATIONS: do not introduce outside or generic topics that are not explicitly present in the headlines.\n",
    );
    prompt.push_str(&format!(
        "3. DEEP DIVE: if only one headline is provided, you MUST still write {} different angles on that single story, using different hooks: {}.\n",
        count,
        TITLE_HOOKS.join(", ")
    ));
    prompt.push_str("4. Every title must be catchy, punchy and click-worthy.\n");
    if headlines.len() == 1 {
        prompt.push_str(&format!(
            "\nOnly ONE headline was supplied. All {} titles are about that story; no two may share the same angle.\n",
            count
        ));
    }
    prompt.push_str(&format!(
        "\nReturn ONLY the list of {} titles, one per line, with no introduction and no closing text.\n",
        count
    ));
    prompt
}

/// Splits on line breaks, trims, drops empty lines. The count is not checked.
pub fn parse_titles(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Generate a batch of titles for the active headlines.
///
/// Fails with [`TitleError::NoSelection`] before calling the provider when
/// `headlines` is empty.
pub async fn generate_titles<P: LlmProvider + ?Sized>(
    headlines: &[HeadlineRecord],
    provider: &P,
    config: &GenerationConfig,
) -> Result<GeneratedTitleBatch, TitleError> {
    if headlines.is_empty() {
        return Err(TitleError::NoSelection);
    }

    let prompt = build_title_prompt(headlines, &config.publication, config.title_count);
    info!("Generating {} titles from {} headlines", config.title_count, headlines.len());

    let raw = provider.complete(&prompt, config.title_max_tokens).await?;
    let batch = GeneratedTitleBatch::from_response(&raw);

    if batch.len() != config.title_count {
        warn!("Requested {} titles, model returned {}", config.title_count, batch.len());
    }
    Ok(batch)
}
