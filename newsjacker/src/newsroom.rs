use common::GenerationConfig;
use serde::Serialize;
use tracing::info;

use crate::briefs::{self, BriefError, BriefProgress, BriefResult};
use crate::export::MarkdownDownload;
use crate::ingestion::{FeedAggregator, HeadlineRecord};
use crate::llm::LlmProvider;
use crate::selection::SelectionSet;
use crate::titles::{self, GeneratedTitleBatch, TitleError};

#[derive(Debug, thiserror::Error)]
pub enum NewsroomError {
    #[error(transparent)]
    Titles(#[from] TitleError),
    #[error(transparent)]
    Briefs(#[from] BriefError),
    #[error("no headline at position {0}")]
    UnknownHeadline(usize),
    #[error("title is not part of the current batch: {0}")]
    UnknownTitle(String),
    #[error("no brief at position {0}")]
    UnknownBrief(usize),
    #[error("brief for '{0}' failed and has nothing to download")]
    BriefNotReady(String),
}

/// Progress of the most recent brief run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BriefRun {
    pub total: usize,
    pub completed: usize,
}

impl BriefRun {
    pub fn is_running(&self) -> bool {
        self.completed < self.total
    }
}

/// One operator's working state: headlines, selection, the live title batch
/// and the briefs produced so far. Owned by the caller; nothing global.
#[derive(Debug, Default)]
pub struct Newsroom {
    headlines: Vec<HeadlineRecord>,
    selection: SelectionSet,
    titles: Option<GeneratedTitleBatch>,
    briefs: Vec<BriefResult>,
    brief_run: Option<BriefRun>,
}

impl Newsroom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-fetch all feeds. Headlines and selection are rebuilt from scratch.
    pub async fn refresh<S: AsRef<str>>(
        &mut self,
        aggregator: &FeedAggregator,
        urls: &[S],
        limit_per_feed: usize,
    ) -> usize {
        let headlines = aggregator.fetch(urls, limit_per_feed).await;
        self.replace_headlines(headlines);
        self.headlines.len()
    }

    /// New headlines start at the current bulk default.
    pub fn replace_headlines(&mut self, headlines: Vec<HeadlineRecord>) {
        self.selection = SelectionSet::new(self.selection.default_state(), &headlines);
        self.headlines = headlines;
    }

    pub fn headlines(&self) -> &[HeadlineRecord] {
        &self.headlines
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn select_all(&mut self) {
        self.apply_bulk(true);
    }

    pub fn select_none(&mut self) {
        self.apply_bulk(false);
    }

    pub fn apply_bulk(&mut self, active: bool) {
        self.selection = std::mem::take(&mut self.selection).apply_bulk(active, &self.headlines);
    }

    pub fn set_active(&mut self, index: usize, active: bool) -> Result<(), NewsroomError> {
        let record = self
            .headlines
            .get(index)
            .ok_or(NewsroomError::UnknownHeadline(index))?;
        self.selection = std::mem::take(&mut self.selection).toggle(record, active);
        Ok(())
    }

    pub fn active_headlines(&self) -> Vec<HeadlineRecord> {
        self.selection.active_subset(&self.headlines)
    }

    /// Generate titles from the active headlines. The previous batch is only
    /// replaced when generation succeeds.
    pub async fn generate_titles<P: LlmProvider + ?Sized>(
        &mut self,
        provider: &P,
        config: &GenerationConfig,
    ) -> Result<&GeneratedTitleBatch, NewsroomError> {
        let active = self.active_headlines();
        let batch = titles::generate_titles(&active, provider, config).await?;
        Ok(self.replace_titles(batch))
    }

    pub fn replace_titles(&mut self, batch: GeneratedTitleBatch) -> &GeneratedTitleBatch {
        info!("Title batch replaced: {} titles", batch.len());
        self.titles.insert(batch)
    }

    pub fn titles(&self) -> Option<&GeneratedTitleBatch> {
        self.titles.as_ref()
    }

    /// Generate briefs for titles picked from the current batch.
    ///
    /// Each result is written into the session as soon as it completes:
    /// existing briefs for the same title are replaced in place, new ones are
    /// appended. Returns the results of this run only.
    pub async fn generate_briefs<P, F>(
        &mut self,
        requested: &[String],
        provider: &P,
        config: &GenerationConfig,
        mut on_progress: F,
    ) -> Result<Vec<BriefResult>, NewsroomError>
    where
        P: LlmProvider + ?Sized,
        F: FnMut(BriefProgress<'_>) + Send,
    {
        self.begin_brief_run(requested)?;
        let results = briefs::generate_briefs(requested, provider, config, |progress| {
            self.record_brief(progress.result.clone());
            on_progress(progress);
        })
        .await?;
        Ok(results)
    }

    /// Check that every requested title belongs to the live batch and start
    /// tracking a new run.
    pub fn begin_brief_run(&mut self, requested: &[String]) -> Result<BriefRun, NewsroomError> {
        if requested.is_empty() {
            return Err(BriefError::NoTitlesSelected.into());
        }
        if let Some(unknown) = requested
            .iter()
            .find(|t| !self.titles.as_ref().is_some_and(|batch| batch.contains(t)))
        {
            return Err(NewsroomError::UnknownTitle(unknown.clone()));
        }

        let run = BriefRun {
            total: requested.len(),
            completed: 0,
        };
        self.brief_run = Some(run);
        Ok(run)
    }

    /// Store one finished brief and advance the current run.
    pub fn record_brief(&mut self, result: BriefResult) {
        if let Some(run) = self.brief_run.as_mut() {
            run.completed = (run.completed + 1).min(run.total);
        }
        match self.briefs.iter_mut().find(|b| b.title == result.title) {
            Some(existing) => *existing = result,
            None => self.briefs.push(result),
        }
    }

    pub fn brief_run(&self) -> Option<BriefRun> {
        self.brief_run
    }

    pub fn briefs(&self) -> &[BriefResult] {
        &self.briefs
    }

    pub fn brief_download(&self, index: usize) -> Result<MarkdownDownload, NewsroomError> {
        let brief = self.briefs.get(index).ok_or(NewsroomError::UnknownBrief(index))?;
        if !brief.is_success() {
            return Err(NewsroomError::BriefNotReady(brief.title.clone()));
        }
        Ok(MarkdownDownload::for_brief(index, brief))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
