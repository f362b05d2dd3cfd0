use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::http::{ContentType, Header, Status};
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Responder, Rocket, State};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use common::Config;

use crate::briefs::{self, BriefError, BriefResult};
use crate::ingestion::{FeedAggregator, HeadlineRecord, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::llm::LlmProvider;
use crate::newsroom::{BriefRun, Newsroom, NewsroomError};
use crate::titles::{self, TitleError};

/// Application state stored inside Rocket managed state.
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub aggregator: FeedAggregator,
    pub llm_provider: Option<Arc<dyn LlmProvider>>,
    pub newsroom: Mutex<Newsroom>,
}

impl AppState {
    pub fn new(config: Arc<Config>, llm_provider: Option<Arc<dyn LlmProvider>>) -> Result<Self> {
        let timeout = config
            .feeds
            .fetch_timeout_seconds
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        Ok(Self {
            started_at: Utc::now(),
            aggregator: FeedAggregator::new(timeout)?,
            config,
            llm_provider,
            newsroom: Mutex::new(Newsroom::new()),
        })
    }

    fn provider(&self) -> Result<Arc<dyn LlmProvider>, ApiError> {
        self.llm_provider.clone().ok_or_else(|| {
            api_error(
                Status::ServiceUnavailable,
                "llm_unavailable",
                "no generation client is configured".to_string(),
            )
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

type ApiError = (Status, Json<ErrorBody>);

fn api_error(status: Status, error: &'static str, message: String) -> ApiError {
    (status, Json(ErrorBody { error, message }))
}

impl From<NewsroomError> for (Status, Json<ErrorBody>) {
    fn from(err: NewsroomError) -> Self {
        let message = err.to_string();
        match err {
            NewsroomError::Titles(TitleError::NoSelection) => {
                api_error(Status::BadRequest, "no_selection", message)
            }
            NewsroomError::Briefs(BriefError::NoTitlesSelected) => {
                api_error(Status::BadRequest, "no_titles_selected", message)
            }
            NewsroomError::Titles(TitleError::Generation(ref cause)) => {
                warn!("title generation failed ({}): {}", cause.cause(), cause);
                api_error(Status::BadGateway, "generation_failed", message)
            }
            NewsroomError::UnknownTitle(_) => api_error(Status::BadRequest, "unknown_title", message),
            NewsroomError::BriefNotReady(_) => api_error(Status::Conflict, "brief_not_ready", message),
            NewsroomError::UnknownHeadline(_) | NewsroomError::UnknownBrief(_) => {
                api_error(Status::NotFound, "not_found", message)
            }
        }
    }
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    feeds: usize,
    headlines: usize,
    active_headlines: usize,
    titles: usize,
    briefs: usize,
    llm_configured: bool,
}

/// A headline row as shown in the selectable table.
#[derive(Serialize)]
struct HeadlineRow {
    index: usize,
    active: bool,
    #[serde(flatten)]
    record: HeadlineRecord,
}

#[derive(Serialize)]
struct HeadlinesResponse {
    default_selection: bool,
    headlines: Vec<HeadlineRow>,
}

#[derive(Deserialize)]
struct RefreshRequest {
    /// Overrides the configured feed list for this fetch
    urls: Option<Vec<String>>,
    limit_per_feed: Option<usize>,
}

#[derive(Deserialize)]
struct BulkRequest {
    active: bool,
}

#[derive(Deserialize)]
struct ToggleRequest {
    index: usize,
    active: bool,
}

#[derive(Serialize)]
struct TitlesResponse {
    titles: Vec<String>,
}

#[derive(Deserialize)]
struct BriefsRequest {
    titles: Vec<String>,
}

/// Completed/total of the latest brief run.
#[derive(Serialize)]
struct RunProgress {
    completed: usize,
    total: usize,
    running: bool,
}

impl From<BriefRun> for RunProgress {
    fn from(run: BriefRun) -> Self {
        Self {
            completed: run.completed,
            total: run.total,
            running: run.is_running(),
        }
    }
}

#[derive(Serialize)]
struct BriefsResponse {
    succeeded: usize,
    failed: usize,
    progress: Option<RunProgress>,
    briefs: Vec<BriefResult>,
}

impl BriefsResponse {
    fn new(briefs: Vec<BriefResult>, run: Option<BriefRun>) -> Self {
        let succeeded = briefs.iter().filter(|b| b.is_success()).count();
        Self {
            succeeded,
            failed: briefs.len() - succeeded,
            progress: run.map(RunProgress::from),
            briefs,
        }
    }
}

#[derive(Responder)]
struct MarkdownAttachment {
    body: (ContentType, String),
    disposition: Header<'static>,
}

fn headlines_response(newsroom: &Newsroom) -> HeadlinesResponse {
    let selection = newsroom.selection();
    HeadlinesResponse {
        default_selection: selection.default_state(),
        headlines: newsroom
            .headlines()
            .iter()
            .enumerate()
            .map(|(index, record)| HeadlineRow {
                index,
                active: selection.is_active(record),
                record: record.clone(),
            })
            .collect(),
    }
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint returning simple JSON with uptime and session counts.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let newsroom = state.newsroom.lock().await;

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        feeds: state.config.feed_urls().len(),
        headlines: newsroom.headlines().len(),
        active_headlines: newsroom.selection().active_count(),
        titles: newsroom.titles().map(|t| t.len()).unwrap_or(0),
        briefs: newsroom.briefs().len(),
        llm_configured: state.llm_provider.is_some(),
    })
}

#[post("/api/v1/feeds/refresh", data = "<body>")]
async fn refresh_feeds(state: &State<AppState>, body: Json<RefreshRequest>) -> Json<HeadlinesResponse> {
    let body = body.into_inner();
    let urls = body.urls.unwrap_or_else(|| state.config.feed_urls());
    let limit = body.limit_per_feed.unwrap_or(state.config.feeds.limit_per_feed);

    let headlines = state.aggregator.fetch(&urls, limit).await;
    info!("feeds refreshed: {} headlines from {} feeds", headlines.len(), urls.len());

    let mut newsroom = state.newsroom.lock().await;
    newsroom.replace_headlines(headlines);
    Json(headlines_response(&newsroom))
}

#[get("/api/v1/headlines")]
async fn list_headlines(state: &State<AppState>) -> Json<HeadlinesResponse> {
    let newsroom = state.newsroom.lock().await;
    Json(headlines_response(&newsroom))
}

#[post("/api/v1/selection/bulk", data = "<body>")]
async fn bulk_select(state: &State<AppState>, body: Json<BulkRequest>) -> Json<HeadlinesResponse> {
    let mut newsroom = state.newsroom.lock().await;
    if body.active {
        newsroom.select_all();
    } else {
        newsroom.select_none();
    }
    Json(headlines_response(&newsroom))
}

#[post("/api/v1/selection/toggle", data = "<body>")]
async fn toggle_select(
    state: &State<AppState>,
    body: Json<ToggleRequest>,
) -> Result<Json<HeadlinesResponse>, ApiError> {
    let mut newsroom = state.newsroom.lock().await;
    newsroom.set_active(body.index, body.active)?;
    Ok(Json(headlines_response(&newsroom)))
}

#[post("/api/v1/titles")]
async fn generate_titles(state: &State<AppState>) -> Result<Json<TitlesResponse>, ApiError> {
    let active = state.newsroom.lock().await.active_headlines();
    if active.is_empty() {
        return Err(NewsroomError::Titles(TitleError::NoSelection).into());
    }
    let provider = state.provider()?;

    // The session stays unlocked while the model answers
    let batch = titles::generate_titles(&active, provider.as_ref(), &state.config.generation)
        .await
        .map_err(NewsroomError::from)?;

    let mut newsroom = state.newsroom.lock().await;
    let batch = newsroom.replace_titles(batch);
    Ok(Json(TitlesResponse {
        titles: batch.titles().to_vec(),
    }))
}

#[get("/api/v1/titles")]
async fn list_titles(state: &State<AppState>) -> Json<TitlesResponse> {
    let newsroom = state.newsroom.lock().await;
    Json(TitlesResponse {
        titles: newsroom.titles().map(|b| b.titles().to_vec()).unwrap_or_default(),
    })
}

/// Runs the requested briefs without holding the session lock; each finished
/// brief is recorded in the session as it arrives.
#[post("/api/v1/briefs", data = "<body>")]
async fn generate_briefs(
    state: &State<AppState>,
    body: Json<BriefsRequest>,
) -> Result<Json<BriefsResponse>, ApiError> {
    let requested = body.into_inner().titles;
    if requested.is_empty() {
        return Err(NewsroomError::Briefs(BriefError::NoTitlesSelected).into());
    }
    let provider = state.provider()?;
    state.newsroom.lock().await.begin_brief_run(&requested)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<BriefResult>();
    let generation = briefs::generate_briefs(&requested, provider.as_ref(), &state.config.generation, move |progress| {
        info!(
            "brief {}/{} ({:.0}%) '{}': {}",
            progress.completed,
            progress.total,
            progress.fraction() * 100.0,
            progress.result.title,
            if progress.result.is_success() { "ready" } else { "failed" }
        );
        // The receiver only goes away if the request is dropped
        let _ = tx.send(progress.result.clone());
    });
    let recording = async {
        while let Some(result) = rx.recv().await {
            state.newsroom.lock().await.record_brief(result);
        }
    };

    let (results, ()) = tokio::join!(generation, recording);
    let results = results.map_err(NewsroomError::from)?;
    let run = state.newsroom.lock().await.brief_run();
    Ok(Json(BriefsResponse::new(results, run)))
}

#[get("/api/v1/briefs")]
async fn list_briefs(state: &State<AppState>) -> Json<BriefsResponse> {
    let newsroom = state.newsroom.lock().await;
    Json(BriefsResponse::new(newsroom.briefs().to_vec(), newsroom.brief_run()))
}

#[get("/api/v1/briefs/<index>/download")]
async fn download_brief(state: &State<AppState>, index: usize) -> Result<MarkdownAttachment, ApiError> {
    let newsroom = state.newsroom.lock().await;
    let download = newsroom.brief_download(index)?;
    Ok(MarkdownAttachment {
        body: (ContentType::new("text", "markdown"), download.body),
        disposition: Header::new(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", download.file_name),
        ),
    })
}

/// Drop headlines, selection, titles and briefs.
#[post("/api/v1/session/reset")]
async fn reset_session(state: &State<AppState>) -> Json<HeadlinesResponse> {
    let mut newsroom = state.newsroom.lock().await;
    newsroom.reset();
    info!("session reset");
    Json(headlines_response(&newsroom))
}

/// Build the Rocket instance with managed state and routes mounted.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let mut fig = rocket::Config::figment();
    if let Some(server) = &state.config.server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    rocket::custom(fig).manage(state).mount(
        "/",
        routes![
            health,
            status,
            refresh_feeds,
            list_headlines,
            bulk_select,
            toggle_select,
            generate_titles,
            list_titles,
            generate_briefs,
            list_briefs,
            download_brief,
            reset_session,
        ],
    )
}

pub async fn launch_rocket(state: AppState) -> Result<()> {
    // Launch Rocket - this will run until shutdown (SIGINT/SIGTERM etc.)
    info!("Starting Rocket HTTP server");
    build_rocket(state)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    info!("Rocket HTTP server has shut down");
    Ok(())
}
