use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use common::GenerationConfig;
use newsjacker::briefs::{generate_briefs, BriefError, BriefStatus};
use newsjacker::ingestion::HeadlineRecord;
use newsjacker::llm::{LlmError, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};
use newsjacker::newsroom::{Newsroom, NewsroomError};
use newsjacker::titles::{generate_titles, TitleError};

type Script = Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>;

/// Provider stub that answers from a script and records every prompt.
struct ScriptedProvider {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    script: Script,
}

impl ScriptedProvider {
    fn new(script: impl Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            script: Box::new(script),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let content = (self.script)(&request.prompt)?;
        Ok(LlmResponse {
            content,
            usage: UsageMetadata::default(),
            model: "stub".to_string(),
        })
    }
}

fn headline(source: &str, title: &str) -> HeadlineRecord {
    HeadlineRecord {
        source: source.to_string(),
        title: title.to_string(),
        published: "unknown".to_string(),
        link: "https://www.coindesk.com/x".to_string(),
    }
}

fn server_error() -> LlmError {
    LlmError::Api {
        status: 500,
        body: "upstream exploded".to_string(),
    }
}

const SINGLE_STORY_TITLES: &str = "
  X exchange halts withdrawals: is your money trapped?
why X exchange froze withdrawals overnight and what it means for CoinDesk readers

the technical fault behind the X exchange withdrawal halt
X exchange halts withdrawals: the hidden cost for every holder
\"we halted withdrawals\": inside the X exchange statement
X exchange halts withdrawals today, move before the queue grows
what happens next after X exchange halts withdrawals
X exchange withdrawal halt: three numbers that matter
CoinDesk on X exchange: how long can withdrawals stay halted?
will X exchange reopen withdrawals this week?
";

#[tokio::test]
async fn test_empty_selection_never_calls_client() {
    let provider = ScriptedProvider::new(|_| Ok("should not happen".to_string()));

    let result = generate_titles(&[], &provider, &GenerationConfig::default()).await;

    assert!(matches!(result, Err(TitleError::NoSelection)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_single_headline_yields_full_distinct_batch() {
    let provider = ScriptedProvider::new(|_| Ok(SINGLE_STORY_TITLES.to_string()));
    let input = headline("CoinDesk", "X exchange halts withdrawals");

    let batch = generate_titles(std::slice::from_ref(&input), &provider, &GenerationConfig::default())
        .await
        .expect("titles");

    assert_eq!(batch.len(), 10);
    let distinct: HashSet<&String> = batch.titles().iter().collect();
    assert_eq!(distinct.len(), 10);
    assert!(batch.titles().iter().all(|t| !t.is_empty() && t.trim() == t));

    // Only entities from the headline and its source appear in the titles
    let allowed = ["X", "CoinDesk"];
    for title in batch.titles() {
        assert!(title.contains("X exchange"), "ungrounded title: {}", title);
        for word in title.split(|c: char| !c.is_alphanumeric()) {
            if word.chars().next().is_some_and(char::is_uppercase) {
                assert!(allowed.contains(&word), "unexpected entity '{}' in: {}", word, title);
            }
        }
    }

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("- X exchange halts withdrawals (CoinDesk)"));
    assert!(prompts[0].contains("Only ONE headline was supplied"));
}

#[tokio::test]
async fn test_title_count_is_not_enforced() {
    let provider = ScriptedProvider::new(|_| Ok("one\ntwo\nthree".to_string()));
    let headlines = vec![headline("CoinDesk", "A"), headline("Decrypt", "B")];

    let batch = generate_titles(&headlines, &provider, &GenerationConfig::default())
        .await
        .expect("titles");
    assert_eq!(batch.titles(), ["one", "two", "three"]);
}

#[tokio::test]
async fn test_generation_error_propagates() {
    let provider = ScriptedProvider::new(|_| {
        Err(LlmError::RateLimited {
            status: 429,
            body: "quota".to_string(),
        })
    });

    let result = generate_titles(&[headline("CoinDesk", "A")], &provider, &GenerationConfig::default()).await;

    match result {
        Err(TitleError::Generation(cause)) => assert_eq!(cause.cause(), "quota"),
        other => panic!("expected generation error, got {:?}", other),
    }
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_failed_regeneration_keeps_previous_batch() {
    let fail = AtomicUsize::new(0);
    let provider = ScriptedProvider::new(move |_| {
        if fail.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok("first\nsecond".to_string())
        } else {
            Err(server_error())
        }
    });

    let mut newsroom = Newsroom::new();
    newsroom.replace_headlines(vec![headline("CoinDesk", "A")]);
    newsroom.select_all();

    let config = GenerationConfig::default();
    newsroom.generate_titles(&provider, &config).await.expect("first batch");
    let err = newsroom.generate_titles(&provider, &config).await.expect_err("second fails");

    assert!(matches!(err, NewsroomError::Titles(TitleError::Generation(_))));
    let batch = newsroom.titles().expect("batch kept");
    assert_eq!(batch.titles(), ["first", "second"]);
}

#[tokio::test]
async fn test_briefs_isolate_failures_and_report_progress() {
    let provider = ScriptedProvider::new(|prompt| {
        if prompt.contains("TOPIC: \"B\"") {
            Err(server_error())
        } else {
            Ok("### Post Objective\nExplain it.".to_string())
        }
    });
    let titles: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();

    let mut seen = Vec::new();
    let results = generate_briefs(&titles, &provider, &GenerationConfig::default(), |progress| {
        seen.push((progress.index, progress.completed, progress.total, progress.result.title.clone()));
    })
    .await
    .expect("briefs");

    assert_eq!(results.len(), 3);
    assert_eq!(
        results.iter().map(|r| r.title.as_str()).collect::<Vec<_>>(),
        vec!["A", "B", "C"]
    );
    assert_eq!(results[0].status, BriefStatus::Success);
    assert!(matches!(results[1].status, BriefStatus::Failed(ref reason) if reason.contains("500")));
    assert!(results[1].content.is_empty());
    assert_eq!(results[2].status, BriefStatus::Success);
    assert_eq!(results[2].content, "### Post Objective\nExplain it.");

    assert_eq!(
        seen,
        vec![
            (0, 1, 3, "A".to_string()),
            (1, 2, 3, "B".to_string()),
            (2, 3, 3, "C".to_string()),
        ]
    );
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_empty_brief_content_is_a_failure() {
    let provider = ScriptedProvider::new(|_| Ok("  \n ".to_string()));
    let results = generate_briefs(&["A".to_string()], &provider, &GenerationConfig::default(), |_| {})
        .await
        .expect("briefs");

    assert_eq!(results[0].status, BriefStatus::Failed("empty response".to_string()));
}

#[tokio::test]
async fn test_no_titles_selected_never_calls_client() {
    let provider = ScriptedProvider::new(|_| Ok("brief".to_string()));
    let mut progress_calls = 0;

    let result = generate_briefs(&[], &provider, &GenerationConfig::default(), |_| progress_calls += 1).await;

    assert!(matches!(result, Err(BriefError::NoTitlesSelected)));
    assert_eq!(provider.calls(), 0);
    assert_eq!(progress_calls, 0);
}

/// Provider whose answers arrive in reverse order of request.
struct SlowFirstProvider;

#[async_trait::async_trait]
impl LlmProvider for SlowFirstProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let delay = if request.prompt.contains("TOPIC: \"A\"") { 150 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if request.prompt.contains("TOPIC: \"B\"") {
            return Err(server_error());
        }
        Ok(LlmResponse {
            content: "brief".to_string(),
            usage: UsageMetadata::default(),
            model: "stub".to_string(),
        })
    }
}

#[tokio::test]
async fn test_concurrent_briefs_keep_input_order() {
    let config = GenerationConfig {
        brief_concurrency: 3,
        ..GenerationConfig::default()
    };
    let titles: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();

    let mut callbacks = 0;
    let results = generate_briefs(&titles, &SlowFirstProvider, &config, |_| callbacks += 1)
        .await
        .expect("briefs");

    assert_eq!(callbacks, 3);
    assert_eq!(
        results.iter().map(|r| (r.title.as_str(), r.is_success())).collect::<Vec<_>>(),
        vec![("A", true), ("B", false), ("C", true)]
    );
}

#[tokio::test]
async fn test_newsroom_briefs_require_titles_from_batch() {
    let provider = ScriptedProvider::new(|prompt| {
        if prompt.contains("TOPIC:") {
            Ok(format!("brief #{}", prompt.len()))
        } else {
            Ok("A\nB".to_string())
        }
    });
    let config = GenerationConfig::default();

    let mut newsroom = Newsroom::new();
    newsroom.replace_headlines(vec![headline("CoinDesk", "story")]);
    newsroom.set_active(0, true).expect("toggle");

    let err = newsroom
        .generate_briefs(&["A".to_string()], &provider, &config, |_| {})
        .await
        .expect_err("no batch yet");
    assert!(matches!(err, NewsroomError::UnknownTitle(_)));

    newsroom.generate_titles(&provider, &config).await.expect("titles");
    let calls_before = provider.calls();

    let err = newsroom
        .generate_briefs(&["A".to_string(), "Z".to_string()], &provider, &config, |_| {})
        .await
        .expect_err("Z is not in the batch");
    assert!(matches!(err, NewsroomError::UnknownTitle(ref t) if t == "Z"));
    assert_eq!(provider.calls(), calls_before);

    newsroom
        .generate_briefs(&["A".to_string(), "B".to_string()], &provider, &config, |_| {})
        .await
        .expect("briefs");
    newsroom
        .generate_briefs(&["B".to_string()], &provider, &config, |_| {})
        .await
        .expect("regenerate B");

    // B was replaced in place, not duplicated
    let titles: Vec<&str> = newsroom.briefs().iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B"]);

    let download = newsroom.brief_download(1).expect("download");
    assert_eq!(download.file_name, "brief_2.md");
    assert_eq!(download.body, newsroom.briefs()[1].content);
}
