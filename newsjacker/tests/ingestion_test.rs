use newsjacker::ingestion::{FeedAggregator, HeadlineRecord, UNKNOWN_PUBLISHED};

fn rss(channel: &str, items: &[&str]) -> String {
    let items: String = items
        .iter()
        .enumerate()
        .map(|(i, title)| {
            format!(
                "<item><title>{}</title><link>https://{}.example/{}</link></item>",
                title,
                channel.to_lowercase(),
                i
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>{}</title><link>https://{}.example</link><description>test</description>{}</channel></rss>"#,
        channel,
        channel.to_lowercase(),
        items
    )
}

async fn serve_feed(server: &mut mockito::ServerGuard, path: &str, body: String) -> mockito::Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(body)
        .create_async()
        .await
}

fn titles(headlines: &[HeadlineRecord]) -> Vec<(&str, &str)> {
    headlines
        .iter()
        .map(|h| (h.source.as_str(), h.title.as_str()))
        .collect()
}

#[tokio::test]
async fn test_feed_order_outer_entry_order_inner() {
    let mut server = mockito::Server::new_async().await;
    let _a = serve_feed(&mut server, "/a", rss("Alpha", &["a1", "a2", "a3", "a4", "a5"])).await;
    let _b = serve_feed(&mut server, "/b", rss("Beta", &["b1", "b2"])).await;

    let aggregator = FeedAggregator::new(5).expect("aggregator");
    let urls = vec![format!("{}/b", server.url()), format!("{}/a", server.url())];

    let headlines = aggregator.fetch(&urls, 3).await;

    assert_eq!(
        titles(&headlines),
        vec![
            ("Beta", "b1"),
            ("Beta", "b2"),
            ("Alpha", "a1"),
            ("Alpha", "a2"),
            ("Alpha", "a3"),
        ]
    );
    assert!(headlines.iter().all(|h| h.published == UNKNOWN_PUBLISHED));
    assert_eq!(headlines[0].link, "https://beta.example/0");
}

#[tokio::test]
async fn test_never_more_than_limit_per_feed() {
    let mut server = mockito::Server::new_async().await;
    let _a = serve_feed(&mut server, "/a", rss("Alpha", &["1", "2", "3", "4", "5", "6"])).await;

    let aggregator = FeedAggregator::new(5).expect("aggregator");
    let urls = [format!("{}/a", server.url())];

    for limit in [0, 1, 3, 10] {
        let headlines = aggregator.fetch(&urls, limit).await;
        assert_eq!(headlines.len(), limit.min(6), "limit {}", limit);
    }
}

#[tokio::test]
async fn test_bad_feed_is_same_as_omitting_it() {
    let mut server = mockito::Server::new_async().await;
    let _a = serve_feed(&mut server, "/a", rss("Alpha", &["a1", "a2"])).await;
    let _b = serve_feed(&mut server, "/b", rss("Beta", &["b1"])).await;
    let _garbage = server
        .mock("GET", "/garbage")
        .with_status(200)
        .with_body("<html><body>definitely not a feed</body></html>")
        .create_async()
        .await;
    let _missing = server.mock("GET", "/missing").with_status(404).create_async().await;

    let aggregator = FeedAggregator::new(5).expect("aggregator");
    let good = vec![format!("{}/a", server.url()), format!("{}/b", server.url())];
    let with_bad = vec![
        format!("{}/a", server.url()),
        format!("{}/garbage", server.url()),
        format!("{}/missing", server.url()),
        "http://127.0.0.1:1/unreachable".to_string(),
        format!("{}/b", server.url()),
    ];

    let expected = aggregator.fetch(&good, 3).await;
    let actual = aggregator.fetch(&with_bad, 3).await;

    assert_eq!(expected.len(), 3);
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_blank_urls_are_skipped() {
    let mut server = mockito::Server::new_async().await;
    let mock = serve_feed(&mut server, "/a", rss("Alpha", &["a1"])).await;

    let aggregator = FeedAggregator::new(5).expect("aggregator");
    let urls = vec![
        String::new(),
        "   ".to_string(),
        format!("  {}/a  ", server.url()),
        "\t".to_string(),
    ];

    let headlines = aggregator.fetch(&urls, 3).await;
    assert_eq!(titles(&headlines), vec![("Alpha", "a1")]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_all_feeds_failing_is_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _broken = server.mock("GET", "/broken").with_status(500).create_async().await;

    let aggregator = FeedAggregator::new(5).expect("aggregator");
    let headlines = aggregator.fetch(&[format!("{}/broken", server.url())], 3).await;
    assert!(headlines.is_empty());

    let none: [&str; 0] = [];
    assert!(aggregator.fetch(&none, 3).await.is_empty());
}
