use common::DEFAULT_FEED_URLS;
use newsjacker::ingestion::{FeedAggregator, DEFAULT_LIMIT_PER_FEED};

/// Fetches the default feeds (or the URLs given as arguments) and prints the
/// aggregated headlines.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let urls: Vec<String> = if args.is_empty() {
        DEFAULT_FEED_URLS.iter().map(|u| u.to_string()).collect()
    } else {
        args
    };

    let aggregator = FeedAggregator::new(10)?;

    for url in &urls {
        println!("\n{}", "=".repeat(60));
        println!("Testing: {}", url);
        println!("{}", "=".repeat(60));

        match aggregator.fetch_feed(url).await {
            Ok(feed) => {
                println!("✓ Success!");
                println!("  Title: {:?}", feed.title.as_ref().map(|t| &t.content));
                println!("  Entries: {}", feed.entries.len());
            }
            Err(e) => {
                println!("✗ Failed: {}", e);
            }
        }
    }

    let headlines = aggregator.fetch(&urls, DEFAULT_LIMIT_PER_FEED).await;
    println!("\nAggregated {} headlines:", headlines.len());
    for (i, h) in headlines.iter().enumerate() {
        println!("  {:>2}. [{}] {} ({})", i + 1, h.source, h.title, h.published);
        println!("       URL: {}", h.link);
    }
    Ok(())
}
