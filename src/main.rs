use clap::Parser;
use std::time::Duration;
use tenderscout::{
    config,
    embedding::EmbeddingProviderConfig,
    fetcher::FetcherConfig,
    logging,
    pipeline::{AdmissionPolicy, AllowAll, IngestRequest, IngestionService, LatinRatioPolicy},
};

/// Ingest web pages into the Tenderscout retrieval stores.
#[derive(Parser)]
#[command(name = "tenderscout", version)]
struct Cli {
    /// Page URLs to ingest.
    #[arg(required = true)]
    urls: Vec<String>,

    /// Logical collection (knowledge base) the documents belong to.
    #[arg(long, default_value = "default")]
    collection_id: String,

    /// Category label stamped on every chunk.
    #[arg(long, default_value = "web")]
    category: String,

    /// Correlation id tying this batch's log lines together; generated when omitted.
    #[arg(long)]
    correlation_id: Option<String>,

    /// Global bound on simultaneous in-flight requests.
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Maximum fetch attempts per URL.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Minimum spacing between two requests to the same origin, in milliseconds.
    #[arg(long, default_value_t = 1500)]
    origin_cooldown_ms: u64,

    /// Proxy URL for outbound fetches; repeat to build a pool.
    #[arg(long = "proxy")]
    proxies: Vec<String>,

    /// Reject pages whose alphabetic text falls below this Latin-script ratio.
    #[arg(long)]
    min_latin_ratio: Option<f64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    let fetcher_config = FetcherConfig {
        concurrency: cli.concurrency,
        max_retries: cli.max_retries,
        origin_cooldown: Duration::from_millis(cli.origin_cooldown_ms),
        proxies: cli.proxies,
        ..FetcherConfig::default()
    };
    let admission: Box<dyn AdmissionPolicy> = match cli.min_latin_ratio {
        Some(min_ratio) => Box::new(LatinRatioPolicy { min_ratio }),
        None => Box::new(AllowAll),
    };
    let service = IngestionService::from_config(fetcher_config, admission).await;

    let app_config = config::get_config();
    let request = IngestRequest {
        urls: cli.urls,
        collection_id: cli.collection_id,
        category: cli.category,
        embedding: EmbeddingProviderConfig {
            base_url: app_config.embedding_base_url.clone(),
            api_key: app_config.embedding_api_key.clone(),
            model: app_config.embedding_model.clone(),
            batch_size: app_config.embedding_batch_size,
            dense_dim_hint: app_config.embedding_dimension_hint,
        },
        correlation_id: cli
            .correlation_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    };

    let report = service.ingest(request).await;
    let snapshot = service.metrics_snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).expect("metrics snapshot serializes")
    );

    if report.ingested == 0 && !report.failures.is_empty() {
        std::process::exit(1);
    }
}
