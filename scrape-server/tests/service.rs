use std::collections::HashMap;
use std::time::Duration;

use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use scrape_core::{ConfigStore, Job, JobId, JobKind, JobStatus, JobStore, ResultStore, ScrapeStore};
use scrape_server::{build, connect_broker, Settings};

fn page(params: &HashMap<String, String>) -> u32 {
    params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1)
}

async fn feed_server() -> String {
    let app = Router::new()
        .route(
            "/hockey",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(match page(&params) {
                    1 => json!([
                        {"team_name": "Boston Bruins", "year": 1990, "wins": 44, "losses": 24},
                        {"team_name": "Calgary Flames", "year": 1990, "wins": 46, "losses": 26}
                    ]),
                    _ => json!([]),
                })
            }),
        )
        .route(
            "/films",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(match page(&params) {
                    1 => json!([{"year": 2010, "title": "The King's Speech", "nominations": 12, "awards": 4, "best_picture": true}]),
                    _ => json!([]),
                })
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn settings(base: &str) -> Settings {
    let mut store = ConfigStore::new();
    store.set("scraper.hockey_url", format!("{base}/hockey"));
    store.set("scraper.oscar_url", format!("{base}/films"));
    store.set("scraper.delay_ms", "0");
    store.set("worker.poll_interval_ms", "20");
    Settings::from_snapshot(&store.snapshot()).unwrap()
}

async fn wait_for_terminal(store: &dyn ScrapeStore, id: JobId) -> Job {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let job = store.get(id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("job never finished")
}

#[tokio::test]
async fn composite_job_completes_against_live_feeds() {
    let base = feed_server().await;
    let services = build(&settings(&base)).await.unwrap();
    let handle = services.worker.start().unwrap();
    assert_eq!(handle.consumer_count(), 2);

    let receipt = services.app.state.dispatcher.dispatch(JobKind::All).await.unwrap();
    assert_eq!(receipt.message, "All scraping jobs started");

    let store = services.app.state.store.clone();
    let job = wait_for_terminal(store.as_ref(), receipt.job_id).await;

    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error_message);
    let results = store.list_by_job(receipt.job_id).await.unwrap();
    assert_eq!(results.hockey.len(), 2);
    assert_eq!(results.oscar.len(), 1);

    handle.shutdown().await.unwrap();
    services.broker.close().await.unwrap();
    assert_eq!(services.observability.metrics().snapshot().records_persisted, 3);
}

#[tokio::test]
async fn unreachable_feed_fails_the_job() {
    let mut settings = settings("http://127.0.0.1:9");
    settings.scraper.hockey_url = Some("http://127.0.0.1:9/hockey".to_string());
    settings.scraper.oscar_url = None;
    settings.scraper.timeout = Duration::from_secs(2);
    let services = build(&settings).await.unwrap();
    let handle = services.worker.start().unwrap();

    let receipt = services.app.state.dispatcher.dispatch(JobKind::Hockey).await.unwrap();

    let store = services.app.state.store.clone();
    let job = wait_for_terminal(store.as_ref(), receipt.job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().starts_with("scrape failed: fetch failed"));
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn target_without_a_feed_url_fails_instead_of_waiting() {
    let base = feed_server().await;
    let mut settings = settings(&base);
    settings.scraper.oscar_url = None;
    let services = build(&settings).await.unwrap();
    let handle = services.worker.start().unwrap();
    assert_eq!(handle.consumer_count(), 2);

    let receipt = services.app.state.dispatcher.dispatch(JobKind::Oscar).await.unwrap();

    let store = services.app.state.store.clone();
    let job = wait_for_terminal(store.as_ref(), receipt.job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("scrape failed: scraper misconfigured: scraper.oscar_url is not set")
    );
    assert!(store.list_by_job(receipt.job_id).await.unwrap().is_empty());
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn store_urls() {
    let mut settings = settings("http://127.0.0.1:9");
    settings.store_url = "mysql://localhost/scraper".to_string();
    let err = build(&settings).await.err().unwrap();
    assert!(err.to_string().contains("unsupported store url"));

    if cfg!(not(feature = "postgres")) {
        settings.store_url = "postgres://localhost/scraper".to_string();
        let err = build(&settings).await.err().unwrap();
        assert!(err.to_string().contains("`postgres` feature"));
    }
}

#[tokio::test]
async fn broker_urls() {
    assert!(connect_broker("memory", "scraper").await.is_ok());

    let err = connect_broker("amqp://localhost", "scraper").await.err().unwrap();
    assert!(err.to_string().contains("unsupported"));
}
