use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use scrape_axum::{router, AppState};
use scrape_core::{FieldMap, MemoryStore, ScrapeTarget};
use scrape_queue::types::{ChannelCapabilities, Delivery, OutboundMessage};
use scrape_queue::{
    scraper_fn, ChannelBroker, ChannelNames, Dispatcher, MemoryBroker, QueueConfig, QueueError,
    QueueResult, ScrapeError, ScraperRegistry, Worker,
};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    broker: MemoryBroker,
}

impl TestApp {
    fn new() -> Self {
        Self::with_broker(MemoryBroker::new(), None)
    }

    /// `failing` names a channel whose publishes always fail.
    fn with_broker(broker: MemoryBroker, failing: Option<String>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let publisher: Arc<dyn ChannelBroker> = match failing {
            Some(channel) => Arc::new(FailingChannel {
                inner: broker.clone(),
                failing: channel,
            }),
            None => Arc::new(broker.clone()),
        };
        let dispatcher = Dispatcher::new(store.clone(), publisher, ChannelNames::default());
        Self {
            router: router(AppState::new(dispatcher, store.clone())),
            store,
            broker,
        }
    }

    fn worker(&self, registry: ScraperRegistry) -> Worker {
        Worker::new(
            self.store.clone(),
            Arc::new(self.broker.clone()),
            registry,
            QueueConfig::default(),
        )
    }

    async fn call(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        let res = self
            .router
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        (status, json_body(res).await)
    }
}

struct FailingChannel {
    inner: MemoryBroker,
    failing: String,
}

#[async_trait]
impl ChannelBroker for FailingChannel {
    async fn declare(&self, channel: &str) -> QueueResult<()> {
        self.inner.declare(channel).await
    }

    async fn publish(&self, channel: &str, message: OutboundMessage) -> QueueResult<()> {
        if channel == self.failing {
            return Err(QueueError::NotConnected);
        }
        self.inner.publish(channel, message).await
    }

    async fn receive(&self, channel: &str, wait: Duration) -> QueueResult<Option<Delivery>> {
        self.inner.receive(channel, wait).await
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.inner.ack(delivery).await
    }

    async fn reject(&self, delivery: &Delivery, requeue: bool) -> QueueResult<()> {
        self.inner.reject(delivery, requeue).await
    }

    async fn message_count(&self, channel: &str) -> QueueResult<usize> {
        self.inner.message_count(channel).await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn close(&self) -> QueueResult<()> {
        self.inner.close().await
    }

    fn capabilities(&self) -> ChannelCapabilities {
        self.inner.capabilities()
    }
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn fields(value: Value) -> FieldMap {
    value.as_object().cloned().unwrap()
}

fn hockey_registry() -> ScraperRegistry {
    ScraperRegistry::new().with(
        ScrapeTarget::Hockey,
        Arc::new(scraper_fn("hockey-fixture", || async {
            Ok::<_, ScrapeError>(vec![
                fields(json!({"team_name": "Boston Bruins", "year": 1990, "wins": 44, "losses": 24})),
                fields(json!({"team_name": "Calgary Flames", "year": 1990, "wins": 46, "losses": 26})),
            ])
        })),
    )
}

#[tokio::test]
async fn health_reports_running() {
    let app = TestApp::new();
    let res = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());
    let body = json_body(res).await;
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let app = TestApp::new();
    let provided = HeaderValue::from_static("req-test-123");
    let res = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/jobs/404")
                .header("x-request-id", provided.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.headers().get("x-request-id"), Some(&provided));
}

/// H1. Scheduling a hockey crawl answers 202 and queues its envelope
#[tokio::test]
async fn crawl_is_accepted_and_queued() {
    let app = TestApp::new();

    let (status, body) = app.call("POST", "/crawl/hockey").await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["job_id"], 1);
    assert_eq!(body["status"], "pending");
    assert!(body["message"].as_str().unwrap().contains("Hockey"));
    assert_eq!(
        app.broker.peek("scraper_hockey_queue"),
        vec![br#"{"job_id":1,"type":"hockey"}"#.to_vec()]
    );

    let (status, job) = app.call("GET", "/jobs/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["type"], "hockey");
    assert_eq!(job["status"], "pending");
    assert_eq!(job["error_message"], Value::Null);
}

/// H2. Results of a completed job are served under `hockey_data`
#[tokio::test]
async fn completed_job_results() {
    let app = TestApp::new();
    app.call("POST", "/crawl/hockey").await;
    app.worker(hockey_registry())
        .run_once(ScrapeTarget::Hockey, Duration::ZERO)
        .await
        .unwrap();

    let (status, body) = app.call("GET", "/jobs/1/results").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["status"], "completed");
    let hockey = body["hockey_data"].as_array().unwrap();
    assert_eq!(hockey.len(), 2);
    assert!(hockey.iter().all(|r| r["job_id"] == 1));
    assert_eq!(body["oscar_data"], json!([]));

    let (_, listing) = app.call("GET", "/results/hockey?limit=1").await;
    assert_eq!(listing["total"], 2);
    assert_eq!(listing["data"].as_array().unwrap().len(), 1);
}

/// H3. A failed scrape shows up as a failed job with no results
#[tokio::test]
async fn failed_job_has_message_and_no_results() {
    let app = TestApp::new();
    app.call("POST", "/crawl/oscar").await;
    let registry = ScraperRegistry::new().with(
        ScrapeTarget::Oscar,
        Arc::new(scraper_fn("down", || async {
            Err::<Vec<FieldMap>, _>(ScrapeError::fetch("connection refused"))
        })),
    );
    app.worker(registry)
        .run_once(ScrapeTarget::Oscar, Duration::ZERO)
        .await
        .unwrap();

    let (_, body) = app.call("GET", "/jobs/1/results").await;

    assert_eq!(body["job"]["status"], "failed");
    assert!(body["job"]["error_message"].as_str().unwrap().contains("connection refused"));
    assert_eq!(body["hockey_data"], json!([]));
    assert_eq!(body["oscar_data"], json!([]));
}

/// H4. A composite crawl that cannot reach the second channel is a 500 and a failed job
#[tokio::test]
async fn composite_dispatch_failure_is_a_server_error() {
    let broker = MemoryBroker::new();
    let app = TestApp::with_broker(broker.clone(), Some("scraper_oscar_queue".to_string()));

    let (status, body) = app.call("POST", "/crawl/all").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["name"], "GeneralError");
    assert_eq!(body["code"], 500);
    assert_eq!(body["className"], "general-error");
    assert_eq!(body["data"]["job_id"], 1);
    assert_eq!(body["data"]["status"], "failed");

    let (_, job) = app.call("GET", "/jobs/1").await;
    assert_eq!(job["status"], "failed");
    assert!(job["error_message"]
        .as_str()
        .unwrap()
        .starts_with("failed to publish message"));
    assert_eq!(broker.peek("scraper_hockey_queue").len(), 1);
}

#[tokio::test]
async fn unknown_crawl_type_is_not_found() {
    let app = TestApp::new();

    let (status, body) = app.call("POST", "/crawl/baseball").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["name"], "NotFound");
    assert_eq!(body["className"], "not-found");
    assert!(app.store.job_count() == 0);
}

#[tokio::test]
async fn job_lookups() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/jobs/7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "job 7 not found");

    let (status, body) = app.call("GET", "/jobs/7/results").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);

    let (status, body) = app.call("GET", "/jobs/seven").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["name"], "BadRequest");
}

#[tokio::test]
async fn job_listing_is_newest_first_and_paged() {
    let app = TestApp::new();
    app.call("POST", "/crawl/hockey").await;
    app.call("POST", "/crawl/oscar").await;
    app.call("POST", "/crawl/all").await;

    let (status, body) = app.call("GET", "/jobs?skip=0&limit=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    let jobs = body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["id"], 3);
    assert_eq!(jobs[0]["type"], "all");
    assert_eq!(jobs[1]["id"], 2);

    let (status, body) = app.call("GET", "/jobs?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["className"], "bad-request");
}

#[tokio::test]
async fn results_for_unknown_type_are_not_found() {
    let app = TestApp::new();

    let (status, _) = app.call("GET", "/results/all").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call("GET", "/results/oscar").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"total": 0, "data": []}));
}
