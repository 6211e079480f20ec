use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use scrape_core::{
    HockeyRecord, Job, JobId, JobKind, JobStore, OscarRecord, Page, ResultStore, ScrapeTarget,
    ServiceError, UnknownKind,
};
use scrape_queue::DispatchReceipt;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{ApiError, AppState, Pagination};

#[derive(Debug, Serialize)]
pub struct JobList {
    pub total: usize,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize)]
pub struct RecordList<T> {
    pub total: usize,
    pub data: Vec<T>,
}

impl<T> From<Page<T>> for RecordList<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            total: page.total,
            data: page.items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobResultsBody {
    pub job: Job,
    pub hockey_data: Vec<HockeyRecord>,
    pub oscar_data: Vec<OscarRecord>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/crawl/{kind}", post(crawl))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/results", get(job_results))
        .route("/results/{kind}", get(list_results))
}

async fn health() -> Json<Value> {
    Json(json!({
        "message": "Scrape job API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

fn parse_job_id(raw: &str) -> Result<JobId, ServiceError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(JobId::new(id)),
        _ => Err(ServiceError::bad_request(format!("`{raw}` is not a valid job id"))),
    }
}

async fn crawl(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<(StatusCode, Json<DispatchReceipt>), ApiError> {
    let kind: JobKind = kind
        .parse()
        .map_err(|e: UnknownKind| ServiceError::not_found(e.to_string()))?;

    let receipt = state.dispatcher.dispatch(kind).await?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<JobList>, ApiError> {
    let page = Pagination::from_query(&query)?;
    let jobs = state.store.list(page.skip, page.limit).await?;
    Ok(Json(JobList {
        total: jobs.total,
        jobs: jobs.items,
    }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let id = parse_job_id(&id)?;
    Ok(Json(state.store.get(id).await?))
}

async fn job_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResultsBody>, ApiError> {
    let id = parse_job_id(&id)?;
    let job = state.store.get(id).await?;
    let results = state.store.list_by_job(id).await?;
    Ok(Json(JobResultsBody {
        job,
        hockey_data: results.hockey,
        oscar_data: results.oscar,
    }))
}

async fn list_results(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let target: ScrapeTarget = kind
        .parse()
        .map_err(|e: UnknownKind| ServiceError::not_found(e.to_string()))?;
    let page = Pagination::from_query(&query)?;

    let body = match target {
        ScrapeTarget::Hockey => {
            let records = state.store.list_hockey(page.skip, page.limit).await?;
            serde_json::to_value(RecordList::from(records))
        }
        ScrapeTarget::Oscar => {
            let records = state.store.list_oscar(page.skip, page.limit).await?;
            serde_json::to_value(RecordList::from(records))
        }
    }
    .map_err(|e| ServiceError::general_error(e.to_string()))?;
    Ok(Json(body))
}
