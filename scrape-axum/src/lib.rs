//! scrape-axum: HTTP routes over the scrape job pipeline.
//!
//! `POST /crawl/{type}` hands off to the [`Dispatcher`](scrape_queue::Dispatcher);
//! every other route reads from the store. Errors render as
//! `{name, message, code, className}` and every response carries an
//! `x-request-id` header.

pub mod app;
pub mod params;
pub mod routes;
pub mod state;
mod error;

pub use app::{router, ScrapeApp};
pub use error::ApiError;
pub use params::Pagination;
pub use state::AppState;
