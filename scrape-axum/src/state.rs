use std::sync::Arc;

use scrape_core::ScrapeStore;
use scrape_queue::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub store: Arc<dyn ScrapeStore>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, store: Arc<dyn ScrapeStore>) -> Self {
        Self { dispatcher, store }
    }
}
