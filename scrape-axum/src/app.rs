use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes::routes;
use crate::AppState;

/// Full router: API routes plus request-id and tracing middleware.
///
/// An incoming `x-request-id` is kept; otherwise a UUID is generated. Either
/// way it is echoed on the response.
pub fn router(state: AppState) -> Router<()> {
    routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

#[derive(Clone)]
pub struct ScrapeApp {
    pub state: AppState,
    pub router: Router<()>,
}

impl ScrapeApp {
    pub fn new(state: AppState) -> Self {
        Self {
            router: router(state.clone()),
            state,
        }
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router).await?;
        Ok(())
    }

    /// Like [`listen`](Self::listen) but stops accepting once `shutdown` resolves.
    pub async fn listen_with_shutdown<A, F>(self, addr: A, shutdown: F) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
