use crate::webserver::state::AppState;
use axum::Router;
use std::sync::Arc;

pub mod cache;
pub mod proxy;
pub mod status;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes(state.clone()))
        .with_state(state)
}

fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .nest("/cache", cache::routes(state))
        .nest("/proxy", proxy::routes())
}
