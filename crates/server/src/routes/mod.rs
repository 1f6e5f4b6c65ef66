//! Router assembly: state/tabs/stop/files routes behind the loopback
//! security gate, the terminal reverse proxy alongside them, and a static
//! SPA fallback for the dashboard UI bundle. Grounded on
//! `davidrudduck-vk-swarm`'s `remote::routes::mod::router` (`.merge()` chains,
//! `ServeDir`/`ServeFile` fallback, `TraceLayer`, `CorsLayer::permissive()`)
//! and `server::routes::mod::router`'s `IntoMakeService` return type.

pub mod files;
pub mod proxy;
pub mod stop;
pub mod tabs;

mod state;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::security::reject_non_loopback;

/// Directory the placeholder/dashboard UI bundle is served from, resolved
/// at compile time relative to this crate (see `build.rs`).
const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

pub fn router(app: AppState) -> Router {
    let api = Router::<AppState>::new()
        .route("/api/state", get(state::get_state))
        .route("/api/stop", post(stop::stop))
        .route("/api/tabs/file", post(tabs::open_file_tab))
        .route("/api/tabs/builder", post(tabs::open_builder_tab))
        .route("/api/tabs/shell", post(tabs::open_shell_tab))
        .route("/api/tabs/{id}", delete(tabs::close_tab))
        .route("/api/projectlist-exists", get(files::projectlist_exists))
        .route("/open-file", get(files::open_file))
        .route("/file", get(files::file));

    let spa = ServeDir::new(STATIC_DIR).fallback(ServeFile::new(format!("{STATIC_DIR}/index.html")));

    Router::new()
        .merge(api)
        .merge(proxy::router())
        .fallback_service(spa)
        .layer(middleware::from_fn_with_state(app.clone(), reject_non_loopback))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}
