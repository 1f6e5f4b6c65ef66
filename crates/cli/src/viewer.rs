//! The `--serve-file` re-exec target `af_supervisor::spawn_file_viewer`
//! dials when `af open` is the binary that created the annotation, mirroring
//! `af-server`'s own `serve_annotation` route-for-route. Both binaries
//! implement this contract independently since `spawn_file_viewer` always
//! re-execs `current_exe()`, whichever of the two that happens to be.

use axum::response::IntoResponse;

pub async fn serve(file_path: String, port: u16) -> anyhow::Result<()> {
    let path = std::path::PathBuf::from(file_path);

    let app = axum::Router::new().route(
        "/",
        axum::routing::get(move || {
            let path = path.clone();
            async move {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => (axum::http::StatusCode::OK, bytes).into_response(),
                    Err(e) => (
                        axum::http::StatusCode::NOT_FOUND,
                        format!("cannot read file: {e}"),
                    )
                        .into_response(),
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
