use axum::extract::State;
use axum::Json;

use af_utils::ApiResponse;

use crate::app_state::AppState;
use crate::error::ApiError;

pub async fn stop(State(app): State<AppState>) -> Result<Json<ApiResponse<()>>, ApiError> {
    af_orchestrator::stop(&app.state_db).await?;
    Ok(Json(ApiResponse::success(())))
}
