//! Small stateless helpers shared by the orchestrator, dashboard server, and
//! CLI: path traversal defense, the API response envelope, paste-buffer
//! message framing, asset directory resolution, and process liveness.

pub mod assets;
pub mod liveness;
pub mod paste;
pub mod path;
pub mod response;

pub use path::{resolve_project_path, PathError};
pub use response::ApiResponse;
