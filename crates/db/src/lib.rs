//! The two SQLite stores Agent Farm runs on: the per-project state store
//! (`.agent-farm/state.db`) and the host-global port registry
//! (`~/.agent-farm/global.db`).

mod error;
mod legacy;
mod pragma;
mod registry;
mod state;

pub use error::{DbError, Result};
pub use registry::{default_registry_path, RegistryDb, BASE_PORT_CEIL, BASE_PORT_FLOOR, BASE_PORT_STEP};
pub use state::{state_db_path, FarmState, StateDb};
