pub mod app;
pub mod backend;
pub mod config;
pub mod dates;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod stats;
pub mod state;
pub mod storage;
pub mod store;

pub use app::router;
pub use backend::{FileBackend, HabitBackend};
pub use config::Config;
pub use state::AppState;
pub use store::HabitStore;
