pub mod app;
pub mod gui;
pub mod logger;
pub mod state;
pub mod timing;

pub use app::LensApp;
pub use logger::{finalize_logs, get_log_path, init_logger};
pub use state::{AppState, PanelVisibility, StateManager};
