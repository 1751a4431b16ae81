#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use anyhow::Result;

fn main() -> Result<()> {
    let result = run();
    if let Err(e) = &result {
        tracing::error!("Fatal: {:#}", e);
    }
    lens::finalize_logs()?;
    result
}

#[cfg(windows)]
fn run() -> Result<()> {
    use anyhow::Context;
    use lens::{init_logger, LensApp, StateManager};
    use lens_capture::WgcBackend;
    use std::sync::Arc;

    let state = Arc::new(StateManager::new()?);
    let (retention, to_stdout, vsync, window_size) = state.read(|s| {
        (s.log_retention_count, s.log_to_stdout, s.vsync_enabled, s.window_size)
    });
    init_logger(state.logs_dir(), "lens", retention, to_stdout || cfg!(debug_assertions))?;

    let backend = WgcBackend::new().context("Failed to set up window capture")?;

    let options = eframe::NativeOptions {
        viewport: lens::app::viewport(window_size),
        vsync,
        ..Default::default()
    };

    eframe::run_native(
        "Lens",
        options,
        Box::new(move |_cc| Ok(Box::new(LensApp::new(state, backend)))),
    )
    .map_err(|e| anyhow::anyhow!("Render loop failed: {}", e))
}

#[cfg(not(windows))]
fn run() -> Result<()> {
    anyhow::bail!("Lens captures windows through Windows.Graphics.Capture and only runs on Windows")
}
