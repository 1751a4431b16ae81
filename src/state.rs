use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use lens_capture::CaptureDescriptor;
use parking_lot::RwLock;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelVisibility {
    pub capture: bool,
    pub debug: bool,
    pub demo: bool,
}

impl Default for PanelVisibility {
    fn default() -> Self {
        Self {
            capture: true,
            debug: true,
            demo: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub capture: CaptureDescriptor,
    #[serde(default = "default_vsync_enabled")]
    pub vsync_enabled: bool,
    #[serde(default)]
    pub panels: PanelVisibility,

    /// Title of the window captured last, used to resume on launch.
    #[serde(default)]
    pub last_window_title: Option<String>,
    #[serde(default)]
    pub auto_start_capture: bool,

    #[serde(default = "default_log_retention_count")]
    pub log_retention_count: usize,
    #[serde(default)]
    pub log_to_stdout: bool,

    #[serde(default = "default_window_size")]
    pub window_size: [f32; 2],
}

fn default_vsync_enabled() -> bool {
    true
}

fn default_log_retention_count() -> usize {
    10
}

fn default_window_size() -> [f32; 2] {
    [1280.0, 720.0]
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            capture: CaptureDescriptor::default(),
            vsync_enabled: true,
            panels: PanelVisibility::default(),
            last_window_title: None,
            auto_start_capture: false,
            log_retention_count: default_log_retention_count(),
            log_to_stdout: false,
            window_size: default_window_size(),
        }
    }
}

enum WriteCommand {
    Update(AppState),
    Shutdown,
}

/// `AppState` kept in memory and persisted as JSON in `state.db` by a
/// background writer.
pub struct StateManager {
    app_data_dir: PathBuf,
    state: Arc<RwLock<AppState>>,
    write_sender: Sender<WriteCommand>,
    write_thread: Option<thread::JoinHandle<()>>,
}

impl StateManager {
    /// Open the store under `%APPDATA%\Lens`.
    pub fn new() -> Result<Self> {
        let app_data = std::env::var("APPDATA").context("Failed to get APPDATA environment variable")?;
        Self::open(PathBuf::from(app_data).join("Lens"))
    }

    pub fn open(app_data_dir: PathBuf) -> Result<Self> {
        let db_path = app_data_dir.join("state.db");

        std::fs::create_dir_all(&app_data_dir).context("Failed to create app data directory")?;

        let conn = Connection::open(&db_path).context("Failed to open database")?;
        Self::init_database(&conn)?;

        let initial_state = Self::load_state(&conn)?;
        drop(conn);
        let state = Arc::new(RwLock::new(initial_state));

        let (write_sender, write_receiver) = unbounded();

        let write_thread = thread::Builder::new()
            .name("lens-state-writer".into())
            .spawn(move || Self::write_worker(db_path, write_receiver))
            .context("Failed to spawn state writer")?;

        Ok(Self {
            app_data_dir,
            state,
            write_sender,
            write_thread: Some(write_thread),
        })
    }

    fn init_database(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .ok();

        if current_version.is_none() {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }

    fn load_state(conn: &Connection) -> Result<AppState> {
        let json_str: Option<String> = conn
            .query_row("SELECT value FROM state WHERE key = 'app_state'", [], |row| row.get(0))
            .ok();

        match json_str {
            Some(json) => match serde_json::from_str(&json) {
                Ok(state) => Ok(state),
                Err(e) => {
                    tracing::warn!("Stored state is unreadable, using defaults: {}", e);
                    Ok(AppState::default())
                }
            },
            None => Ok(AppState::default()),
        }
    }

    fn write_worker(db_path: PathBuf, receiver: Receiver<WriteCommand>) {
        let conn = match Connection::open(&db_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to open database in write worker: {}", e);
                return;
            }
        };

        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");

        while let Ok(cmd) = receiver.recv() {
            match cmd {
                WriteCommand::Update(state) => match serde_json::to_string(&state) {
                    Ok(json) => {
                        if let Err(e) = conn.execute(
                            "INSERT OR REPLACE INTO state (key, value) VALUES ('app_state', ?1)",
                            params![json],
                        ) {
                            tracing::error!("Failed to write state: {}", e);
                        }
                    }
                    Err(e) => tracing::error!("Failed to serialize state: {}", e),
                },
                WriteCommand::Shutdown => {
                    break;
                }
            }
        }

        let _ = conn.pragma_update(None, "wal_checkpoint", "TRUNCATE");
    }

    pub fn app_data_dir(&self) -> &Path {
        &self.app_data_dir
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.app_data_dir.join("logs")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.app_data_dir.join("snapshots")
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        f(&self.state.read())
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write();
        let before = state.clone();
        f(&mut state);
        if *state != before {
            let _ = self.write_sender.send(WriteCommand::Update(state.clone()));
        }
    }
}

impl Drop for StateManager {
    fn drop(&mut self) {
        let _ = self.write_sender.send(WriteCommand::Shutdown);
        if let Some(handle) = self.write_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_capture::TextureFormat;

    #[test]
    fn fresh_store_starts_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateManager::open(dir.path().to_path_buf()).unwrap();

        let snapshot = state.read(|s| s.clone());

        assert_eq!(snapshot, AppState::default());
        assert_eq!(snapshot.capture.frame_rate, 30);
        assert!(snapshot.panels.capture);
        assert!(dir.path().join("state.db").exists());
    }

    #[test]
    fn updates_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let state = StateManager::open(dir.path().to_path_buf()).unwrap();
            state.update(|s| {
                s.capture.format = TextureFormat::Rgba16Float;
                s.last_window_title = Some("Notepad".into());
                s.panels.demo = true;
            });
        }

        let state = StateManager::open(dir.path().to_path_buf()).unwrap();
        state.read(|s| {
            assert_eq!(s.capture.format, TextureFormat::Rgba16Float);
            assert_eq!(s.last_window_title.as_deref(), Some("Notepad"));
            assert!(s.panels.demo);
        });
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let state: AppState = serde_json::from_str(r#"{"vsync_enabled":false,"panels":{"debug":false}}"#).unwrap();

        assert!(!state.vsync_enabled);
        assert!(!state.panels.debug);
        assert!(state.panels.capture);
        assert_eq!(state.log_retention_count, 10);
        assert_eq!(state.window_size, [1280.0, 720.0]);
    }

    #[test]
    fn unreadable_document_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        {
            let conn = Connection::open(dir.path().join("state.db")).unwrap();
            StateManager::init_database(&conn).unwrap();
            conn.execute(
                "INSERT INTO state (key, value) VALUES ('app_state', 'not json')",
                [],
            )
            .unwrap();
        }

        let state = StateManager::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.read(|s| s.clone()), AppState::default());
    }

    #[test]
    fn directories_hang_off_app_data() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateManager::open(dir.path().to_path_buf()).unwrap();

        assert_eq!(state.logs_dir(), dir.path().join("logs"));
        assert_eq!(state.snapshots_dir(), dir.path().join("snapshots"));
    }
}
