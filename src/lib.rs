//! ytmd-bridge library core functionality

pub mod bridge;
pub mod config;
pub mod integrations;
pub mod lastfm;
pub mod player;
pub mod remote;
pub mod shell;
pub mod ui;

/// Initialize the application directories
pub fn init_app_dirs() -> std::io::Result<()> {
    let default_path = config::Settings::default_path();
    if let Some(config_dir) = default_path.parent() {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir)?;
        }
    }
    Ok(())
}
