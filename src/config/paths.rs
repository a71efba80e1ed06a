//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (`settings.toml`):
//!   Windows: %APPDATA%\shohayok\
//!   macOS:   ~/Library/Application Support/shohayok/
//!   Linux:   ~/.config/shohayok/
//!
//! Data dir (preferences + transcript):
//!   Windows: %LOCALAPPDATA%\shohayok\
//!   macOS:   ~/Library/Application Support/shohayok/
//!   Linux:   ~/.local/share/shohayok/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for the preference store's JSON files.
    pub data_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "shohayok";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
            data_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
