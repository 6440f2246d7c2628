use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn log_path() -> PathBuf {
        Self::state_dir()
            .map(|dir| dir.join("funguessr.log"))
            .unwrap_or_else(|| PathBuf::from("funguessr.log"))
    }

    /// Where revealed hint graphs are written before opening them
    pub fn hint_dir() -> PathBuf {
        ProjectDirs::from("", "", "funguessr")
            .map(|proj_dirs| proj_dirs.cache_dir().join("hints"))
            .unwrap_or_else(|| std::env::temp_dir().join("funguessr-hints"))
    }

    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("funguessr"),
            )
        } else {
            ProjectDirs::from("", "", "funguessr")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }
}
