//! Data directory layout.

use std::path::{Path, PathBuf};

use marianna_types::config::StorageConfig;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `MARIANNA_DATA_DIR` environment variable
/// 2. `~/.marianna`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MARIANNA_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".marianna");
    }

    // Last resort: current directory
    PathBuf::from(".marianna")
}

/// Where uploaded media lives: `uploads_dir` as-is when absolute, otherwise
/// relative to the data directory.
pub fn resolve_uploads_dir(data_dir: &Path, storage: &StorageConfig) -> PathBuf {
    let configured = Path::new(&storage.uploads_dir);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        data_dir.join(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_uploads_dir_is_under_data_dir() {
        let storage = StorageConfig::default();
        let dir = resolve_uploads_dir(Path::new("/srv/marianna"), &storage);
        assert_eq!(dir, PathBuf::from("/srv/marianna/uploads"));
    }

    #[test]
    fn test_absolute_uploads_dir_is_kept() {
        let storage = StorageConfig {
            uploads_dir: "/var/media".to_string(),
            ..StorageConfig::default()
        };
        let dir = resolve_uploads_dir(Path::new("/srv/marianna"), &storage);
        assert_eq!(dir, PathBuf::from("/var/media"));
    }

    #[test]
    fn test_resolve_data_dir_is_not_empty() {
        assert!(!resolve_data_dir().as_os_str().is_empty());
    }
}
