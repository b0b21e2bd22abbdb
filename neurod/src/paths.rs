//! Cross-platform application paths

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("could not determine the user config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, PathsError> {
        let base = dirs::config_dir().ok_or(PathsError::NoConfigDir)?;
        Ok(Self::with_base(base))
    }

    pub fn with_base(base: impl AsRef<Path>) -> Self {
        Self {
            config_dir: base.as_ref().join("neurogenesis"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("neurod.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_under_app_dir() {
        let paths = AppPaths::with_base("/tmp/cfg");
        assert_eq!(paths.config_dir(), Path::new("/tmp/cfg/neurogenesis"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/cfg/neurogenesis/neurod.json"));
    }
}
