use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming the directory lambda proxy classes are dumped to.
pub const LAMBDA_DUMP_DIR_ENV: &str = "JLAMBDA_LAMBDA_DUMP_DIR";
/// Environment variable listing class directories, separated like `PATH`.
pub const CLASS_PATH_ENV: &str = "JLAMBDA_CLASS_PATH";

/// Where the resolver finds class files.
///
/// ```toml
/// class-path = ["target/classes"]
/// lambda-dump-dir = "/tmp/lambdas"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Directories holding the classes that declare lambda bodies.
    pub class_path: Vec<PathBuf>,
    /// Directory holding dumped proxy classes. Unset disables resolution of
    /// non-serialisable closures.
    pub lambda_dump_dir: Option<PathBuf>,
}

impl ResolverConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::unavailable("resolver configuration", e.message()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::unavailable(path.display().to_string(), e))?;
        debug!("Loading resolver configuration from {}", path.display());
        Self::from_toml(&text)
    }

    /// Reads [`LAMBDA_DUMP_DIR_ENV`] and [`CLASS_PATH_ENV`]. Missing or empty
    /// variables leave the corresponding setting empty.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overrides the settings present in the environment.
    pub fn with_env(mut self) -> Self {
        if let Some(dir) = std::env::var_os(LAMBDA_DUMP_DIR_ENV).filter(|v| !v.is_empty()) {
            self.lambda_dump_dir = Some(PathBuf::from(dir));
        }
        if let Some(paths) = std::env::var_os(CLASS_PATH_ENV).filter(|v| !v.is_empty()) {
            self.class_path = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        self
    }
}
