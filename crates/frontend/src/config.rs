use std::borrow::Cow;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::DEFAULT_CRT_SHADER;

pub const CONFIG_ENV_VAR: &str = "FRONTEND_CONFIG";
pub const MAX_VOLUME: u8 = 15;
pub const DEFAULT_TOUCH_OVERLAY_ALPHA: u8 = 180;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrontendOptions {
    pub crt_monitor: bool,
    pub crt_shader_path: Option<PathBuf>,
    pub touch_overlay_alpha: u8,
    pub volume: u8,
    pub fullscreen: bool,
}

impl Default for FrontendOptions {
    fn default() -> Self {
        Self {
            crt_monitor: false,
            crt_shader_path: None,
            touch_overlay_alpha: DEFAULT_TOUCH_OVERLAY_ALPHA,
            volume: MAX_VOLUME,
            fullscreen: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config '{path}' at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {field} in '{path}': {reason}")]
    InvalidValue {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },
    #[error("failed to read CRT shader '{path}': {source}")]
    ShaderSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FrontendOptions {
    /// Fragment stage for the CRT pass: the configured file, or the built-in
    /// shader when none is set. Re-read on every call.
    pub fn crt_fragment_source(&self) -> Result<Cow<'static, str>, ConfigError> {
        match &self.crt_shader_path {
            Some(path) => fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| ConfigError::ShaderSource {
                    path: path.clone(),
                    source,
                }),
            None => Ok(Cow::Borrowed(DEFAULT_CRT_SHADER)),
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.volume > MAX_VOLUME {
            return Err(ConfigError::InvalidValue {
                path: path.to_path_buf(),
                field: "volume",
                reason: format!("expected 0..={MAX_VOLUME}, got {}", self.volume),
            });
        }
        Ok(())
    }
}

/// Options from the file named by `FRONTEND_CONFIG`, or defaults when the
/// variable is unset.
pub fn resolve_options() -> Result<FrontendOptions, ConfigError> {
    match env::var(CONFIG_ENV_VAR) {
        Ok(value) => load_options(Path::new(&value)),
        Err(env::VarError::NotPresent) => Ok(FrontendOptions::default()),
        Err(source) => Err(ConfigError::EnvVar {
            var: CONFIG_ENV_VAR,
            source,
        }),
    }
}

pub fn load_options(path: &Path) -> Result<FrontendOptions, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let options = parse_options(path, &raw)?;
    options.validate(path)?;
    Ok(options)
}

fn parse_options(path: &Path, raw: &str) -> Result<FrontendOptions, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, FrontendOptions>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        ConfigError::Parse {
            path: path.to_path_buf(),
            field: if field.is_empty() { ".".to_string() } else { field },
            source: error.into_inner(),
        }
    })
}
