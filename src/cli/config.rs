use crate::error::{BindingError, Result};
use crate::DataBindingOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub max_update_iterations: Option<usize>,
    pub default_alias: Option<String>,
    pub debug_mode: Option<bool>,
    pub builtin_transforms: Option<bool>,
    /// Variables bound for `eval` unless overridden with `-D`
    pub variables: Option<BTreeMap<String, String>>,
}

impl ConfigFile {
    pub fn apply(&self, options: &mut DataBindingOptions) {
        if let Some(iterations) = self.max_update_iterations {
            options.max_update_iterations = iterations;
        }
        if let Some(alias) = &self.default_alias {
            options.default_alias = alias.clone();
        }
        if let Some(debug) = self.debug_mode {
            options.debug_mode = debug;
        }
        if let Some(builtins) = self.builtin_transforms {
            options.builtin_transforms = builtins;
        }
    }
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| BindingError::FileNotFound {
        path: format!("Config file {}: {}", config_path, e),
    })?;

    let config = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| BindingError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })?
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| BindingError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })?
    } else {
        return Err(BindingError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        });
    };

    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}
