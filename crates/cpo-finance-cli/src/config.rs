use serde_json::Value;
use std::fs;
use std::path::Path;

use cpo_finance_core::EngineConfig;

/// Load an engine config file. The format follows the extension:
/// `.json`, `.yaml`/`.yml` or `.toml`. Missing keys take engine defaults.
pub fn load_config(path: &str) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let contents = fs::read_to_string(p)
        .map_err(|e| format!("Failed to read config '{}': {}", p.display(), e))?;

    let extension = p
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let config: EngineConfig = match extension.as_deref() {
        Some("json") => serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config '{}': {}", p.display(), e))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config '{}': {}", p.display(), e))?,
        Some("toml") => toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config '{}': {}", p.display(), e))?,
        _ => {
            return Err(format!(
                "Unsupported config format '{}': use .json, .yaml, .yml or .toml",
                p.display()
            )
            .into())
        }
    };

    config.validate()?;
    tracing::debug!(path = %p.display(), "engine config loaded");
    Ok(config)
}

/// Place `config` under `at` in a command input. Keys the input already sets
/// in its own `config` object take precedence over the file.
pub fn inject(
    input: &mut Value,
    config: &EngineConfig,
    at: &[&str],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut target = &mut *input;
    for key in at {
        target = target
            .get_mut(*key)
            .ok_or_else(|| format!("Input has no '{}' object to attach the config to", key))?;
    }
    let Value::Object(map) = target else {
        return Err("Input must be a JSON object".into());
    };

    let mut merged = serde_json::to_value(config)?;
    if let (Value::Object(base), Some(Value::Object(own))) = (&mut merged, map.get("config")) {
        for (key, value) in own {
            base.insert(key.clone(), value.clone());
        }
    }
    map.insert("config".to_string(), merged);
    Ok(())
}
