pub mod analysis;
pub mod financing;
pub mod metrics;
pub mod projection;
pub mod revenue;
pub mod scenarios;
pub mod simulation;

use serde::de::DeserializeOwned;
use serde_json::Value;

use cpo_finance_core::EngineConfig;

use crate::{config, input};

/// Engine config loaded from `--config`, shared by every command.
pub struct Context {
    pub config: Option<EngineConfig>,
}

/// Raw command input from `--input` or stdin, with the `--config` file
/// attached at `config_at` when the command takes one.
pub(crate) fn read_value(
    path: Option<&str>,
    ctx: &Context,
    config_at: Option<&[&str]>,
    what: &str,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut value = if let Some(path) = path {
        input::file::read_input_value(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        return Err(format!("--input <file.json> or stdin required for {what}").into());
    };

    if let (Some(engine_config), Some(at)) = (&ctx.config, config_at) {
        config::inject(&mut value, engine_config, at)?;
    }
    Ok(value)
}

pub(crate) fn parse<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, Box<dyn std::error::Error>> {
    serde_json::from_value(value).map_err(|e| format!("Invalid {what} input: {e}").into())
}

/// Set `key` on the existing object at `at`. Used for flag overrides such
/// as `--seed`.
pub(crate) fn override_field(
    value: &mut Value,
    at: &[&str],
    key: &str,
    field: Value,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut target = &mut *value;
    for step in at {
        target = target
            .get_mut(*step)
            .ok_or_else(|| format!("Input has no '{step}' object for the --{key} override"))?;
    }
    match target {
        Value::Object(map) => {
            map.insert(key.to_string(), field);
            Ok(())
        }
        _ => Err(format!("Cannot apply --{key}: target is not an object").into()),
    }
}
