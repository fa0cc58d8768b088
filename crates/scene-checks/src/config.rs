//! Factory config parsing shared by the built-in checks

use check_engine::CheckError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse a process `config` value; `null` yields the defaults
pub(crate) fn parse_config<T>(config: &Value) -> Result<T, CheckError>
where
    T: DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone())
        .map_err(|e| CheckError::new(format!("Invalid check config: {}", e)))
}
