// Demo Application Config
//
// Configuration shape served by the demo: a log level the process follows
// at runtime plus a few plain fields with read-time defaults.

use confstream_kernel::{ConfigValue, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub log_level: String,
    pub name: String,
    pub age: i64,
    pub friends: Vec<String>,
}

impl ConfigValue for AppConfig {
    fn merge_and_validate(&self, candidate: &Self) -> Result<Self, ValidationError> {
        if candidate.age < 0 {
            return Err(ValidationError::new("age must not be negative"));
        }
        // Every update replaces the whole document.
        Ok(candidate.clone())
    }

    fn default_hints() -> serde_json::Value {
        json!({
            "logLevel": "debug",
            "name": "john",
            "friends": ["mark", "tom", "jack"]
        })
    }
}
