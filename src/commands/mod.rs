pub mod diff;
pub mod inspect;
pub mod transform;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use ::transform::MacroRequest;

/// Read a JSON document from a file, or stdin for `-`.
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Could not read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Read an invocation envelope.
pub fn read_request(path: &Path) -> Result<MacroRequest> {
    let value = read_json(path)?;
    serde_json::from_value(value)
        .with_context(|| format!("{} is not a macro invocation envelope", path.display()))
}
