//! Inbound operator commands

use super::ControlError;
use crate::strategy::StartOverrides;
use serde::Deserialize;
use serde_json::Value;

/// Commands accepted on the control channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ControlCommand {
    Start(StartOverrides),
    Stop,
}

impl ControlCommand {
    /// Parse a text frame
    ///
    /// Invalid JSON is an error. Valid JSON that is not a known command
    /// yields `Ok(None)` and is ignored.
    pub fn parse(text: &str) -> Result<Option<Self>, ControlError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ControlError::InvalidJson(e.to_string()))?;

        match serde_json::from_value::<ControlCommand>(value) {
            Ok(command) => Ok(Some(command)),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unrecognized control message");
                Ok(None)
            }
        }
    }
}
