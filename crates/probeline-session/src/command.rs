use crate::error::UsageError;

/// Check that `command` can be sent as one line without colliding with `probe`.
pub fn validate_command(command: &str, probe: &str) -> Result<(), UsageError> {
    if command.contains(['\n', '\r']) {
        return Err(UsageError::EmbeddedNewline);
    }
    if command.trim() == probe {
        return Err(UsageError::ReservedProbe(probe.to_string()));
    }
    Ok(())
}
