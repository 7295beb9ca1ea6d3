use crate::TransferError;

/// Validates a remote file name.
///
/// Names are single path components on the provider side, so separators,
/// dot entries and control characters are rejected.
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidInput("empty file name".into()));
    }

    if name == "." || name == ".." {
        return Err(TransferError::InvalidInput(format!(
            "reserved file name: {name}"
        )));
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidInput(format!(
            "path separator not allowed in file name: {name}"
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(TransferError::InvalidInput(format!(
            "control character in file name: {}",
            name.escape_debug()
        )));
    }

    Ok(())
}
