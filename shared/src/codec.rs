//! Single-line JSON codec for response envelopes
//!
//! Every response is written as exactly one line:
//! ```text
//! {"success":true,"message":"Armed"}\n
//! ```
//!
//! Consumers of the command line read the last line of stdout, so an
//! envelope must never contain a raw newline.

use serde::Serialize;
use thiserror::Error;

/// Maximum encoded envelope size (1 MB)
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

/// Errors that can occur during encoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Envelope too large: {0} bytes (max: {MAX_LINE_SIZE})")]
    LineTooLarge(usize),

    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Encode a value as one compact JSON line (without trailing newline)
pub fn encode_line<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let line = serde_json::to_string(value)?;
    if line.len() > MAX_LINE_SIZE {
        return Err(CodecError::LineTooLarge(line.len()));
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommandResult;

    #[test]
    fn test_encode_single_line() {
        let result = CommandResult::ok("line one\nline two");
        let line = encode_line(&result).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.starts_with('{'));
    }

    #[test]
    fn test_encode_too_large() {
        let huge = "x".repeat(MAX_LINE_SIZE + 1);
        assert!(matches!(
            encode_line(&huge),
            Err(CodecError::LineTooLarge(_))
        ));
    }
}
