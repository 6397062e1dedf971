//! Upload filename sanitization.

use thiserror::Error;

/// Errors produced when a client-supplied filename cannot be stored.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    /// Nothing usable remains after stripping directory components.
    #[error("filename is empty")]
    Empty,

    /// The final component is `.` or `..`.
    #[error("filename is a relative directory reference: {0}")]
    DirectoryReference(String),

    /// The name contains a NUL byte.
    #[error("filename contains a NUL byte")]
    NulByte,
}

/// Reduce a client-supplied filename to a single safe path component.
///
/// Browsers normally send a bare name, but some send a full client path
/// (`C:\fakepath\report.pdf`). Both `/` and `\` are treated as separators
/// and only the last component is kept.
pub fn sanitize_filename(raw: &str) -> Result<String, FilenameError> {
    if raw.contains('\0') {
        return Err(FilenameError::NulByte);
    }

    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    match name {
        "" => Err(FilenameError::Empty),
        "." | ".." => Err(FilenameError::DirectoryReference(name.to_string())),
        _ => Ok(name.to_string()),
    }
}
