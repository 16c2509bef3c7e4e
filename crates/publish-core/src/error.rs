use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Archive error: {0}")]
    Archive(String),
    #[error("Malformed stylesheet at line {line}, column {column}: {reason}")]
    MalformedStylesheet {
        line: u32,
        column: u32,
        reason: String,
    },
    #[error("Image {0:?} has no matching archive entry")]
    MissingImageReference(String),
    #[error(
        "Unbalanced code markers: {fragments} code blocks, {starts} start markers, {ends} end markers"
    )]
    UnbalancedCodeMarkers {
        fragments: usize,
        starts: usize,
        ends: usize,
    },
    #[error("Upload of {name} failed: {reason}")]
    Upload { name: String, reason: String },
    #[error("Uploaded image mode requires an upload function")]
    UploaderMissing,
}
