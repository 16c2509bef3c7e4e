pub mod archive;
pub mod code;
pub mod config;
pub mod css;
pub mod error;
pub mod images;
pub mod links;
pub mod metadata;
pub mod pipeline;
pub mod rewrite;
pub mod style;
pub mod types;

pub use error::PublishError;
pub use pipeline::{transform, transform_html, transform_with_uploader};
pub use types::{ExportInput, PublishPayload};
