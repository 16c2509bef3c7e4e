use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What a transformation run hands to the publishing side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPayload {
    pub html: String,
    pub tags: Vec<String>,
    pub post_id: Option<String>,
}

/// Everything besides the tree that a run reads.
#[derive(Debug, Clone, Copy)]
pub struct ExportInput<'a> {
    pub stylesheet: &'a str,
    pub plain_text: &'a str,
    /// Image bytes keyed by file name.
    pub images: &'a HashMap<String, Vec<u8>>,
}
