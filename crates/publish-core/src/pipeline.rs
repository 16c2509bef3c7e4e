use kuchiki::{traits::*, NodeRef};
use tracing::info;

use crate::code::extract_code_blocks;
use crate::config::TransformOptions;
use crate::css::parse_stylesheet;
use crate::error::PublishError;
use crate::images::{ImageResolver, ImageUpload, Uploader};
use crate::links::rewrite_links;
use crate::metadata::extract_metadata;
use crate::rewrite::{splice_code_markers, Rewriter};
use crate::types::{ExportInput, PublishPayload};

/// Converts an exported document into a publishable fragment.
///
/// The tree is cleaned in place before it is serialized, so it must not be
/// shared with another run. In uploaded image mode use
/// [`transform_with_uploader`] instead.
pub fn transform(
    document: &NodeRef,
    input: &ExportInput<'_>,
    options: &TransformOptions,
) -> Result<PublishPayload, PublishError> {
    run(document, input, options, None)
}

pub fn transform_with_uploader<F>(
    document: &NodeRef,
    input: &ExportInput<'_>,
    options: &TransformOptions,
    mut upload: F,
) -> Result<PublishPayload, PublishError>
where
    F: FnMut(ImageUpload<'_>) -> Result<String, String>,
{
    let upload: &mut Uploader<'_> = &mut upload;
    run(document, input, options, Some(upload))
}

/// Parses `html` and runs [`transform`] on it.
pub fn transform_html(
    html: &str,
    input: &ExportInput<'_>,
    options: &TransformOptions,
) -> Result<PublishPayload, PublishError> {
    let document = kuchiki::parse_html().one(html);
    transform(&document, input, options)
}

fn body_of(document: &NodeRef) -> NodeRef {
    document
        .select_first("body")
        .map(|body| body.as_node().clone())
        .unwrap_or_else(|_| document.clone())
}

fn run(
    document: &NodeRef,
    input: &ExportInput<'_>,
    options: &TransformOptions,
    uploader: Option<&mut Uploader<'_>>,
) -> Result<PublishPayload, PublishError> {
    let rules = parse_stylesheet(input.stylesheet)?;
    let code_blocks = extract_code_blocks(input.plain_text, options);
    let body = body_of(document);

    splice_code_markers(&body, code_blocks.len())?;
    let metadata = extract_metadata(&body);
    rewrite_links(&body);
    let images = ImageResolver::new(input.images, options, uploader).resolve_all(&body)?;

    let rewriter = Rewriter {
        rules: &rules,
        code_blocks: &code_blocks,
        options,
    };
    let mut html = rewriter.render_children(&body);
    if options.highlight_css && !code_blocks.is_empty() {
        if let Some(css) = highlight::theme_css() {
            html.push_str("<style>");
            html.push_str(&css);
            html.push_str("</style>");
        }
    }
    info!(
        rules = rules.len(),
        code_blocks = code_blocks.len(),
        images,
        tags = metadata.tags.len(),
        "document transformed"
    );
    Ok(PublishPayload {
        html,
        tags: metadata.tags,
        post_id: metadata.post_id,
    })
}
