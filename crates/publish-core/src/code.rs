use kuchiki::NodeRef;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::TransformOptions;

static CODE_REGION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new("(?s)\u{EC03}(.*?)\u{EC02}").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub html: String,
}

/// Highlighted fragments for every marker-delimited region of `plain_text`,
/// in document order.
pub fn extract_code_blocks(plain_text: &str, options: &TransformOptions) -> Vec<CodeBlock> {
    let Some(region) = CODE_REGION.as_ref() else {
        return Vec::new();
    };
    region
        .captures_iter(plain_text)
        .filter_map(|caps| caps.get(1))
        .map(|m| render_code_block(m.as_str().trim(), options))
        .collect()
}

pub fn render_code_block(code: &str, options: &TransformOptions) -> CodeBlock {
    let language = match highlight::detect_language(code) {
        Some(lang) if highlight::is_supported(lang) => lang.to_string(),
        guess => {
            debug!(?guess, fallback = %options.default_language, "code language not supported");
            options.default_language.clone()
        }
    };
    let body = highlight::highlight_html(&language, code);
    let html = format!(
        "<hr/><pre class=\"line-numbers language-{language}\">\
         <code class=\"line-numbers language-{language}\">{body}</code></pre><hr/>"
    );
    CodeBlock { language, html }
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "li"
            | "tr"
            | "br"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "pre"
            | "blockquote"
            | "table"
            | "ul"
            | "ol"
    )
}

/// Text rendition of the tree with a newline after every block element,
/// for callers that have no separate plain-text export.
pub fn plain_text(node: &NodeRef) -> String {
    let mut out = String::new();
    append_plain_text(node, &mut out);
    out
}

fn append_plain_text(node: &NodeRef, out: &mut String) {
    if let Some(text) = node.as_text() {
        out.push_str(&text.borrow());
        return;
    }
    if node.as_comment().is_some() {
        return;
    }
    let tag = node.as_element().map(|el| el.name.local.to_lowercase());
    if matches!(tag.as_deref(), Some("style" | "script" | "head" | "title")) {
        return;
    }
    for child in node.children() {
        append_plain_text(&child, out);
    }
    if tag.as_deref().is_some_and(is_block_tag) && !out.ends_with('\n') {
        out.push('\n');
    }
}
