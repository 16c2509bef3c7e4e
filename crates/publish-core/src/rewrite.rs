use kuchiki::{NodeData, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::code::CodeBlock;
use crate::config::{TransformOptions, CODE_END_MARKER, CODE_START_MARKER, TABLE_CLASSES};
use crate::css::StyleRule;
use crate::error::PublishError;
use crate::style::resolve_style;

/// Attribute left on a start-marker element; its value indexes the code blocks.
pub const CODE_BLOCK_ATTR: &str = "data-docpress-code";

static PARAGRAPH_TAG: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)</?p(?:\s[^>]*)?>").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Start,
    End,
}

fn marker_kind(node: &NodeRef) -> Option<Marker> {
    node.as_element()?;
    let text = node.text_contents();
    let mut chars = text.trim().chars();
    let glyph = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    match glyph {
        CODE_START_MARKER => Some(Marker::Start),
        CODE_END_MARKER => Some(Marker::End),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct CodeSplice {
    in_code_region: bool,
    starts: usize,
    ends: usize,
}

/// Marks each start-marker element with the index of its code block and
/// removes everything from there up to and including the end marker.
///
/// Fails unless every one of `fragments` blocks lands on exactly one
/// start marker and every region is closed.
pub fn splice_code_markers(root: &NodeRef, fragments: usize) -> Result<usize, PublishError> {
    let mut state = CodeSplice::default();
    splice_children(root, &mut state);
    if state.in_code_region || state.starts != fragments || state.ends != state.starts {
        return Err(PublishError::UnbalancedCodeMarkers {
            fragments,
            starts: state.starts,
            ends: state.ends,
        });
    }
    debug!(blocks = state.starts, "code blocks spliced");
    Ok(state.starts)
}

fn splice_children(node: &NodeRef, state: &mut CodeSplice) {
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
        match marker_kind(&child) {
            Some(Marker::Start) => {
                if state.in_code_region {
                    // Nested start; counted so the imbalance surfaces.
                    state.starts += 1;
                    child.detach();
                    continue;
                }
                mark_code_block(&child, state.starts);
                state.starts += 1;
                state.in_code_region = true;
            }
            Some(Marker::End) => {
                state.ends += 1;
                state.in_code_region = false;
                child.detach();
            }
            None if state.in_code_region => {
                if child.text_contents().contains(CODE_END_MARKER) {
                    splice_children(&child, state);
                } else {
                    child.detach();
                }
            }
            None => splice_children(&child, state),
        }
    }
}

fn mark_code_block(node: &NodeRef, index: usize) {
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
        child.detach();
    }
    if let Some(el) = node.as_element() {
        el.attributes
            .borrow_mut()
            .insert(CODE_BLOCK_ATTR, index.to_string());
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn strip_paragraph_tags(html: &str) -> String {
    match PARAGRAPH_TAG.as_ref() {
        Some(tag) => tag.replace_all(html, "").into_owned(),
        None => html.to_string(),
    }
}

/// Serializes a cleaned tree into the publishable fragment.
pub struct Rewriter<'a> {
    pub rules: &'a [StyleRule],
    pub code_blocks: &'a [CodeBlock],
    pub options: &'a TransformOptions,
}

impl Rewriter<'_> {
    pub fn render_children(&self, node: &NodeRef) -> String {
        node.children().map(|child| self.render(&child)).collect()
    }

    pub fn render(&self, node: &NodeRef) -> String {
        if let Some(text) = node.as_text() {
            return self.render_text(node, &text.borrow());
        }
        let Some(el) = node.as_element() else {
            if matches!(node.data(), NodeData::Document(_) | NodeData::DocumentFragment) {
                return self.render_children(node);
            }
            return String::new();
        };
        let tag = el.name.local.to_lowercase();
        match tag.as_str() {
            "hr" => return "<hr/>".to_string(),
            "br" => return "<br/>".to_string(),
            "img" => return render_image(el),
            "head" | "style" | "script" | "title" | "meta" | "link" => return String::new(),
            _ => {}
        }
        if let Some(index) = el.attributes.borrow().get(CODE_BLOCK_ATTR) {
            return index
                .parse::<usize>()
                .ok()
                .and_then(|i| self.code_blocks.get(i))
                .map(|block| block.html.clone())
                .unwrap_or_default();
        }

        let mods = resolve_style(node, self.rules, self.options);
        let mut inner = self.render_children(node);
        if inner.is_empty() {
            return inner;
        }
        if matches!(tag.as_str(), "td" | "li") {
            inner = strip_paragraph_tags(&inner);
        }
        if mods.monospace {
            inner = format!("<code>{inner}</code>");
        }
        if mods.italic {
            inner = format!("<em>{inner}</em>");
        }
        if mods.bold {
            inner = format!("<strong>{inner}</strong>");
        }
        let unwrap = (tag == "span" && mods.styles.is_empty()) || tag == "b";
        let mut out = if unwrap {
            inner
        } else {
            let mut open = format!("<{tag}");
            if !mods.styles.is_empty() {
                open.push_str(&format!(" style=\"{}\"", escape_attr(&mods.styles)));
            }
            if tag == "a" {
                if let Some(href) = el.attributes.borrow().get("href") {
                    open.push_str(&format!(" href=\"{}\"", escape_attr(href)));
                }
            }
            if tag == "table" {
                open.push_str(&format!(" class=\"{TABLE_CLASSES}\""));
            }
            format!("{open}>{inner}</{tag}>")
        };
        if mods.quoted {
            out = format!("<blockquote>{out}</blockquote>");
        }
        out
    }

    fn render_text(&self, node: &NodeRef, text: &str) -> String {
        let in_cell = node
            .parent()
            .and_then(|p| p.as_element().map(|el| &*el.name.local == "td"))
            .unwrap_or(false);
        if text == "\u{a0}" && !in_cell {
            return String::new();
        }
        escape_text(text)
    }
}

fn render_image(el: &kuchiki::ElementData) -> String {
    let attrs = el.attributes.borrow();
    let Some(src) = attrs.get("src") else {
        return String::new();
    };
    let mut out = format!("<img src=\"{}\"", escape_attr(src));
    if let Some(alt) = attrs.get("alt").filter(|a| !a.trim().is_empty()) {
        out.push_str(&format!(" alt=\"{}\"", escape_attr(alt)));
    }
    if let Some(style) = attrs.get("style").filter(|s| !s.trim().is_empty()) {
        out.push_str(&format!(" style=\"{}\"", escape_attr(style)));
    }
    out.push_str("/>");
    out
}
