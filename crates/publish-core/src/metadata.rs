use kuchiki::NodeRef;
use tracing::debug;

use crate::config::{POST_ID_PREFIX, TAGS_PREFIX};
use crate::rewrite::CODE_BLOCK_ATTR;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub tags: Vec<String>,
    pub post_id: Option<String>,
}

enum Carrier {
    Tags(Vec<String>),
    PostId(String),
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

fn parse_carrier(text: &str) -> Option<Carrier> {
    let text = text.trim();
    if let Some(rest) = strip_prefix_ignore_case(text, TAGS_PREFIX) {
        let tags = rest
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        return Some(Carrier::Tags(tags));
    }
    strip_prefix_ignore_case(text, POST_ID_PREFIX).map(|rest| Carrier::PostId(rest.trim().to_string()))
}

fn is_span(node: &NodeRef) -> bool {
    node.as_element()
        .is_some_and(|el| &*el.name.local == "span")
}

/// Pulls `Tags:` / `PostId:` spans out of `body`, removing each carrier and
/// any ancestor it leaves empty, then trims blank leading lines.
pub fn extract_metadata(body: &NodeRef) -> DocumentMetadata {
    let mut carriers = Vec::new();
    collect_carriers(body, &mut carriers);

    let mut meta = DocumentMetadata::default();
    for (node, carrier) in carriers {
        match carrier {
            Carrier::Tags(tags) => meta.tags.extend(tags),
            Carrier::PostId(id) => meta.post_id = Some(id),
        }
        detach_collapsing(&node, body);
    }
    trim_leading_blank_lines(body);
    debug!(tags = meta.tags.len(), post_id = ?meta.post_id, "metadata extracted");
    meta
}

fn collect_carriers(node: &NodeRef, out: &mut Vec<(NodeRef, Carrier)>) {
    for child in node.children() {
        if is_span(&child) {
            if let Some(carrier) = parse_carrier(&child.text_contents()) {
                out.push((child, carrier));
                continue;
            }
        }
        collect_carriers(&child, out);
    }
}

fn detach_collapsing(node: &NodeRef, root: &NodeRef) {
    let mut current = node.clone();
    loop {
        let parent = current.parent();
        current.detach();
        match parent {
            Some(p) if p != *root && p.first_child().is_none() => current = p,
            _ => break,
        }
    }
}

fn is_blank_line(node: &NodeRef) -> bool {
    if !node.text_contents().trim().is_empty() {
        return false;
    }
    !node.inclusive_descendants().any(|n| {
        n.as_element().is_some_and(|el| {
            matches!(&*el.name.local, "img" | "hr")
                || el.attributes.borrow().contains(CODE_BLOCK_ATTR)
        })
    })
}

fn trim_leading_blank_lines(body: &NodeRef) {
    while let Some(first) = body.first_child() {
        if !is_blank_line(&first) {
            break;
        }
        first.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::*;

    fn body(html: &str) -> NodeRef {
        kuchiki::parse_html()
            .one(html)
            .select_first("body")
            .expect("body")
            .as_node()
            .clone()
    }

    #[test]
    fn extracts_tags_and_removes_carrier() {
        let body = body(
            "<body><p><span>Tags: a, b ,c</span></p><p><span>Hello</span></p></body>",
        );
        let meta = extract_metadata(&body);
        assert_eq!(meta.tags, vec!["a", "b", "c"]);
        assert_eq!(meta.post_id, None);
        assert_eq!(body.to_string(), "<body><p><span>Hello</span></p></body>");
    }

    #[test]
    fn post_id_is_case_insensitive_and_last_wins() {
        let body = body(
            "<body><p><span>postid: 1</span></p><p><span>Text</span><span>PostId: 12345 </span></p></body>",
        );
        let meta = extract_metadata(&body);
        assert_eq!(meta.post_id.as_deref(), Some("12345"));
        assert_eq!(body.to_string(), "<body><p><span>Text</span></p></body>");
    }

    #[test]
    fn empty_tag_segments_are_dropped() {
        let body = body("<body><p><span>Tags: a,,b, ,</span></p><p>x</p></body>");
        assert_eq!(extract_metadata(&body).tags, vec!["a", "b"]);
    }

    #[test]
    fn tags_accumulate_across_spans() {
        let body = body(
            "<body><p><span>Tags: rust</span></p><p><span>tags: db, rust</span></p><p>x</p></body>",
        );
        assert_eq!(extract_metadata(&body).tags, vec!["rust", "db", "rust"]);
    }

    #[test]
    fn trims_blank_leading_lines_but_keeps_images() {
        let body = body(
            "<body><p><span>PostId: 7</span></p><p><span>\u{a0}</span></p><p></p><p><img src=\"images/a.png\"></p><p>x</p></body>",
        );
        extract_metadata(&body);
        assert_eq!(
            body.to_string(),
            "<body><p><img src=\"images/a.png\"></p><p>x</p></body>"
        );
    }

    #[test]
    fn nested_carrier_is_counted_once() {
        let body = body("<body><p><span><span>Tags: x</span></span></p><p>y</p></body>");
        assert_eq!(extract_metadata(&body).tags, vec!["x"]);
    }
}
