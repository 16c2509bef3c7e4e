use kuchiki::{ElementData, NodeRef};

use crate::config::{
    TransformOptions, BOLD_WEIGHT_THRESHOLD, DEFAULT_TEXT_COLORS, QUOTE_INDENT, TABLE_STYLE,
};
use crate::css::{matching_rules, parse_inline_style, StyleRule};

const ANCHOR_CHILD_STYLES: &[&str] = &[
    "color",
    "font-style",
    "font-weight",
    "text-align",
    "font-family",
];
const HEADING_CHILD_STYLES: &[&str] = &["text-align", "font-family"];
const FONT_ONLY_STYLES: &[&str] = &["font-family"];
const BLOCK_STYLES: &[&str] = &[
    "color",
    "font-style",
    "font-weight",
    "text-decoration",
    "text-decoration-line",
    "text-align",
    "font-family",
];

/// Presentation derived for one element, consumed by the serializer right away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    pub quoted: bool,
    pub styles: String,
}

fn is_heading(tag: &str) -> bool {
    matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// CSS properties that may be carried into output for `tag` under `parent`.
pub fn style_whitelist(tag: &str, parent: Option<&str>) -> &'static [&'static str] {
    match parent {
        Some("a") => ANCHOR_CHILD_STYLES,
        Some(p) if is_heading(p) => HEADING_CHILD_STYLES,
        _ if matches!(tag, "li" | "b") => FONT_ONLY_STYLES,
        _ => BLOCK_STYLES,
    }
}

/// Matched stylesheet declarations in stylesheet order, then inline ones.
/// A later declaration of a property replaces the earlier value in place.
pub fn effective_declarations(el: &ElementData, rules: &[StyleRule]) -> Vec<(String, String)> {
    let mut decls: Vec<(String, String)> = Vec::new();
    let mut apply = |prop: &str, value: &str| {
        match decls.iter_mut().find(|(p, _)| p == prop) {
            Some(existing) => existing.1 = value.to_string(),
            None => decls.push((prop.to_string(), value.to_string())),
        }
    };
    for rule in matching_rules(el, rules) {
        for (prop, value) in &rule.declarations {
            apply(prop, value);
        }
    }
    if let Some(style) = el.attributes.borrow().get("style") {
        for (prop, value) in parse_inline_style(style) {
            apply(&prop, &value);
        }
    }
    decls
}

pub fn resolve_style(node: &NodeRef, rules: &[StyleRule], options: &TransformOptions) -> Modifiers {
    let mut mods = Modifiers::default();
    let Some(el) = node.as_element() else {
        return mods;
    };
    let tag = el.name.local.to_lowercase();
    let parent_tag = node
        .parent()
        .and_then(|p| p.as_element().map(|pe| pe.name.local.to_lowercase()));
    let whitelist = style_whitelist(&tag, parent_tag.as_deref());

    if tag == "table" {
        mods.styles.push_str(TABLE_STYLE);
    }
    if tag == "tr" && is_first_table_row(node) {
        mods.bold = true;
    }

    let mut underline = false;
    for (prop, value) in effective_declarations(el, rules) {
        let value = value.trim();
        match prop.as_str() {
            "font-style" => mods.italic |= value.eq_ignore_ascii_case("italic"),
            "font-weight" => mods.bold |= is_bold_weight(value),
            "font-family" => mods.monospace |= value.contains(options.monospace_marker.as_str()),
            "margin-left" if tag == "p" => mods.quoted = value == QUOTE_INDENT,
            _ => {}
        }
        if !whitelist.contains(&prop.as_str()) {
            continue;
        }
        match prop.as_str() {
            "color" if !is_default_color(value) => {
                mods.styles.push_str(&format!("color:{value};"));
            }
            "text-decoration" | "text-decoration-line" if value == "underline" && !underline => {
                underline = true;
                mods.styles.push_str("text-decoration:underline;");
            }
            "text-align" => mods.styles.push_str(&format!("text-align:{value};")),
            _ => {}
        }
    }
    mods
}

fn is_bold_weight(value: &str) -> bool {
    match value.parse::<f32>() {
        Ok(weight) => weight > BOLD_WEIGHT_THRESHOLD,
        Err(_) => matches!(value, "bold" | "bolder"),
    }
}

fn is_default_color(value: &str) -> bool {
    DEFAULT_TEXT_COLORS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(value))
}

fn element_tag(node: &NodeRef) -> Option<String> {
    node.as_element().map(|el| el.name.local.to_lowercase())
}

fn previous_element(node: &NodeRef) -> Option<NodeRef> {
    let mut prev = node.previous_sibling();
    while let Some(p) = prev {
        if p.as_element().is_some() {
            return Some(p);
        }
        prev = p.previous_sibling();
    }
    None
}

/// A row reached straight from its table, directly or through a leading
/// `thead`/`tbody`, is the header row.
fn is_first_table_row(row: &NodeRef) -> bool {
    if previous_element(row).is_some() {
        return false;
    }
    let Some(parent) = row.parent() else {
        return false;
    };
    match element_tag(&parent).as_deref() {
        Some("table") => true,
        Some("thead" | "tbody") => {
            previous_element(&parent).is_none()
                && parent
                    .parent()
                    .and_then(|t| element_tag(&t))
                    .is_some_and(|t| t == "table")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::parse_stylesheet;
    use kuchiki::traits::*;

    fn resolve(html: &str, css: &str, selector: &str) -> Modifiers {
        let doc = kuchiki::parse_html().one(html);
        let node = doc.select_first(selector).expect("element");
        let rules = parse_stylesheet(css).expect("css");
        resolve_style(node.as_node(), &rules, &TransformOptions::default())
    }

    #[test]
    fn inline_style_overrides_matched_rules() {
        let mods = resolve(
            r#"<p><span class="c1" style="color:#ff0000">x</span></p>"#,
            ".c1{color:#00ff00;text-align:center}",
            "span",
        );
        assert_eq!(mods.styles, "color:#ff0000;text-align:center;");
    }

    #[test]
    fn later_rule_overrides_earlier_rule() {
        let mods = resolve(
            r#"<p><span class="c1 c2">x</span></p>"#,
            ".c2{font-weight:700} .c1{font-weight:400}",
            "span",
        );
        assert!(!mods.bold);
    }

    #[test]
    fn default_colors_are_dropped() {
        for color in ["#000000", "#1155cc", "#1155CC"] {
            let html = format!(r#"<p><span style="color:{color}">x</span></p>"#);
            assert_eq!(resolve(&html, "", "span").styles, "");
        }
        let mods = resolve(r#"<p><span style="color:#990000">x</span></p>"#, "", "span");
        assert_eq!(mods.styles, "color:#990000;");
    }

    #[test]
    fn derives_modifier_flags() {
        let mods = resolve(
            r#"<p><span style="font-weight:700;font-style:italic;font-family:&quot;Consolas&quot;,monospace">x</span></p>"#,
            "",
            "span",
        );
        assert!(mods.bold && mods.italic && mods.monospace);
        assert_eq!(mods.styles, "");
    }

    #[test]
    fn quote_indent_only_applies_to_paragraphs() {
        let css = ".q{margin-left:36pt}";
        assert!(resolve(r#"<p class="q">x</p>"#, css, "p").quoted);
        assert!(!resolve(r#"<div class="q">x</div>"#, css, "div").quoted);
        assert!(!resolve(r#"<p style="margin-left:72pt">x</p>"#, "", "p").quoted);
    }

    #[test]
    fn underline_is_emitted_once() {
        let mods = resolve(
            r#"<p><span style="text-decoration:underline;text-decoration-line:underline">x</span></p>"#,
            "",
            "span",
        );
        assert_eq!(mods.styles, "text-decoration:underline;");
    }

    #[test]
    fn heading_children_keep_alignment_only() {
        let mods = resolve(
            r#"<h2><span style="color:#ff0000;text-align:right;text-decoration:underline">x</span></h2>"#,
            "",
            "span",
        );
        assert_eq!(mods.styles, "text-align:right;");
    }

    #[test]
    fn anchor_children_keep_color() {
        let mods = resolve(
            r#"<p><a href="x"><span style="color:#ff0000;text-decoration:underline">x</span></a></p>"#,
            "",
            "span",
        );
        assert_eq!(mods.styles, "color:#ff0000;");
    }

    #[test]
    fn list_items_only_detect_code_font() {
        let mods = resolve(
            r#"<ul><li style="color:#ff0000;text-align:left;font-family:Consolas">x</li></ul>"#,
            "",
            "li",
        );
        assert_eq!(mods.styles, "");
        assert!(mods.monospace);
    }

    #[test]
    fn tables_get_full_width() {
        let mods = resolve("<table><tr><td>x</td></tr></table>", "", "table");
        assert_eq!(mods.styles, "width:100%;");
    }

    #[test]
    fn first_row_is_bold() {
        let html = "<table><tbody><tr><td>h</td></tr><tr id=\"second\"><td>v</td></tr></tbody></table>";
        assert!(resolve(html, "", "tr").bold);
        assert!(!resolve(html, "", "#second").bold);
    }
}
