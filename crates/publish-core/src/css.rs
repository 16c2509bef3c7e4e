use cssparser::{
    AtRuleParser, AtRuleType, BasicParseErrorKind, CowRcStr, DeclarationListParser,
    DeclarationParser, ParseError, ParseErrorKind, Parser, ParserInput, QualifiedRuleParser,
    RuleListParser, SourceLocation, ToCss, Token,
};
use kuchiki::ElementData;
use tracing::debug;

use crate::error::PublishError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    Tag(String),
    Id(String),
    Class(String),
}

impl SimpleSelector {
    fn matches(&self, tag: &str, id: Option<&str>, classes: &[&str]) -> bool {
        match self {
            SimpleSelector::Tag(name) => name.eq_ignore_ascii_case(tag),
            SimpleSelector::Id(want) => id == Some(want.as_str()),
            SimpleSelector::Class(want) => classes.contains(&want.as_str()),
        }
    }
}

/// Space separated tokens; every token has to hold for the same element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub parts: Vec<SimpleSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<(String, String)>,
}

impl StyleRule {
    pub fn matches(&self, el: &ElementData) -> bool {
        let attrs = el.attributes.borrow();
        let tag = el.name.local.as_ref();
        let id = attrs.get("id");
        let classes: Vec<&str> = attrs
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default();
        self.selectors.iter().any(|sel| {
            !sel.parts.is_empty() && sel.parts.iter().all(|p| p.matches(tag, id, &classes))
        })
    }
}

/// Rules whose selector list matches `el`, in stylesheet order.
pub fn matching_rules<'r>(el: &ElementData, rules: &'r [StyleRule]) -> Vec<&'r StyleRule> {
    rules.iter().filter(|rule| rule.matches(el)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleError {
    EmptySelector,
    StrayToken(String),
}

fn malformed(err: ParseError<'_, RuleError>) -> PublishError {
    let reason = match err.kind {
        ParseErrorKind::Custom(RuleError::EmptySelector) => "empty selector".to_string(),
        ParseErrorKind::Custom(RuleError::StrayToken(token)) => {
            format!("unexpected '{token}' in selector")
        }
        ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => {
            "unexpected end of input".to_string()
        }
        ParseErrorKind::Basic(kind) => format!("{kind:?}"),
    };
    PublishError::MalformedStylesheet {
        line: err.location.line + 1,
        column: err.location.column,
        reason,
    }
}

// At-rules that carry a block rather than ending at `;`.
fn at_rule_has_block(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.ends_with("keyframes")
        || matches!(
            name.as_str(),
            "media"
                | "supports"
                | "font-face"
                | "page"
                | "document"
                | "-moz-document"
                | "container"
                | "counter-style"
                | "font-feature-values"
                | "property"
                | "scope"
                | "starting-style"
                | "viewport"
        )
}

/// Top level of a stylesheet: style rules are kept, at-rules are consumed and dropped.
struct StylesheetRules;

impl<'i> QualifiedRuleParser<'i> for StylesheetRules {
    type Prelude = Vec<Selector>;
    type QualifiedRule = Option<StyleRule>;
    type Error = RuleError;

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Vec<Selector>, ParseError<'i, RuleError>> {
        parse_selector_list(input)
    }

    fn parse_block<'t>(
        &mut self,
        selectors: Vec<Selector>,
        _location: SourceLocation,
        input: &mut Parser<'i, 't>,
    ) -> Result<Option<StyleRule>, ParseError<'i, RuleError>> {
        let mut declarations = Vec::new();
        for result in DeclarationListParser::new(input, Declarations) {
            declarations.push(result.map_err(|(err, _)| err)?);
        }
        Ok(Some(StyleRule {
            selectors,
            declarations,
        }))
    }
}

impl<'i> AtRuleParser<'i> for StylesheetRules {
    type PreludeNoBlock = ();
    type PreludeBlock = ();
    type AtRule = Option<StyleRule>;
    type Error = RuleError;

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<AtRuleType<(), ()>, ParseError<'i, RuleError>> {
        while input.next().is_ok() {}
        debug!(rule = %&*name, "skipping at-rule");
        if at_rule_has_block(&name) {
            Ok(AtRuleType::WithBlock(()))
        } else {
            Ok(AtRuleType::WithoutBlock(()))
        }
    }

    fn rule_without_block(&mut self, _prelude: (), _location: SourceLocation) -> Option<StyleRule> {
        None
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: (),
        _location: SourceLocation,
        input: &mut Parser<'i, 't>,
    ) -> Result<Option<StyleRule>, ParseError<'i, RuleError>> {
        while input.next().is_ok() {}
        Ok(None)
    }
}

/// `property: value` pairs; the value is kept as written, minus `!important`.
struct Declarations;

impl<'i> DeclarationParser<'i> for Declarations {
    type Declaration = (String, String);
    type Error = RuleError;

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<(String, String), ParseError<'i, RuleError>> {
        let start = input.position();
        while input.next().is_ok() {}
        let value = input.slice_from(start).trim();
        let value = value
            .strip_suffix("!important")
            .map(str::trim_end)
            .unwrap_or(value);
        Ok((name.to_ascii_lowercase(), value.to_string()))
    }
}

impl<'i> AtRuleParser<'i> for Declarations {
    type PreludeNoBlock = ();
    type PreludeBlock = ();
    type AtRule = (String, String);
    type Error = RuleError;
}

/// Comma separated selectors made of tag, `#id` and `.class` tokens. Selectors
/// using anything else (combinators, pseudo-classes, attributes) can never match
/// and are left out.
fn parse_selector_list<'i>(
    input: &mut Parser<'i, '_>,
) -> Result<Vec<Selector>, ParseError<'i, RuleError>> {
    let mut selectors = Vec::new();
    let mut parts = Vec::new();
    let mut supported = true;
    let mut seen_token = false;
    loop {
        let location = input.current_source_location();
        let token = match input.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        seen_token = true;
        match &token {
            Token::Comma => {
                if supported && !parts.is_empty() {
                    selectors.push(Selector {
                        parts: std::mem::take(&mut parts),
                    });
                }
                parts.clear();
                supported = true;
            }
            Token::Ident(name) => parts.push(SimpleSelector::Tag(name.to_ascii_lowercase())),
            Token::IDHash(id) | Token::Hash(id) => parts.push(SimpleSelector::Id(id.to_string())),
            Token::Delim('.') => match input.next_including_whitespace() {
                Ok(Token::Ident(class)) => parts.push(SimpleSelector::Class(class.to_string())),
                _ => supported = false,
            },
            Token::CloseCurlyBracket
            | Token::CloseParenthesis
            | Token::CloseSquareBracket
            | Token::Semicolon
            | Token::BadString(_)
            | Token::BadUrl(_) => {
                return Err(location.new_custom_error(RuleError::StrayToken(token.to_css_string())));
            }
            _ => supported = false,
        }
    }
    if !seen_token {
        return Err(input.new_custom_error(RuleError::EmptySelector));
    }
    if supported && !parts.is_empty() {
        selectors.push(Selector { parts });
    }
    Ok(selectors)
}

/// Parses a stylesheet into its plain style rules. At-rules are skipped.
pub fn parse_stylesheet(css: &str) -> Result<Vec<StyleRule>, PublishError> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut rules = Vec::new();
    for result in RuleListParser::new_for_stylesheet(&mut parser, StylesheetRules) {
        match result {
            Ok(Some(rule)) => rules.push(rule),
            Ok(None) => {}
            Err((err, _)) => return Err(malformed(err)),
        }
    }
    Ok(rules)
}

/// Lenient parse of a `style` attribute; malformed pieces are dropped.
pub fn parse_inline_style(style: &str) -> Vec<(String, String)> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    DeclarationListParser::new(&mut parser, Declarations)
        .filter_map(Result::ok)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::*;

    fn element(html: &str, selector: &str) -> kuchiki::NodeDataRef<ElementData> {
        kuchiki::parse_html()
            .one(html)
            .select_first(selector)
            .expect("element")
    }

    #[test]
    fn parses_exporter_style_block() {
        let css = r#"@import url('https://themes.example.com/fonts/css?kit=abc');
            ol{margin:0;padding:0}
            .c1{color:#000000;font-weight:700;font-family:"Consolas"}
            /* comment */
            table td,table th{padding:0}
            .lst-kix_a>li:before{content:"\0025cf;  "}"#;
        let rules = parse_stylesheet(css).expect("parse");
        assert_eq!(rules.len(), 4);
        assert_eq!(
            rules[1].declarations,
            vec![
                ("color".to_string(), "#000000".to_string()),
                ("font-weight".to_string(), "700".to_string()),
                ("font-family".to_string(), "\"Consolas\"".to_string()),
            ]
        );
        assert_eq!(rules[2].selectors.len(), 2);
        assert_eq!(rules[3].declarations[0].1, "\"\\0025cf;  \"");
    }

    #[test]
    fn skips_block_at_rules() {
        let rules = parse_stylesheet("@media print{p{color:red}} p{color:blue}").expect("parse");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].declarations[0].1, "blue");
    }

    #[test]
    fn rejects_broken_stylesheets() {
        for css in ["p color:red", "}", "p{color}", "{color:red}", "p{a:1} ) q{b:2}"] {
            assert!(
                matches!(
                    parse_stylesheet(css),
                    Err(PublishError::MalformedStylesheet { .. })
                ),
                "{css} should be rejected"
            );
        }
    }

    #[test]
    fn strings_may_hold_comment_openers_and_escaped_quotes() {
        let rules = parse_stylesheet(r#".c1{content:"/*"} .c2{color:red}"#).expect("comment in string");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].declarations[0].1, r#""/*""#);
        assert_eq!(rules[1].declarations, vec![("color".to_string(), "red".to_string())]);

        let rules = parse_stylesheet(r#".c1{content:"\""} .c2{color:red}"#).expect("escaped quote");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].declarations[0].1, "red");
    }

    #[test]
    fn unclosed_trailing_block_and_comment_are_tolerated() {
        let rules = parse_stylesheet("p{color:red").expect("unclosed block");
        assert_eq!(rules[0].declarations[0].1, "red");
        assert!(parse_stylesheet("p{color:red} /* trailing").expect("open comment").len() == 1);
    }

    #[test]
    fn complex_selectors_never_match() {
        let rules = parse_stylesheet(".lst>li:before{a:1} ul li, .c1{b:2}").expect("parse");
        assert!(rules[0].selectors.is_empty());
        assert_eq!(rules[1].selectors.len(), 2);
        let span = element(r#"<span class="c1">t</span>"#, "span");
        let matched: Vec<&str> = matching_rules(&span, &rules)
            .iter()
            .map(|r| r.declarations[0].0.as_str())
            .collect();
        assert_eq!(matched, vec!["b"]);
    }

    #[test]
    fn matches_tag_id_and_class() {
        let rules = parse_stylesheet(".c1{a:1} #x{b:2} span{c:3} p{d:4} .c1 .c2{e:5} .c1 .c9{f:6}")
            .expect("parse");
        let span = element(r#"<span id="x" class="c1 c2">t</span>"#, "span");
        let matched: Vec<&str> = matching_rules(&span, &rules)
            .iter()
            .map(|r| r.declarations[0].0.as_str())
            .collect();
        assert_eq!(matched, vec!["a", "b", "c", "e"]);
    }

    #[test]
    fn inline_style_is_lenient() {
        let decls = parse_inline_style("width: 50.0px; nonsense; height:20px !important;");
        assert_eq!(
            decls,
            vec![
                ("width".to_string(), "50.0px".to_string()),
                ("height".to_string(), "20px".to_string()),
            ]
        );
    }
}
