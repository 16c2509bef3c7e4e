use once_cell::sync::Lazy;
use regex::Regex;
use syntect::{
    highlighting::{Theme, ThemeSet},
    html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

/// Canonical language names paired with the syntect token that renders them.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("bash", "sh"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("csharp", "cs"),
    ("css", "css"),
    ("go", "go"),
    ("haskell", "hs"),
    ("html", "html"),
    ("java", "java"),
    ("javascript", "js"),
    ("json", "json"),
    ("lua", "lua"),
    ("makefile", "makefile"),
    ("php", "php"),
    ("python", "py"),
    ("ruby", "rb"),
    ("rust", "rs"),
    ("sql", "sql"),
    ("xml", "xml"),
    ("yaml", "yaml"),
];

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);
static THEME: Lazy<Theme> = Lazy::new(|| {
    THEMES
        .themes
        .get("InspiredGitHub")
        .cloned()
        .or_else(|| THEMES.themes.values().next().cloned())
        .unwrap_or_default()
});

const CLASS_STYLE: ClassStyle = ClassStyle::Spaced;

struct Signature {
    lang: &'static str,
    weight: u32,
    pattern: Regex,
}

fn sig(lang: &'static str, weight: u32, pattern: &str) -> Option<Signature> {
    Regex::new(pattern).ok().map(|pattern| Signature {
        lang,
        weight,
        pattern,
    })
}

// Multiline patterns; each match of a signature adds its weight once.
static SIGNATURES: Lazy<Vec<Signature>> = Lazy::new(|| {
    [
        sig("python", 3, r"(?m)^\s*def \w+\(.*\)\s*(->\s*[\w\[\], ]+)?:\s*$"),
        sig("python", 2, r"(?m)^\s*(from [\w.]+ )?import [\w., ]+$"),
        sig("python", 2, r"\bprint\(.*\)"),
        sig("python", 2, r"(?m)^\s*(elif|except|with) .*:\s*$"),
        sig("python", 1, r"\bself\.\w+"),
        sig("python", 1, r"\b(None|True|False)\b"),
        sig("rust", 4, r"\bfn \w+(<[^>]*>)?\(.*\)(\s*->\s*[^{]+)?\s*\{"),
        sig("rust", 3, r"\blet mut \w+"),
        sig("rust", 2, r"\b(impl|pub fn|pub struct|use \w+::)\b"),
        sig("rust", 2, r"\w+!\("),
        sig("rust", 1, r"&(mut )?self\b"),
        sig("csharp", 3, r"\bnamespace [\w.]+"),
        sig("csharp", 3, r"\busing System(\.[\w.]+)?;"),
        sig("csharp", 2, r"\b(public|private|internal|protected) (static |async |override )*[\w<>\[\]]+ \w+\("),
        sig("csharp", 2, r"\bvar \w+ = new \w+"),
        sig("csharp", 2, r"\bawait \w+Async\("),
        sig("csharp", 1, r"\b(Console\.WriteLine|string\.Empty)\b"),
        sig("java", 3, r"\bpublic static void main\(String"),
        sig("java", 3, r"\bSystem\.out\.print"),
        sig("java", 2, r"(?m)^\s*import java\."),
        sig("java", 1, r"@Override"),
        sig("javascript", 3, r"\bconsole\.log\("),
        sig("javascript", 3, r"\b(const|let) \w+ = (require\(|async |\(.*\) =>)"),
        sig("javascript", 2, r"\bfunction \w*\s*\(.*\)\s*\{"),
        sig("javascript", 2, r"=> \{"),
        sig("javascript", 1, r"\b(undefined|document\.|window\.)"),
        sig("go", 4, r"(?m)^package \w+$"),
        sig("go", 3, r"\bfunc (\(\w+ \*?\w+\) )?\w+\("),
        sig("go", 2, r":= "),
        sig("go", 2, r"\bfmt\.\w+\("),
        sig("c", 3, r"(?m)^#include <\w+\.h>"),
        sig("c", 2, r"\b(printf|malloc|free)\("),
        sig("c", 1, r"\bint main\("),
        sig("cpp", 3, r"(?m)^#include <\w+>"),
        sig("cpp", 3, r"\bstd::\w+"),
        sig("cpp", 2, r"\b(template<|cout <<|nullptr)"),
        sig("ruby", 3, r"(?m)^\s*def \w+[?!]?(\(.*\))?\s*$"),
        sig("ruby", 3, r"(?m)^\s*end\s*$"),
        sig("ruby", 2, r"\b(puts|require|attr_accessor) "),
        sig("ruby", 1, r"\bdo \|\w+\|"),
        sig("php", 4, r"<\?php"),
        sig("php", 2, r"\$\w+->\w+"),
        sig("php", 1, r"\becho \$"),
        sig("lua", 3, r"\blocal \w+ = "),
        sig("lua", 3, r"\bfunction \w+[.:]?\w*\(.*\)\s*$"),
        sig("lua", 2, r"\bthen\b|\bend\b"),
        sig("lua", 1, r"~="),
        sig("haskell", 3, r"(?m)^\w+ :: .+$"),
        sig("haskell", 2, r"(?m)^import qualified "),
        sig("haskell", 1, r"\bwhere$"),
        sig("sql", 4, r"(?i)\bselect\b[\s\S]+\bfrom\b"),
        sig("sql", 3, r"(?i)\b(insert into|create table|update \w+ set|delete from)\b"),
        sig("sql", 1, r"(?i)\b(where|join|group by|order by)\b"),
        sig("html", 4, r"(?i)<!doctype html"),
        sig("html", 3, r"(?i)</?(div|span|body|head|html|script|p|a)( [^>]*)?>"),
        sig("xml", 4, r"<\?xml "),
        sig("xml", 2, r"<\w+:\w+[ >]"),
        sig("css", 3, r"(?m)^\s*[.#]?[\w-]+(\s*[\w.#:-]+)*\s*\{\s*$"),
        sig("css", 3, r"(?m)^\s*[\w-]+:\s*[^;{]+;\s*$"),
        sig("json", 4, r#"^\s*[\[{]\s*"[\w-]+"\s*:"#),
        sig("json", 1, r#""[\w-]+"\s*:\s*("|\d|\[|\{|true|false|null)"#),
        sig("yaml", 3, r"(?m)^---\s*$"),
        sig("yaml", 2, r"(?m)^\s*[\w-]+:( [^{};]+)?$"),
        sig("yaml", 2, r"(?m)^\s*- [\w-]+:"),
        sig("makefile", 4, r"(?m)^[\w.-]+:( [\w. -]+)?\n\t"),
        sig("makefile", 2, r"\$\(\w+\)"),
        sig("bash", 3, r"(?m)^\s*(sudo |apt(-get)? |cd |ls |echo |export |curl |git |docker |cargo |npm )"),
        sig("bash", 2, r"(?m)^\s*(if \[|fi$|then$|done$|for \w+ in )"),
        sig("bash", 1, r"\$\{?\w+\}?"),
    ]
    .into_iter()
    .flatten()
    .collect()
});

fn syntax_for(lang: &str) -> Option<&'static SyntaxReference> {
    let token = SUPPORTED_LANGUAGES
        .iter()
        .find(|(name, _)| *name == lang)
        .map(|(_, token)| *token)?;
    SYNTAXES.find_syntax_by_token(token)
}

fn canonical_name(syntax: &SyntaxReference) -> Option<&'static str> {
    SUPPORTED_LANGUAGES.iter().find_map(|(name, token)| {
        let matches = SYNTAXES
            .find_syntax_by_token(token)
            .is_some_and(|s| s.name == syntax.name);
        matches.then_some(*name)
    })
}

pub fn is_supported(lang: &str) -> bool {
    syntax_for(lang).is_some()
}

/// Best-effort guess of the language of a code snippet.
///
/// First-line markers (shebangs, `<?xml`, `<?php`) win outright; otherwise the
/// language whose signatures score highest is returned.
pub fn detect_language(code: &str) -> Option<&'static str> {
    let first_line = code.lines().next().unwrap_or_default();
    if let Some(lang) = SYNTAXES
        .find_syntax_by_first_line(first_line)
        .and_then(canonical_name)
    {
        return Some(lang);
    }
    let mut scores: Vec<(&'static str, u32)> = Vec::new();
    for sig in SIGNATURES.iter() {
        if !sig.pattern.is_match(code) {
            continue;
        }
        match scores.iter_mut().find(|(lang, _)| *lang == sig.lang) {
            Some((_, score)) => *score += sig.weight,
            None => scores.push((sig.lang, sig.weight)),
        }
    }
    // First best in table order keeps ties deterministic.
    let mut best: Option<(&'static str, u32)> = None;
    for (lang, score) in scores {
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((lang, score));
        }
    }
    best.map(|(lang, _)| lang)
}

/// Renders `code` as class-annotated HTML suitable for a `<code>` element.
pub fn highlight_html(lang: &str, code: &str) -> String {
    let Some(syntax) = syntax_for(lang) else {
        return escape_html(code);
    };
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAXES, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        if generator
            .parse_html_for_line_which_includes_newline(line)
            .is_err()
        {
            return escape_html(code);
        }
    }
    generator.finalize()
}

/// Stylesheet matching the class names emitted by [`highlight_html`].
pub fn theme_css() -> Option<String> {
    css_for_theme_with_class_style(&THEME, CLASS_STYLE).ok()
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
