use kuchiki::NodeRef;
use tracing::debug;
use url::Url;

/// Target of a redirector link (`...?q=<target>`), if `href` is one.
pub fn redirect_target(href: &str) -> Result<Option<String>, url::ParseError> {
    let url = Url::parse(href)?;
    let target = url
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned());
    Ok(target)
}

/// Replaces redirector hrefs on every anchor under `root` with their target.
pub fn rewrite_links(root: &NodeRef) {
    let Ok(anchors) = root.select("a[href]") else {
        return;
    };
    for anchor in anchors {
        let mut attrs = anchor.attributes.borrow_mut();
        let Some(href) = attrs.get("href").map(str::to_string) else {
            continue;
        };
        match redirect_target(&href) {
            Ok(Some(target)) => {
                attrs.insert("href", target);
            }
            Ok(None) => {}
            Err(err) => debug!(%href, %err, "leaving unparseable link alone"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::*;

    #[test]
    fn unwraps_redirector() {
        assert_eq!(
            redirect_target("https://www.google.com/url?q=https://example.com/x&other=1")
                .expect("url")
                .as_deref(),
            Some("https://example.com/x")
        );
        assert_eq!(
            redirect_target("https://www.google.com/url?q=https%3A%2F%2Fexample.com%2F%3Fa%3D1&sa=D")
                .expect("url")
                .as_deref(),
            Some("https://example.com/?a=1")
        );
    }

    #[test]
    fn leaves_plain_and_relative_links() {
        assert_eq!(redirect_target("https://example.com/?page=2").expect("url"), None);
        assert!(redirect_target("#heading").is_err());
    }

    #[test]
    fn rewrites_anchors_in_place() {
        let doc = kuchiki::parse_html().one(
            r##"<p><a href="https://www.google.com/url?q=https://example.com/x&amp;other=1">x</a><a href="#h.1">y</a><a>z</a></p>"##,
        );
        rewrite_links(&doc);
        let hrefs: Vec<Option<String>> = doc
            .select("a")
            .expect("select")
            .map(|a| a.attributes.borrow().get("href").map(str::to_string))
            .collect();
        assert_eq!(
            hrefs,
            vec![
                Some("https://example.com/x".to_string()),
                Some("#h.1".to_string()),
                None
            ]
        );
    }
}
