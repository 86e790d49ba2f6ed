//! Stylesheet rewriting by pattern substitution.
//!
//! Only `url(...)` and `@import "..."` are recognised. This is not a CSS
//! parser: URLs containing quotes or `)` and escaped characters inside
//! `url()` are left as the patterns happen to match them.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::rewriter::RewriteContext;

fn css_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)url\(\s*(?:"(?P<dq>[^'")]+)"|'(?P<sq>[^'")]+)'|(?P<bare>[^'")]+))\s*\)"#,
        )
        .expect("url() pattern is valid")
    })
}

fn css_import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)@import\s+(?:"(?P<dq>[^'"]+)"|'(?P<sq>[^'"]+)')"#)
            .expect("@import pattern is valid")
    })
}

/// Returns the quote character and the URL text of a match.
fn quoted_url<'t>(caps: &Captures<'t>) -> (&'static str, &'t str) {
    if let Some(m) = caps.name("dq") {
        ("\"", m.as_str())
    } else if let Some(m) = caps.name("sq") {
        ("'", m.as_str())
    } else {
        ("", caps.name("bare").map(|m| m.as_str()).unwrap_or_default())
    }
}

/// Rewrites `url()` and `@import` references in stylesheet or inline style
/// text, keeping each reference's quoting style.
pub fn rewrite_css(css: &str, ctx: &mut RewriteContext<'_>) -> String {
    let with_urls = css_url_regex().replace_all(css, |caps: &Captures| {
        let (quote, raw) = quoted_url(caps);
        let rewritten = ctx.rewrite_url(raw.trim());
        format!("url({quote}{rewritten}{quote})")
    });

    css_import_regex()
        .replace_all(&with_urls, |caps: &Captures| {
            let (quote, raw) = quoted_url(caps);
            let quote = if quote.is_empty() { "\"" } else { quote };
            let rewritten = ctx.rewrite_url(raw.trim());
            format!("@import {quote}{rewritten}{quote}")
        })
        .into_owned()
}
