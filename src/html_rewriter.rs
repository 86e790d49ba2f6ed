//! HTML rewriting that leaves untouched markup byte-for-byte as it was.
//!
//! A small scanner splits the document into text, comments, declarations,
//! CDATA sections and tags. Only tags go through the html5ever tokenizer;
//! everything else, including character references in text and the bodies
//! of raw-text elements, is copied from the source. A tag is re-serialized
//! only when one of its attribute values was rewritten. `<style>` bodies
//! are passed through the CSS rewriter.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
    TokenizerResult,
};

use crate::css::rewrite_css;
use crate::rewriter::RewriteContext;

/// How the value of an attribute is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributePolicy {
    Url,
    SrcSet,
    InlineCss,
    Keep,
}

/// Attributes holding a single URL, per tag.
const URL_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("img", &["src", "data-src", "data-lazy-src"]),
    ("script", &["src"]),
    ("link", &["href"]),
    ("source", &["src"]),
    ("video", &["src", "poster"]),
    ("audio", &["src"]),
    ("iframe", &["src"]),
    ("embed", &["src"]),
    ("object", &["data"]),
];

pub fn attribute_policy(tag: &str, attribute: &str) -> AttributePolicy {
    match attribute {
        "srcset" | "data-srcset" => AttributePolicy::SrcSet,
        "style" => AttributePolicy::InlineCss,
        _ if URL_ATTRIBUTES
            .iter()
            .any(|(name, attributes)| *name == tag && attributes.contains(&attribute)) =>
        {
            AttributePolicy::Url
        }
        _ => AttributePolicy::Keep,
    }
}

/// Elements whose content is not markup. Their bodies run up to the
/// matching end tag and are never scanned for tags.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "title", "textarea", "xmp", "iframe", "noembed", "noframes",
];

/// Rewrites every internal reference of an HTML document and returns the
/// rewritten document.
pub fn rewrite_html(html: &str, ctx: &mut RewriteContext<'_>) -> String {
    HtmlRewriter::new(ctx).run(html)
}

struct HtmlRewriter<'c, 'a> {
    ctx: &'c mut RewriteContext<'a>,
    out: String,
    base_seen: bool,
    // Nesting depth of <svg>/<math>: CDATA sections only exist there.
    foreign_depth: usize,
}

impl<'c, 'a> HtmlRewriter<'c, 'a> {
    fn new(ctx: &'c mut RewriteContext<'a>) -> Self {
        Self {
            ctx,
            out: String::new(),
            base_seen: false,
            foreign_depth: 0,
        }
    }

    fn run(mut self, html: &str) -> String {
        let mut rest = html;
        while let Some(at) = rest.find('<') {
            self.out.push_str(&rest[..at]);
            rest = self.markup(&rest[at..]);
        }
        self.out.push_str(rest);
        self.out
    }

    /// Consumes one construct starting at `<` and returns what follows it.
    fn markup<'h>(&mut self, input: &'h str) -> &'h str {
        let after = &input[1..];

        if let Some(body) = after.strip_prefix("!--") {
            return self.copy(input, 4 + comment_len(body));
        }
        if self.foreign_depth > 0 && after.starts_with("![CDATA[") {
            let len = input.find("]]>").map_or(input.len(), |end| end + 3);
            return self.copy(input, len);
        }

        let name_start = if after.starts_with('/') { 2 } else { 1 };
        let starts_name = input[name_start..].starts_with(|c: char| c.is_ascii_alphabetic());
        if after.starts_with(['!', '?']) || (name_start == 2 && !starts_name) {
            // Declarations, processing instructions and bogus comments.
            let len = input.find('>').map_or(input.len(), |end| end + 1);
            return self.copy(input, len);
        }
        if !starts_name {
            return self.copy(input, 1);
        }

        let Some(len) = tag_len(input) else {
            return self.copy(input, input.len());
        };
        let (source, rest) = input.split_at(len);
        match parse_tag(source) {
            Some(tag) => self.handle_tag(source, tag, rest),
            None => {
                self.out.push_str(source);
                rest
            }
        }
    }

    fn copy<'h>(&mut self, input: &'h str, len: usize) -> &'h str {
        let (copied, rest) = input.split_at(len);
        self.out.push_str(copied);
        rest
    }

    fn handle_tag<'h>(&mut self, source: &str, tag: Tag, rest: &'h str) -> &'h str {
        let name: &str = &tag.name;
        match tag.kind {
            TagKind::StartTag if name == "base" && self.foreign_depth == 0 => {
                self.adopt_base(&tag);
                rest
            }
            TagKind::EndTag if name == "base" => rest,
            TagKind::StartTag => {
                self.write_start_tag(source, &tag);
                if tag.self_closing {
                    return rest;
                }
                if matches!(name, "svg" | "math") {
                    self.foreign_depth += 1;
                    return rest;
                }
                if self.foreign_depth > 0 {
                    return rest;
                }
                self.raw_text(name, rest)
            }
            TagKind::EndTag => {
                if self.foreign_depth > 0 && matches!(name, "svg" | "math") {
                    self.foreign_depth -= 1;
                }
                self.out.push_str(source);
                rest
            }
        }
    }

    // Dropped: rewritten references are already relative to the mirrored
    // file, a <base> would redirect them. Only the first one changes how the
    // rest of the document resolves.
    fn adopt_base(&mut self, tag: &Tag) {
        for attr in &tag.attrs {
            if &*attr.name.local == "href" && !attr.value.trim().is_empty() {
                self.ctx.rewrite_url(&attr.value);
                if !self.base_seen {
                    if let Ok(base) = self.ctx.base_url().join(attr.value.trim()) {
                        self.ctx.set_base_url(base);
                    }
                    self.base_seen = true;
                }
            }
        }
    }

    /// Copies the body of a raw-text element, rewriting it for `<style>`.
    fn raw_text<'h>(&mut self, name: &str, rest: &'h str) -> &'h str {
        if name == "plaintext" {
            self.out.push_str(rest);
            return "";
        }
        if !RAW_TEXT_ELEMENTS.contains(&name) {
            return rest;
        }

        let end = find_end_tag(rest, name).unwrap_or(rest.len());
        let (body, rest) = rest.split_at(end);
        if name == "style" {
            let css = rewrite_css(body, self.ctx);
            self.out.push_str(&css);
        } else {
            self.out.push_str(body);
        }
        rest
    }

    fn write_start_tag(&mut self, source: &str, tag: &Tag) {
        let tag_name: &str = &tag.name;
        let mut changed = false;
        let mut attributes = Vec::with_capacity(tag.attrs.len());

        for attr in &tag.attrs {
            let attr_name: &str = &attr.name.local;
            let value = match attribute_policy(tag_name, attr_name) {
                AttributePolicy::Url => self.ctx.rewrite_url(&attr.value),
                AttributePolicy::SrcSet => self.ctx.rewrite_srcset(&attr.value),
                AttributePolicy::InlineCss => rewrite_css(&attr.value, self.ctx),
                AttributePolicy::Keep => attr.value.to_string(),
            };
            changed |= value.as_str() != &*attr.value;
            attributes.push((attr_name, value));
        }

        if !changed {
            self.out.push_str(source);
            return;
        }

        self.out.push('<');
        self.out.push_str(tag_name);
        for (attr_name, value) in attributes {
            self.out.push(' ');
            self.out.push_str(attr_name);
            if !value.is_empty() {
                self.out.push_str("=\"");
                escape_attribute(&value, &mut self.out);
                self.out.push('"');
            }
        }
        if tag.self_closing {
            self.out.push_str(" />");
        } else {
            self.out.push('>');
        }
    }
}

/// Collects the single tag a tag's source text tokenizes to.
#[derive(Default)]
struct TagCollector {
    tag: Option<Tag>,
}

impl TokenSink for TagCollector {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        if let Token::TagToken(tag) = token {
            self.tag = Some(tag);
        }
        TokenSinkResult::Continue
    }
}

fn parse_tag(source: &str) -> Option<Tag> {
    let mut tokenizer = Tokenizer::new(TagCollector::default(), TokenizerOpts::default());
    let mut input = BufferQueue::new();
    input.push_back(StrTendril::from_slice(source));
    // The collector never asks for a script to run, so feeding runs to the end.
    let TokenizerResult::Done = tokenizer.feed(&mut input) else {
        return None;
    };
    tokenizer.end();
    tokenizer.sink.tag
}

/// Length of the comment body after `<!--`, closing delimiter included.
fn comment_len(body: &str) -> usize {
    if body.starts_with('>') {
        return 1;
    }
    if body.starts_with("->") {
        return 2;
    }
    [
        body.find("-->").map(|end| end + 3),
        body.find("--!>").map(|end| end + 4),
    ]
    .into_iter()
    .flatten()
    .min()
    .unwrap_or(body.len())
}

/// Length of the tag starting at `input`, honouring quoted attribute values.
/// `None` when the input ends inside the tag.
fn tag_len(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut after_equals = false;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'>' => return Some(i + 1),
            b'=' => after_equals = true,
            quote @ (b'"' | b'\'') if after_equals => {
                i += 1 + input[i + 1..].find(char::from(quote))?;
                after_equals = false;
            }
            c if c.is_ascii_whitespace() => {}
            _ => after_equals = false,
        }
        i += 1;
    }
    None
}

/// Offset of the end tag closing a raw-text element named `name`.
fn find_end_tag(text: &str, name: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(found) = text[from..].find("</") {
        let start = from + found;
        let name_end = start + 2 + name.len();
        let name_matches = bytes
            .get(start + 2..name_end)
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name.as_bytes()));
        let terminated = match bytes.get(name_end) {
            Some(&c) => c == b'>' || c == b'/' || c.is_ascii_whitespace(),
            None => true,
        };
        if name_matches && terminated {
            return Some(start);
        }
        from = start + 2;
    }
    None
}

/// Escapes a re-serialized attribute value. Non-ASCII characters become
/// numeric references so the value reads the same whatever the charset the
/// page declares.
fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c if !c.is_ascii() => out.push_str(&format!("&#x{:X};", u32::from(c))),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewriter::Schedule;
    use crate::site::TargetSite;
    use url::Url;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Schedule for Recorder {
        fn schedule(&mut self, url: &str) {
            self.0.push(url.to_string());
        }
    }

    fn rewrite(html: &str, base: &str, local: &str, recorder: &mut Recorder) -> String {
        let site = TargetSite::new("https://example.com/").unwrap();
        let base = Url::parse(base).unwrap();
        let mut ctx = RewriteContext::new(&site, &base, local, recorder);
        rewrite_html(html, &mut ctx)
    }

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<base href="/docs/">
<link rel="stylesheet" href="/css/site.css">
<style>body { background: url("/img/bg.png"); }</style>
<script src="/js/app.js"></script>
<script>if (a < b && c > d) { location.href = "/x"; }</script>
</head>
<body class=main>
<!-- nav -->
<a href="/about">About</a>
<a href="https://other.com/">Out</a>
<a href="mailto:a@b.com">Mail</a>
<img src="/a.jpg" srcset="/a.jpg 1x, /b.jpg 2x" alt="A &amp; B">
<div style="background-image: url(/img/hero.jpg)">x</div>
<br/>
<p>Fish &amp; chips</p>
</body>
</html>
"#;

    #[test]
    fn test_attribute_policy_table() {
        assert_eq!(attribute_policy("a", "href"), AttributePolicy::Url);
        assert_eq!(attribute_policy("img", "data-lazy-src"), AttributePolicy::Url);
        assert_eq!(attribute_policy("object", "data"), AttributePolicy::Url);
        assert_eq!(attribute_policy("source", "srcset"), AttributePolicy::SrcSet);
        assert_eq!(attribute_policy("div", "style"), AttributePolicy::InlineCss);
        assert_eq!(attribute_policy("div", "href"), AttributePolicy::Keep);
        assert_eq!(attribute_policy("a", "title"), AttributePolicy::Keep);
    }

    #[test]
    fn test_page_references_are_rewritten() {
        let mut recorder = Recorder::default();
        let out = rewrite(PAGE, "https://example.com/", "index.html", &mut recorder);

        assert!(out.starts_with("<!DOCTYPE html>\n<html>\n<head>\n\n<link"));
        assert!(out.contains(r#"<link rel="stylesheet" href="css/site.css">"#));
        assert!(out.contains(r#"<style>body { background: url("img/bg.png"); }</style>"#));
        assert!(out.contains(r#"<script src="js/app.js"></script>"#));
        assert!(out.contains(r#"<script>if (a < b && c > d) { location.href = "/x"; }</script>"#));
        assert!(out.contains("<body class=main>"));
        assert!(out.contains("<!-- nav -->"));
        assert!(out.contains(r#"<a href="about/index.html">About</a>"#));
        assert!(out.contains(r#"<a href="https://other.com/">Out</a>"#));
        assert!(out.contains(r#"<a href="mailto:a@b.com">Mail</a>"#));
        assert!(out.contains(r#"<img src="a.jpg" srcset="a.jpg 1x, b.jpg 2x" alt="A &amp; B">"#));
        assert!(out.contains(r#"<div style="background-image: url(img/hero.jpg)">x</div>"#));
        assert!(out.contains("<br/>"));
        assert!(out.contains("<p>Fish &amp; chips</p>"));
        assert!(!out.contains("<base"));
    }

    #[test]
    fn test_base_href_is_still_scheduled() {
        let mut recorder = Recorder::default();
        rewrite(PAGE, "https://example.com/", "index.html", &mut recorder);

        assert_eq!(recorder.0.first().map(String::as_str), Some("https://example.com/docs/"));
        assert!(recorder.0.contains(&"https://example.com/img/hero.jpg".to_string()));
        assert!(recorder.0.contains(&"https://example.com/b.jpg".to_string()));
        assert!(!recorder.0.iter().any(|u| u.contains("other.com") || u.starts_with("mailto")));
    }

    #[test]
    fn test_rewriting_twice_is_stable() {
        let mut recorder = Recorder::default();
        let once = rewrite(PAGE, "https://example.com/about/", "about/index.html", &mut recorder);
        let twice = rewrite(&once, "https://example.com/about/", "about/index.html", &mut recorder);
        assert_eq!(once, twice);
        assert!(once.contains(r#"href="../css/site.css""#));
    }

    #[test]
    fn test_base_href_changes_resolution_of_later_references() {
        let mut recorder = Recorder::default();
        let out = rewrite(
            r#"<head><base href="/docs/"><base href="/ignored/"></head><a href="intro">i</a>"#,
            "https://example.com/",
            "index.html",
            &mut recorder,
        );
        assert_eq!(out, r#"<head></head><a href="docs/intro/index.html">i</a>"#);
        assert_eq!(
            recorder.0,
            vec![
                "https://example.com/docs/".to_string(),
                "https://example.com/ignored/".to_string(),
                "https://example.com/docs/intro".to_string(),
            ]
        );
    }

    #[test]
    fn test_declarations_and_instructions_pass_through() {
        let html = concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" ",
            "\"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n",
            "<html><head><title>Q &amp; A</title></head><body><p>plain</p></body></html>"
        );
        let mut recorder = Recorder::default();
        let out = rewrite(html, "https://example.com/", "index.html", &mut recorder);
        assert_eq!(out, html);
    }

    #[test]
    fn test_query_and_fragment_survive() {
        let mut recorder = Recorder::default();
        let out = rewrite(
            r#"<a href="/page?x=1#top">p</a>"#,
            "https://example.com/",
            "index.html",
            &mut recorder,
        );
        assert_eq!(out, r#"<a href="page/index.html?x=1#top">p</a>"#);
        assert_eq!(recorder.0, vec!["https://example.com/page?x=1".to_string()]);
    }

    #[test]
    fn test_rewritten_tags_are_normalized_and_values_escaped() {
        let mut recorder = Recorder::default();
        let out = rewrite(
            r#"<IMG SRC="/a.png" data-note='say "hi"'><input disabled>"#,
            "https://example.com/",
            "index.html",
            &mut recorder,
        );
        assert_eq!(out, r#"<img src="a.png" data-note="say &quot;hi&quot;"><input disabled>"#);
    }

    #[test]
    fn test_unterminated_style_is_rewritten() {
        let mut recorder = Recorder::default();
        let out = rewrite(
            "<style>@import '/base.css';",
            "https://example.com/",
            "index.html",
            &mut recorder,
        );
        assert_eq!(out, "<style>@import 'base.css';");
    }

    #[test]
    fn test_character_references_survive_byte_for_byte() {
        let html = concat!(
            "<meta charset=\"iso-8859-1\">",
            "<p>&copy; 2024 &eacute;t&eacute; &#8212; &quot;q&quot; &nbsp;&#x41;</p>"
        );
        let mut recorder = Recorder::default();
        let out = rewrite(html, "https://example.com/", "index.html", &mut recorder);
        assert_eq!(out, html);
    }

    #[test]
    fn test_kept_attributes_of_rewritten_tags_stay_charset_safe() {
        let mut recorder = Recorder::default();
        let out = rewrite(
            r#"<a href="/x" title="&copy; caf&eacute;">x</a><abbr title="&eacute;">e</abbr>"#,
            "https://example.com/",
            "index.html",
            &mut recorder,
        );
        assert_eq!(
            out,
            r#"<a href="x/index.html" title="&#xA9; caf&#xE9;">x</a><abbr title="&eacute;">e</abbr>"#
        );
    }

    #[test]
    fn test_comments_and_cdata_pass_through() {
        let html = concat!(
            "<!--?x > y-->after<!-- <a href=\"/hidden\"> --><!---->",
            "<svg><![CDATA[a<b <a href=\"/c\">]]></svg>",
            "<?php echo 1 ?></>"
        );
        let mut recorder = Recorder::default();
        let out = rewrite(html, "https://example.com/", "index.html", &mut recorder);
        assert_eq!(out, html);
        assert!(recorder.0.is_empty());
    }

    #[test]
    fn test_cdata_outside_foreign_content_ends_at_first_bracket() {
        let mut recorder = Recorder::default();
        let out = rewrite(
            r#"<![CDATA[x]><a href="/inside">i</a>]]>"#,
            "https://example.com/",
            "index.html",
            &mut recorder,
        );
        assert_eq!(out, r#"<![CDATA[x]><a href="inside/index.html">i</a>]]>"#);
    }

    #[test]
    fn test_external_base_keeps_relative_references_pointing_off_site() {
        let mut recorder = Recorder::default();
        let out = rewrite(
            r#"<base href="https://cdn.other.com/assets/"><img src="a.png"><a href="https://example.com/p">p</a>"#,
            "https://example.com/",
            "index.html",
            &mut recorder,
        );
        assert_eq!(
            out,
            r#"<img src="https://cdn.other.com/assets/a.png"><a href="p/index.html">p</a>"#
        );
        assert_eq!(recorder.0, vec!["https://example.com/p".to_string()]);
    }

    #[test]
    fn test_raw_text_elements_are_not_scanned_for_tags() {
        let html = concat!(
            "<xmp><a href=\"/x\">&amp;</xmp>",
            "<iframe src=\"https://other.com/f\"><a href=\"/y\"></IFRAME >",
            "<noembed><img src=\"/z.png\"></noembed>",
            "<noframes><a href=\"/w\"></noframes>",
            "<textarea><b>&lt;</b></textarea>"
        );
        let mut recorder = Recorder::default();
        let out = rewrite(html, "https://example.com/", "index.html", &mut recorder);
        assert_eq!(out, html);
        assert!(recorder.0.is_empty());
    }

    #[test]
    fn test_quoted_greater_than_does_not_end_a_tag() {
        let mut recorder = Recorder::default();
        let out = rewrite(
            r#"<a title="a > b" href='/q'>q</a> 1 < 2"#,
            "https://example.com/",
            "index.html",
            &mut recorder,
        );
        assert_eq!(out, r#"<a title="a &gt; b" href="q/index.html">q</a> 1 < 2"#);
    }
}
