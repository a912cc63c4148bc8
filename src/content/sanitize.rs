//! HTML sanitizer for blog content.
//!
//! Removes executable content from admin-supplied HTML while leaving
//! ordinary markup untouched byte for byte:
//!
//! - `<script>`, `<style>`, `<iframe>`, `<object>` and `<embed>` elements
//!   are dropped with their bodies, and stray open or close tags of those
//!   and a few other active elements are dropped on their own.
//! - `on*` event handler attributes are stripped from every tag.
//! - `javascript:`, `vbscript:` and `data:text/html` URLs in URL-bearing
//!   attributes are replaced by `#`. Character references are decoded and
//!   control characters ignored before the scheme is checked.
//!
//! Start tags are tokenized the way a browser reads them: quoted values
//! may contain `>`, and `/` separates attributes.

use std::borrow::Cow;

use regex::Regex;

use crate::error::GatewayError;

const BLOCK_TAGS: [&str; 5] = ["script", "style", "iframe", "object", "embed"];

const URL_ATTRS: [&str; 9] = [
    "href",
    "src",
    "action",
    "formaction",
    "xlink:href",
    "poster",
    "background",
    "lowsrc",
    "cite",
];

const SCRIPT_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:text/html"];

/// Compiled sanitizer. Build once and share.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    blocks: Vec<Regex>,
    comments: Regex,
    stray: Regex,
}

impl Sanitizer {
    /// Compiles the sanitizer patterns.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if a pattern fails to compile.
    pub fn new() -> Result<Self, GatewayError> {
        let blocks = BLOCK_TAGS
            .iter()
            .map(|tag| compile(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            blocks,
            comments: compile(r"(?s)<!--.*?-->")?,
            stray: compile(
                r"(?i)</?(?:script|style|iframe|object|embed|frame|frameset|link|meta|base)\b[^>]*>",
            )?,
        })
    }

    /// Returns `html` with executable content removed.
    #[must_use]
    pub fn sanitize(&self, html: &str) -> String {
        let mut out = html.to_string();
        for pattern in self.blocks.iter().chain([&self.comments, &self.stray]) {
            if pattern.is_match(&out) {
                out = pattern.replace_all(&out, "").into_owned();
            }
        }
        clean_tags(&out)
    }
}

fn compile(pattern: &str) -> Result<Regex, GatewayError> {
    Regex::new(pattern).map_err(|e| GatewayError::Internal(format!("sanitizer pattern: {e}")))
}

/// Rewrites every start tag whose attributes need cleaning. A `<` that
/// opens a start tag which never closes is escaped.
fn clean_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        let (text, tail) = rest.split_at(open);
        out.push_str(text);
        let after_lt = tail.get(1..).unwrap_or("");
        if !after_lt.starts_with(|c: char| c.is_ascii_alphabetic()) {
            out.push('<');
            rest = after_lt;
            continue;
        }
        match StartTag::parse(tail) {
            Some(tag) => {
                match tag.cleaned() {
                    Some(cleaned) => out.push_str(&cleaned),
                    None => out.push_str(tag.raw),
                }
                rest = tail.get(tag.raw.len()..).unwrap_or("");
            }
            None => {
                out.push_str("&lt;");
                rest = after_lt;
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug)]
struct Attr<'a> {
    raw: &'a str,
    name: &'a str,
    value: Option<&'a str>,
}

#[derive(Debug)]
struct StartTag<'a> {
    raw: &'a str,
    name: &'a str,
    attrs: Vec<Attr<'a>>,
    self_closing: bool,
}

impl<'a> StartTag<'a> {
    /// Parses the start tag at the beginning of `src`. Returns `None` if
    /// the tag is not terminated.
    fn parse(src: &'a str) -> Option<Self> {
        let mut cur = Cursor { src, pos: 0 };
        if cur.bump()? != '<' {
            return None;
        }
        let name = cur.eat_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':');
        let mut attrs = Vec::new();
        let self_closing = loop {
            let gap = cur.eat_while(|c| c.is_whitespace() || c == '/');
            if cur.peek()? == '>' {
                cur.bump();
                break gap.ends_with('/');
            }
            attrs.push(cur.attr()?);
        };
        Some(Self {
            raw: src.get(..cur.pos)?,
            name,
            attrs,
            self_closing,
        })
    }

    /// The tag with handlers and script URLs removed, or `None` if it is
    /// already clean.
    fn cleaned(&self) -> Option<String> {
        let mut changed = false;
        let mut kept = Vec::with_capacity(self.attrs.len());
        for attr in &self.attrs {
            let name = attr.name.to_ascii_lowercase();
            if name.len() > 2 && name.starts_with("on") {
                changed = true;
            } else if URL_ATTRS.contains(&name.as_str()) && attr.value.is_some_and(is_script_url)
            {
                changed = true;
                kept.push(Cow::Owned(format!("{}=\"#\"", attr.name)));
            } else {
                kept.push(Cow::Borrowed(attr.raw));
            }
        }
        if !changed {
            return None;
        }
        let mut out = format!("<{}", self.name);
        for attr in kept {
            out.push(' ');
            out.push_str(&attr);
        }
        if self.self_closing {
            out.push_str(" /");
        }
        out.push('>');
        Some(out)
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.src.get(self.pos..)?.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&keep) {
            self.bump();
        }
        self.src.get(start..self.pos).unwrap_or("")
    }

    fn slice_from(&self, start: usize) -> &'a str {
        self.src.get(start..self.pos).unwrap_or("")
    }

    /// One attribute: a name, then optionally `=` and a quoted or bare value.
    fn attr(&mut self) -> Option<Attr<'a>> {
        let start = self.pos;
        if self.peek() == Some('=') {
            self.bump();
        }
        self.eat_while(|c| !(c.is_whitespace() || c == '/' || c == '>' || c == '='));
        let name = self.slice_from(start);
        let after_name = self.pos;

        self.eat_while(char::is_whitespace);
        if self.peek() != Some('=') {
            self.pos = after_name;
            return Some(Attr {
                raw: name,
                name,
                value: None,
            });
        }
        self.bump();
        self.eat_while(char::is_whitespace);
        let value = match self.peek()? {
            quote @ ('"' | '\'') => {
                self.bump();
                let value = self.eat_while(move |c| c != quote);
                self.bump()?;
                value
            }
            _ => self.eat_while(|c| !(c.is_whitespace() || c == '>')),
        };
        Some(Attr {
            raw: self.slice_from(start),
            name,
            value: Some(value),
        })
    }
}

fn is_script_url(value: &str) -> bool {
    let compact: String = decode_entities(value)
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    SCRIPT_SCHEMES.iter().any(|scheme| compact.starts_with(scheme))
}

/// Decodes numeric character references and the few named ones that can
/// spell a URL scheme.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        let (text, tail) = rest.split_at(amp);
        out.push_str(text);
        match decode_entity(tail) {
            Some((c, used)) => {
                out.push(c);
                rest = tail.get(used..).unwrap_or("");
            }
            None => {
                out.push('&');
                rest = tail.get(1..).unwrap_or("");
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decodes the reference at the start of `tail` (which begins with `&`).
/// Returns the character and the number of bytes it spans.
fn decode_entity(tail: &str) -> Option<(char, usize)> {
    let body = tail.get(1..)?;
    if let Some(num) = body.strip_prefix('#') {
        let (digits_src, radix, marker) = match num.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16, 2),
            None => (num, 10, 1),
        };
        let end = digits_src
            .find(|c: char| !c.is_digit(radix))
            .unwrap_or(digits_src.len());
        let digits = digits_src.get(..end).filter(|d| !d.is_empty())?;
        let terminated = digits_src.get(end..).is_some_and(|r| r.starts_with(';'));
        let c = u32::from_str_radix(digits, radix)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        return Some((c, 1 + marker + end + usize::from(terminated)));
    }
    let end = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let name = body.get(..end)?;
    let c = match name.to_ascii_lowercase().as_str() {
        "colon" => ':',
        "tab" => '\t',
        "newline" => '\n',
        "nbsp" => ' ',
        "lpar" => '(',
        "rpar" => ')',
        _ => return None,
    };
    let terminated = body.get(end..).is_some_and(|r| r.starts_with(';'));
    Some((c, 1 + end + usize::from(terminated)))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn sanitizer() -> Sanitizer {
        let Ok(s) = Sanitizer::new() else {
            panic!("patterns failed to compile");
        };
        s
    }

    #[test]
    fn benign_markup_is_unchanged() {
        let html = "<p>Hello <strong>world</strong></p>\n<ul><li>one</li><li>two</li></ul>\
                    <a href=\"https://popera.app/e/1\" title='x'>go</a><br/><img src=\"/a.png\" alt=\"\">";
        assert_eq!(sanitizer().sanitize(html), html);
    }

    #[test]
    fn script_blocks_are_removed() {
        let html = "<p>a</p><script type=\"text/javascript\">alert(1)</script><p>b</p>\
                    <SCRIPT>\nsteal()\n</SCRIPT >";
        assert_eq!(sanitizer().sanitize(html), "<p>a</p><p>b</p>");
    }

    #[test]
    fn event_handlers_are_stripped() {
        let html = "<img src=\"/a.png\" onerror=\"alert(1)\"><div ONCLICK='x()' class=\"c\">t</div>";
        assert_eq!(
            sanitizer().sanitize(html),
            "<img src=\"/a.png\"><div class=\"c\">t</div>"
        );
    }

    #[test]
    fn script_urls_are_neutralized() {
        let html = "<a href=\"javascript:alert(1)\">x</a><a href=JavaScript:void(0)>y</a>\
                    <iframe src=\"https://evil\"></iframe>";
        assert_eq!(
            sanitizer().sanitize(html),
            "<a href=\"#\">x</a><a href=\"#\">y</a>"
        );
    }

    #[test]
    fn stray_and_commented_content_is_removed() {
        let html = "<p>a<!-- <script>x</script> --></p><embed src=\"x.swf\"><style>p{}</style>";
        assert_eq!(sanitizer().sanitize(html), "<p>a</p>");
    }

    #[test]
    fn slash_separated_handlers_are_stripped() {
        let s = sanitizer();
        assert_eq!(s.sanitize("<svg/onload=alert(1)>"), "<svg>");
        assert_eq!(
            s.sanitize("<img/src=\"/a.png\"/onerror=alert(1)>"),
            "<img src=\"/a.png\">"
        );
    }

    #[test]
    fn quoted_gt_does_not_hide_later_attributes() {
        assert_eq!(
            sanitizer().sanitize("<a title=\">\" onclick=\"alert(1)\">x</a>"),
            "<a title=\">\">x</a>"
        );
    }

    #[test]
    fn encoded_schemes_are_neutralized() {
        let s = sanitizer();
        assert_eq!(
            s.sanitize("<a href=\"java&#x09;script:alert(1)\">x</a>"),
            "<a href=\"#\">x</a>"
        );
        assert_eq!(
            s.sanitize("<a href=\"&#106;avascript&colon;alert(1)\">x</a>"),
            "<a href=\"#\">x</a>"
        );
        assert_eq!(
            s.sanitize("<a href=\"\u{1} javascript:alert(1)\">x</a>"),
            "<a href=\"#\">x</a>"
        );
    }

    #[test]
    fn ampersands_and_bare_angles_are_left_alone() {
        let html = "<p>1 < 2 && 3 > 2</p><a href=\"/e?a=1&amp;b=2\">go</a>";
        assert_eq!(sanitizer().sanitize(html), html);
    }

    #[test]
    fn unterminated_tag_is_escaped() {
        assert_eq!(
            sanitizer().sanitize("<p>x</p><img src=x onerror=alert(1)"),
            "<p>x</p>&lt;img src=x onerror=alert(1)"
        );
    }
}
