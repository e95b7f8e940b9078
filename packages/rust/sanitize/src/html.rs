//! HTML cleanup for author-supplied post bodies.
//!
//! The fragment is parsed with `scraper` and written back out from an
//! allow-list. Tags outside the list are unwrapped, executable elements are
//! dropped with their content, and only listed attributes survive. URL
//! attributes are checked on the parsed value, so entity-encoded schemes
//! are seen the way a browser sees them.

use scraper::{ElementRef, Html, Node};

/// Elements removed together with everything inside them.
const DROPPED_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "frame", "frameset", "object", "embed", "applet", "noscript",
    "template", "svg", "math", "meta", "link", "base", "title", "textarea", "select",
];

/// Elements written back out. Anything else is unwrapped to its children.
const ALLOWED_ELEMENTS: &[&str] = &[
    "a", "abbr", "address", "article", "aside", "audio", "b", "bdi", "bdo", "blockquote", "br",
    "caption", "cite", "code", "col", "colgroup", "dd", "del", "details", "dfn", "div", "dl",
    "dt", "em", "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "i", "img", "ins", "kbd", "li", "main", "mark", "nav", "ol", "p", "picture", "pre",
    "q", "s", "samp", "section", "small", "source", "span", "strike", "strong", "sub",
    "summary", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "time", "tr", "u", "ul",
    "var", "video", "wbr",
];

const VOID_ELEMENTS: &[&str] = &["br", "col", "hr", "img", "source", "wbr"];

const ALLOWED_ATTRIBUTES: &[&str] = &[
    "align", "alt", "cite", "class", "colspan", "controls", "datetime", "dir", "height",
    "href", "id", "lang", "loading", "name", "poster", "rel", "reversed", "rowspan", "scope",
    "span", "src", "start", "target", "title", "type", "width",
];

/// Attributes holding a URL that a browser may navigate to or load.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "cite", "poster"];

/// Nesting depth past which content is discarded.
const MAX_DEPTH: usize = 256;

/// Run the post-HTML allow-list pipeline.
pub(crate) fn run_pipeline(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_children(&mut out, fragment.root_element(), 0);
    out
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn write_children(out: &mut String, parent: ElementRef<'_>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => escape_text(out, text),
            Node::Comment(comment) => {
                if !is_conditional_comment(comment) {
                    out.push_str("<!--");
                    out.push_str(&comment.replace("--", ""));
                    out.push_str("-->");
                }
            }
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    write_element(out, element, depth + 1);
                }
            }
            _ => {}
        }
    }
}

fn write_element(out: &mut String, element: ElementRef<'_>, depth: usize) {
    let name = element.value().name();
    if DROPPED_ELEMENTS.contains(&name) {
        return;
    }
    if !ALLOWED_ELEMENTS.contains(&name) {
        write_children(out, element, depth);
        return;
    }

    out.push('<');
    out.push_str(name);
    let mut attrs: Vec<(&str, &str)> = element
        .value()
        .attrs()
        .filter(|(attr, _)| is_allowed_attribute(attr))
        .collect();
    attrs.sort_unstable_by_key(|(attr, _)| *attr);
    for (attr, value) in attrs {
        let value = if URL_ATTRIBUTES.contains(&attr) && is_script_scheme(value) {
            ""
        } else {
            value
        };
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        escape_attribute(out, value);
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    write_children(out, element, depth);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn is_allowed_attribute(attr: &str) -> bool {
    ALLOWED_ATTRIBUTES.contains(&attr)
        || attr.starts_with("aria-")
        || (attr.starts_with("data-") && attr.len() > "data-".len())
}

fn is_conditional_comment(comment: &str) -> bool {
    let trimmed = comment.trim_start();
    trimmed.starts_with("[if") || trimmed.starts_with("<![endif")
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// `javascript:`, `vbscript:` or `data:` after the parser decoded entities.
fn is_script_scheme(value: &str) -> bool {
    // Browsers ignore embedded whitespace and control chars in schemes.
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.starts_with("javascript:")
        || compact.starts_with("vbscript:")
        || compact.starts_with("data:")
}

// ---------------------------------------------------------------------------
// Tag stripping
// ---------------------------------------------------------------------------

/// Text content of an HTML fragment with executable elements removed.
pub(crate) fn text_content(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    collect_text(&mut out, fragment.root_element(), 0);
    out
}

fn collect_text(out: &mut String, parent: ElementRef<'_>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if !DROPPED_ELEMENTS.contains(&el.name()) => {
                if let Some(element) = ElementRef::wrap(child) {
                    collect_text(out, element, depth + 1);
                }
            }
            _ => {}
        }
    }
}
