//! Input cleaning for tool arguments and generated content.
//!
//! Every string that reaches the content store passes through one of the
//! [`Sanitizer`] kinds: plain text, post HTML, slug, key, URL or email.

mod html;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

// ---------------------------------------------------------------------------
// Sanitizer kinds
// ---------------------------------------------------------------------------

/// How a string parameter is cleaned before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sanitizer {
    /// Single-line text with tags removed.
    Text,
    /// Post HTML with executable content removed.
    Html,
    /// URL-safe slug.
    Slug,
    /// Lowercase identifier.
    Key,
    /// Absolute http(s) URL.
    Url,
    /// Email address.
    Email,
}

impl Sanitizer {
    /// Clean `raw`. Returns `None` when the value is present but invalid.
    ///
    /// Blank input always yields `Some("")` so callers can treat it as absent.
    /// HTML keeps its surrounding whitespace; every other kind is trimmed.
    pub fn apply(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Some(String::new());
        }
        match self {
            Self::Text => Some(sanitize_text_field(trimmed)),
            Self::Html => Some(kses_post(raw)),
            Self::Slug => Some(sanitize_title(trimmed)),
            Self::Key => Some(sanitize_key(trimmed)),
            Self::Url => esc_url_raw(trimmed),
            Self::Email => is_email(trimmed).then(|| trimmed.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Remove every tag (and script/style content) and trim.
pub fn strip_all_tags(input: &str) -> String {
    html::text_content(input).trim().to_string()
}

/// Single-line text field: tags stripped, whitespace runs collapsed.
pub fn sanitize_text_field(input: &str) -> String {
    static OCTET_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"%[0-9a-fA-F]{2}").expect("valid regex"));

    let stripped = strip_all_tags(input);
    let without_octets = OCTET_RE.replace_all(&stripped, "");
    without_octets.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercase the first character of every space-separated word.
pub fn titlecase(input: &str) -> String {
    input
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Convert a title into a slug: lowercase, alphanumeric runs joined by `-`.
///
/// `"Hard Money Lenders in Aspen, CO"` becomes `hard-money-lenders-in-aspen-co`.
pub fn sanitize_title(input: &str) -> String {
    let text = strip_all_tags(input).to_lowercase();
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c == '\'' || c == '\u{2019}' {
            // Apostrophes vanish: "investor's" -> "investors"
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Lowercase key limited to `[a-z0-9_-]`.
pub fn sanitize_key(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// Allow-list post HTML: the fragment is parsed and rebuilt from known tags
/// and attributes. Script URLs are blanked after entity decoding.
pub fn kses_post(input: &str) -> String {
    let cleaned = html::run_pipeline(input);
    if cleaned.len() != input.len() {
        debug!(before = input.len(), after = cleaned.len(), "post html cleaned");
    }
    cleaned
}

// ---------------------------------------------------------------------------
// URL & email
// ---------------------------------------------------------------------------

/// Parse an absolute http(s) URL. Anything else is rejected.
pub fn esc_url_raw(input: &str) -> Option<String> {
    let parsed = Url::parse(input.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed.to_string()),
        _ => None,
    }
}

/// Syntactic email check.
pub fn is_email(input: &str) -> bool {
    static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~.-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+$")
            .expect("valid regex")
    });

    input.len() >= 6 && EMAIL_RE.is_match(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titlecase_uppercases_each_word() {
        assert_eq!(titlecase("hard money lenders"), "Hard Money Lenders");
        assert_eq!(titlecase("1031 exchange"), "1031 Exchange");
        assert_eq!(titlecase("ROI calculator"), "ROI Calculator");
    }

    #[test]
    fn text_field_collapses_whitespace_and_tags() {
        assert_eq!(
            sanitize_text_field("  <b>Cap</b>\n rate\t guide %0A "),
            "Cap rate guide"
        );
    }

    #[test]
    fn strip_all_tags_drops_script_content() {
        assert_eq!(strip_all_tags("<p>hi</p><script>x()</script>"), "hi");
    }

    #[test]
    fn title_to_slug() {
        assert_eq!(
            sanitize_title("Hard Money Lenders in Aspen, CO"),
            "hard-money-lenders-in-aspen-co"
        );
        assert_eq!(sanitize_title("  Investor's Guide!! "), "investors-guide");
        assert_eq!(sanitize_title("---"), "");
    }

    #[test]
    fn key_keeps_safe_chars() {
        assert_eq!(sanitize_key("Post Type!"), "posttype");
        assert_eq!(sanitize_key("landing_page-2"), "landing_page-2");
    }

    #[test]
    fn url_accepts_http_only() {
        assert_eq!(
            esc_url_raw("https://cdn.example.com/a.png").as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert!(esc_url_raw("javascript:alert(1)").is_none());
        assert!(esc_url_raw("/relative/path").is_none());
        assert!(esc_url_raw("ftp://example.com/file").is_none());
    }

    #[test]
    fn email_validation() {
        assert!(is_email("editor@example.com"));
        assert!(!is_email("editor@localhost"));
        assert!(!is_email("not an email"));
        assert!(!is_email("a@b.c"));
    }

    #[test]
    fn sanitizer_empty_is_some_empty() {
        assert_eq!(Sanitizer::Url.apply("   ").as_deref(), Some(""));
        assert_eq!(Sanitizer::Email.apply("").as_deref(), Some(""));
    }

    #[test]
    fn sanitizer_invalid_is_none() {
        assert!(Sanitizer::Email.apply("nope").is_none());
        assert!(Sanitizer::Url.apply("nope").is_none());
    }

    #[test]
    fn sanitizer_html_keeps_markup() {
        assert_eq!(
            Sanitizer::Html.apply("<h2>Intro</h2><p onclick=\"x()\">Body</p>").as_deref(),
            Some("<h2>Intro</h2><p>Body</p>")
        );
        assert_eq!(
            Sanitizer::Html.apply("\n\n<!-- part -->\n\n").as_deref(),
            Some("\n\n<!-- part -->\n\n")
        );
    }

    #[test]
    fn kses_drops_handler_after_slash() {
        let cleaned = kses_post("<img/onerror=alert(1) src=x>");
        assert!(!cleaned.contains("onerror"), "{cleaned}");
        assert!(cleaned.starts_with("<img"));
    }

    #[test]
    fn kses_decodes_entities_before_scheme_check() {
        let cleaned = kses_post("<a href=\"jav&#x61;script:alert(1)\">x</a>");
        assert!(!cleaned.to_ascii_lowercase().contains("javascript"), "{cleaned}");
        assert_eq!(cleaned, "<a href=\"\">x</a>");
    }
}
