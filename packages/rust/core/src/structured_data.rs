//! JSON-LD stored alongside items.
//!
//! Documents are kept as an encoded string under [`JSON_LD_META_KEY`].
//! `serde_json` leaves `/` and non-ASCII characters unescaped, so the stored
//! text is what a page head would emit.

use serde_json::Value;

use pageforge_shared::{ContentItem, PageForgeError, Result};

pub const JSON_LD_META_KEY: &str = "json_ld";

/// Encode a JSON-LD document for storage. Only objects and arrays qualify.
pub fn encode_json_ld(doc: &Value) -> Result<String> {
    if !(doc.is_object() || doc.is_array()) {
        return Err(PageForgeError::validation(
            "json_ld must be an object or an array",
        ));
    }
    serde_json::to_string(doc)
        .map_err(|e| PageForgeError::validation(format!("json_ld not encodable: {e}")))
}

/// Decoded JSON-LD of an item, if it carries a well-formed document.
pub fn structured_data(item: &ContentItem) -> Option<Value> {
    let raw = item.metadata.get(JSON_LD_META_KEY)?;
    let decoded = match raw {
        Value::String(text) => serde_json::from_str::<Value>(text).ok()?,
        other => other.clone(),
    };
    (decoded.is_object() || decoded.is_array()).then_some(decoded)
}

/// `<script type="application/ld+json">` tag for an item's document.
pub fn script_tag(item: &ContentItem) -> Option<String> {
    let doc = structured_data(item)?;
    let encoded = serde_json::to_string(&doc).ok()?;
    // A literal "</" would close the script element early.
    let encoded = encoded.replace("</", "<\\/");
    Some(format!(
        "<script type=\"application/ld+json\">{encoded}</script>"
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pageforge_shared::{ContentStatus, ContentType, ItemId};
    use serde_json::json;

    use super::*;

    fn item_with(meta: Option<Value>) -> ContentItem {
        let mut item = ContentItem {
            id: ItemId(1),
            content_type: ContentType::Post,
            title: "t".into(),
            body: String::new(),
            slug: None,
            excerpt: None,
            status: ContentStatus::Publish,
            author: None,
            parent_id: None,
            keyword: None,
            location: None,
            metadata: Default::default(),
            auto_generated: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        if let Some(meta) = meta {
            item.metadata.insert(JSON_LD_META_KEY.into(), meta);
        }
        item
    }

    #[test]
    fn encoding_keeps_slashes_and_unicode() {
        let doc = json!({
            "@context": "https://schema.org",
            "@type": "Article",
            "headline": "Café in Zürich",
        });
        let encoded = encode_json_ld(&doc).unwrap();
        assert!(encoded.contains("https://schema.org"));
        assert!(encoded.contains("Café in Zürich"));

        let item = item_with(Some(Value::String(encoded)));
        assert_eq!(structured_data(&item), Some(doc));
    }

    #[test]
    fn scalars_are_rejected() {
        assert!(encode_json_ld(&json!("text")).is_err());
        assert!(encode_json_ld(&json!([{"@type": "Thing"}])).is_ok());
    }

    #[test]
    fn malformed_or_missing_document_yields_none() {
        assert_eq!(structured_data(&item_with(None)), None);
        assert_eq!(
            structured_data(&item_with(Some(Value::String("{not json".into())))),
            None
        );
        assert_eq!(
            structured_data(&item_with(Some(Value::String("42".into())))),
            None
        );
    }

    #[test]
    fn script_tag_escapes_closing_sequences() {
        let doc = json!({"name": "</script><b>"});
        let item = item_with(Some(Value::String(encode_json_ld(&doc).unwrap())));
        let tag = script_tag(&item).unwrap();
        assert!(tag.starts_with("<script type=\"application/ld+json\">"));
        assert!(tag.contains("<\\/script>"));
        assert_eq!(tag.matches("</script>").count(), 1);
    }
}
