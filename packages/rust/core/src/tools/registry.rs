//! Static tool schemas.
//!
//! A [`ToolSpec`] lists a tool's parameters in declaration order together
//! with how each value is typed and cleaned. The catalog is what remote
//! callers see when they discover tools.

use serde::Serialize;

use pageforge_sanitize::Sanitizer;

/// Fields every content tool returns on success.
pub const ITEM_RETURNS: &[&str] = &["post_id", "edit_link", "view_link", "status"];

/// Declared JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Array,
    Object,
    Bool,
}

/// One tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    /// Cleaning applied to string values (and array entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitizer: Option<Sanitizer>,
    /// Keep leading/trailing whitespace of string values.
    #[serde(skip)]
    pub preserve_whitespace: bool,
}

impl ParamSpec {
    pub fn required(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            param_type,
            required: true,
            sanitizer: None,
            preserve_whitespace: false,
        }
    }

    pub fn optional(name: &'static str, param_type: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type)
        }
    }

    pub fn sanitize(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn keep_whitespace(mut self) -> Self {
        self.preserve_whitespace = true;
        self
    }
}

/// Schema of one dispatchable tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub returns: Vec<&'static str>,
}

impl ToolSpec {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

// ---------------------------------------------------------------------------
// Built-in tools
// ---------------------------------------------------------------------------

pub const GENERATE_SEO_POST: &str = "generate_seo_post";
pub const GENERATE_PAGE: &str = "generate_page";
pub const APPEND_SECTION: &str = "append_section_to_post";

/// Default delimiter placed between a body and an appended section.
pub const DEFAULT_SEPARATOR: &str = "\n\n<!-- toinv-section -->\n\n";

pub fn generate_seo_post_spec() -> ToolSpec {
    use ParamType::*;
    ToolSpec {
        name: GENERATE_SEO_POST,
        title: "Generate SEO Post",
        description: "Create a post with SEO metadata, featured image, categories/tags, and optional JSON-LD.",
        params: vec![
            ParamSpec::required("title", String).sanitize(Sanitizer::Text),
            ParamSpec::optional("slug", String).sanitize(Sanitizer::Slug),
            ParamSpec::required("content", String).sanitize(Sanitizer::Html),
            ParamSpec::optional("excerpt", String).sanitize(Sanitizer::Html),
            ParamSpec::optional("status", String).sanitize(Sanitizer::Key),
            ParamSpec::optional("author_email", String).sanitize(Sanitizer::Email),
            ParamSpec::optional("categories", Array).sanitize(Sanitizer::Text),
            ParamSpec::optional("tags", Array).sanitize(Sanitizer::Text),
            ParamSpec::optional("featured_image_url", String).sanitize(Sanitizer::Url),
            ParamSpec::optional("focus_keyword", String).sanitize(Sanitizer::Text),
            ParamSpec::optional("meta_description", String).sanitize(Sanitizer::Text),
            ParamSpec::optional("json_ld", Object),
            ParamSpec::optional("post_type", String).sanitize(Sanitizer::Key),
        ],
        returns: ITEM_RETURNS.to_vec(),
    }
}

pub fn generate_page_spec() -> ToolSpec {
    use ParamType::*;
    ToolSpec {
        name: GENERATE_PAGE,
        title: "Generate Page",
        description: "Create a page with optional template, parent, SEO fields and featured image.",
        params: vec![
            ParamSpec::required("title", String).sanitize(Sanitizer::Text),
            ParamSpec::optional("slug", String).sanitize(Sanitizer::Slug),
            ParamSpec::required("content", String).sanitize(Sanitizer::Html),
            ParamSpec::optional("excerpt", String).sanitize(Sanitizer::Html),
            ParamSpec::optional("status", String).sanitize(Sanitizer::Key),
            ParamSpec::optional("author_email", String).sanitize(Sanitizer::Email),
            ParamSpec::optional("template", String).sanitize(Sanitizer::Text),
            ParamSpec::optional("parent_id", Number),
            ParamSpec::optional("featured_image_url", String).sanitize(Sanitizer::Url),
            ParamSpec::optional("focus_keyword", String).sanitize(Sanitizer::Text),
            ParamSpec::optional("meta_description", String).sanitize(Sanitizer::Text),
            ParamSpec::optional("json_ld", Object),
        ],
        returns: ITEM_RETURNS.to_vec(),
    }
}

pub fn append_section_spec() -> ToolSpec {
    use ParamType::*;
    ToolSpec {
        name: APPEND_SECTION,
        title: "Append Section to Post",
        description: "Append HTML to an existing post or page by ID or slug.",
        params: vec![
            ParamSpec::optional("post_id", Number),
            ParamSpec::optional("slug", String).sanitize(Sanitizer::Slug),
            ParamSpec::required("section_html", String).sanitize(Sanitizer::Html),
            ParamSpec::optional("separator", String)
                .sanitize(Sanitizer::Html)
                .keep_whitespace(),
            ParamSpec::optional("status", String).sanitize(Sanitizer::Key),
        ],
        returns: ITEM_RETURNS.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_params_in_declaration_order() {
        let spec = generate_seo_post_spec();
        let required: Vec<&str> = spec
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        assert_eq!(required, ["title", "content"]);
    }

    #[test]
    fn catalog_json_shape() {
        let json = serde_json::to_value(append_section_spec()).unwrap();
        assert_eq!(json["name"], "append_section_to_post");
        assert_eq!(json["params"][0]["name"], "post_id");
        assert_eq!(json["params"][0]["type"], "number");
        assert_eq!(json["params"][2]["required"], true);
        assert_eq!(json["params"][2]["sanitizer"], "html");
        assert!(json["params"][0].get("sanitizer").is_none());
        assert!(json["params"][3].get("preserve_whitespace").is_none());
        assert_eq!(json["returns"][0], "post_id");
    }

    #[test]
    fn page_has_parent_and_template() {
        let spec = generate_page_spec();
        assert_eq!(spec.param("parent_id").unwrap().param_type, ParamType::Number);
        assert!(spec.param("template").is_some());
        assert!(spec.param("categories").is_none());
    }
}
