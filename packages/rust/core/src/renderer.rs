//! Body rendering for provisioned content.
//!
//! The provisioner never builds HTML itself; it asks a [`ContentRenderer`]
//! for the body of each item. [`TemplateRenderer`] is the built-in
//! renderer producing plain semantic markup that a theme styles.

use pageforge_sanitize::titlecase;
use pageforge_shared::{Keyword, Location};

/// What to render, with the inputs that kind needs.
#[derive(Debug, Clone, Copy)]
pub enum RenderRequest<'a> {
    Landing {
        keyword: &'a Keyword,
        location: &'a Location,
    },
    BlogPost {
        title: &'a str,
        keyword: &'a Keyword,
    },
    Calculator {
        name: &'a str,
        calculator_type: &'a str,
    },
}

/// Produces item bodies for the provisioner.
pub trait ContentRenderer: Send + Sync {
    fn render(&self, request: &RenderRequest<'_>) -> String;
}

/// Built-in HTML templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer;

impl ContentRenderer for TemplateRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> String {
        match request {
            RenderRequest::Landing { keyword, location } => landing(keyword, location),
            RenderRequest::BlogPost { title, keyword } => blog_post(title, keyword),
            RenderRequest::Calculator {
                name,
                calculator_type,
            } => calculator(name, calculator_type),
        }
    }
}

fn landing(keyword: &Keyword, location: &Location) -> String {
    let term = &keyword.term;
    let heading = titlecase(term);
    let place = &location.name;
    format!(
        r##"<section class="hero">
<h1>{heading} in {place}</h1>
<p>Expert {term} services in {place}.</p>
<a class="cta" href="#analyzer">Get Free Analysis</a>
</section>
<section class="details">
<h2>Professional {heading} in {place}</h2>
<p>Looking for {term} in {place}? Our analysis is built around the {place} market.</p>
<ul>
<li><strong>Local expertise:</strong> deep knowledge of the {place} market</li>
<li><strong>Market insights:</strong> current {place} trends and opportunities</li>
<li><strong>Analysis tools:</strong> instant property evaluation</li>
</ul>
</section>
<section id="analyzer" class="analyzer">
<h2>Free {place} Property Analyzer</h2>
<p>Get an instant analysis for any property in {place}.</p>
</section>
<section class="contact">
<h3>Ready to start your {place} investment journey?</h3>
<a class="cta" href="/contact/">Schedule Consultation</a>
</section>"##
    )
}

fn blog_post(title: &str, keyword: &Keyword) -> String {
    let term = &keyword.term;
    let heading = titlecase(term);
    format!(
        r#"<h1>{title}</h1>
<p>Welcome to the guide on <strong>{heading}</strong>.</p>
<h3>What You'll Learn</h3>
<ul>
<li>Professional {term} strategies</li>
<li>How to avoid costly mistakes</li>
<li>Step-by-step implementation guide</li>
</ul>
<h2>Why {heading} Matters</h2>
<p>Understanding {term} is crucial in a competitive market, whether you are a beginner or an experienced investor.</p>
<h2>Getting Started</h2>
<p>Successful {term} starts with proper analysis and strategic planning.</p>
<p><a class="cta" href="/contact/">Schedule Consultation</a></p>"#
    )
}

fn calculator(name: &str, calculator_type: &str) -> String {
    let lower = name.to_lowercase();
    format!(
        r#"<h1>{name}</h1>
<p>Use our {lower} to analyze real estate investment opportunities.</p>
<div id="{calculator_type}" class="calculator" data-calculator="{calculator_type}">
<label for="purchase_price">Purchase Price</label><input type="number" id="purchase_price">
<label for="down_payment">Down Payment (%)</label><input type="number" id="down_payment">
<label for="monthly_rent">Monthly Rent</label><input type="number" id="monthly_rent">
<label for="monthly_expenses">Monthly Expenses</label><input type="number" id="monthly_expenses">
<div class="results" hidden></div>
</div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_mentions_keyword_and_location() {
        let keyword = Keyword::new("hard money lenders", 98.0);
        let location = Location::new("Aspen CO");
        let body = TemplateRenderer.render(&RenderRequest::Landing {
            keyword: &keyword,
            location: &location,
        });
        assert!(body.contains("<h1>Hard Money Lenders in Aspen CO</h1>"));
        assert!(body.contains("Expert hard money lenders services in Aspen CO."));
    }

    #[test]
    fn calculator_uses_type_as_anchor() {
        let body = TemplateRenderer.render(&RenderRequest::Calculator {
            name: "Cap Rate Calculator",
            calculator_type: "cap_rate_calculator",
        });
        assert!(body.contains(r#"id="cap_rate_calculator""#));
        assert!(body.contains("our cap rate calculator"));
    }
}
