//! Draft payload generation.
//!
//! [`DraftGenerator`] is the seam for whatever produces article drafts.
//! Generated payloads are returned to the caller and never persisted; an
//! admin saves the ones worth keeping through the draft endpoint.
//! [`OutlineGenerator`] is a deterministic implementation that builds
//! structured outlines from the topic and keywords.

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use super::slug::slugify;
use crate::error::GatewayError;

/// Most payloads a single generate call may return.
pub const MAX_DRAFTS_PER_REQUEST: u8 = 5;

/// Input for draft generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftPrompt {
    /// Subject of the articles.
    pub topic: String,
    /// Keywords to work into the articles and tags.
    pub keywords: Vec<String>,
    /// Number of payloads wanted, `1..=5`.
    pub count: u8,
}

/// A generated, unsaved draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DraftPayload {
    /// Article title.
    pub title: String,
    /// Slug derived from the title.
    pub slug: String,
    /// Short summary.
    pub excerpt: String,
    /// HTML body.
    pub content: String,
    /// Tags derived from the keywords.
    pub tags: Vec<String>,
}

/// Produces draft payloads for a prompt.
#[async_trait]
pub trait DraftGenerator: Send + Sync + std::fmt::Debug {
    /// Generates `prompt.count` payloads.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] if a generation backend fails.
    async fn generate(&self, prompt: &DraftPrompt) -> Result<Vec<DraftPayload>, GatewayError>;
}

/// Deterministic outline generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineGenerator;

const ANGLES: [&str; MAX_DRAFTS_PER_REQUEST as usize] = [
    "A first-timer's guide to",
    "Where to find the best",
    "What to expect at",
    "How to host your own",
    "Why neighbours keep coming back to",
];

#[async_trait]
impl DraftGenerator for OutlineGenerator {
    async fn generate(&self, prompt: &DraftPrompt) -> Result<Vec<DraftPayload>, GatewayError> {
        let topic = prompt.topic.trim();
        let tags: Vec<String> = prompt
            .keywords
            .iter()
            .map(|k| slugify(k))
            .filter(|k| k != super::slug::FALLBACK_SLUG)
            .collect();

        Ok(ANGLES
            .iter()
            .take(usize::from(prompt.count))
            .map(|angle| {
                let title = format!("{angle} {topic}");
                DraftPayload {
                    slug: slugify(&title),
                    excerpt: format!("{angle} {topic}, in a few minutes of reading."),
                    content: outline_html(topic, &prompt.keywords),
                    tags: tags.clone(),
                    title,
                }
            })
            .collect())
    }
}

fn outline_html(topic: &str, keywords: &[String]) -> String {
    let topic = escape_html(topic);
    let mut html = format!("<h2>Why {topic}</h2>\n<p>Introduce {topic} and who it is for.</p>\n");
    if !keywords.is_empty() {
        html.push_str("<h2>Highlights</h2>\n<ul>\n");
        for keyword in keywords {
            html.push_str(&format!("<li>{}</li>\n", escape_html(keyword)));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("<h2>Plan your visit</h2>\n<p>Dates, tickets and what to bring.</p>");
    html
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn prompt(count: u8) -> DraftPrompt {
        DraftPrompt {
            topic: "night markets".to_string(),
            keywords: vec!["Street Food".to_string(), "<b>live</b> music".to_string()],
            count,
        }
    }

    #[tokio::test]
    async fn returns_requested_number_of_distinct_payloads() {
        let Ok(drafts) = OutlineGenerator.generate(&prompt(3)).await else {
            panic!("generation failed");
        };
        assert_eq!(drafts.len(), 3);
        let [first, second, _] = drafts.as_slice() else {
            panic!("expected three drafts");
        };
        assert_ne!(first.slug, second.slug);
        assert_eq!(first.tags, vec!["street-food", "b-live-b-music"]);
    }

    #[tokio::test]
    async fn keywords_are_escaped_in_content() {
        let Ok(drafts) = OutlineGenerator.generate(&prompt(1)).await else {
            panic!("generation failed");
        };
        let Some(draft) = drafts.first() else {
            panic!("expected a draft");
        };
        assert!(draft.content.contains("&lt;b&gt;live&lt;/b&gt; music"));
        assert!(!draft.content.contains("<b>"));
    }
}
