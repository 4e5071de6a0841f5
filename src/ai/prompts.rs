//! Request payloads for the AI endpoints and the prompts built from them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::types::OutlineItem;
use super::{AiAction, Prompt};
use crate::db::models::Tone;

pub const DEFAULT_AUDIENCE: &str = "general readers";
pub const DEFAULT_WORD_COUNT: u32 = 1500;
pub const DEFAULT_GOAL: &str = "improve clarity and engagement";
pub const DEFAULT_ADDITIONAL_WORDS: u32 = 200;

/// Publishing platform the outline is optimised for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeoFocus {
    #[default]
    Google,
    Medium,
    Devto,
}

impl SeoFocus {
    pub fn label(&self) -> &'static str {
        match self {
            SeoFocus::Google => "Google",
            SeoFocus::Medium => "Medium",
            SeoFocus::Devto => "Dev.to",
        }
    }
}

#[allow(clippy::ptr_arg)]
fn validate_keywords(keywords: &Vec<String>) -> Result<(), ValidationError> {
    if keywords.iter().any(|k| k.chars().count() > 50) {
        let mut err = ValidationError::new("keyword_length");
        err.message = Some("Each keyword may not be greater than 50 characters.".into());
        return Err(err);
    }
    Ok(())
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OutlineRequest {
    #[validate(length(min = 1, max = 500, message = "The topic field is required (max 500 characters)."))]
    pub topic: String,
    #[serde(default)]
    #[validate(custom(function = "validate_keywords"))]
    pub keywords: Vec<String>,
    #[validate(length(max = 100))]
    pub audience: Option<String>,
    pub tone: Option<Tone>,
    #[validate(range(min = 300, max = 5000, message = "The word count must be between 300 and 5000."))]
    pub word_count: Option<u32>,
    pub seo_focus: Option<SeoFocus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContentRequest {
    #[validate(length(min = 1, message = "The outline field is required."))]
    pub outline: Vec<OutlineItem>,
    #[validate(length(min = 1, max = 255, message = "The title field is required (max 255 characters)."))]
    pub title: String,
    #[serde(default)]
    #[validate(custom(function = "validate_keywords"))]
    pub keywords: Vec<String>,
    pub tone: Option<Tone>,
    #[validate(range(min = 300, max = 5000, message = "The word count must be between 300 and 5000."))]
    pub word_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SeoRequest {
    #[validate(length(min = 1, max = 255, message = "The title field is required (max 255 characters)."))]
    pub title: String,
    #[validate(length(min = 1, message = "The content field is required."))]
    pub content: String,
    #[serde(default)]
    #[validate(custom(function = "validate_keywords"))]
    pub keywords: Vec<String>,
    /// When set, the analysis is saved onto this blog.
    pub blog_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RewriteRequest {
    #[validate(length(min = 1, max = 10000, message = "The content field is required (max 10000 characters)."))]
    pub content: String,
    pub tone: Option<Tone>,
    #[validate(length(max = 200))]
    pub goal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExpandRequest {
    #[validate(length(min = 1, max = 10000, message = "The content field is required (max 10000 characters)."))]
    pub content: String,
    #[validate(range(min = 50, max = 1000, message = "The additional words must be between 50 and 1000."))]
    pub additional_words: Option<u32>,
}

// ============================================================================
// Prompt builders
// ============================================================================

const OUTLINE_SYSTEM: &str = r#"You are an expert blog writer and SEO specialist. Produce a well-structured blog outline using clear H1, H2 and H3 headings, aimed at engaging, search-friendly content.
Respond with a single JSON object of this shape:
{
  "title_options": ["Title 1", "Title 2", "Title 3"],
  "outline": [
    {"level": "h1", "text": "Main Title"},
    {"level": "h2", "text": "Section 1"},
    {"level": "h3", "text": "Subsection 1.1"}
  ],
  "estimated_word_count": 1500
}"#;

const SEO_SYSTEM: &str = r#"You are an SEO expert. Analyze the supplied article and return SEO findings.
Respond with a single JSON object of this shape:
{
  "seo_score": 75,
  "meta_title": "Suggested meta title (max 60 chars)",
  "meta_description": "Suggested meta description (max 155 chars)",
  "keywords": ["keyword1", "keyword2"],
  "keyword_density": 2.5,
  "readability_score": 80,
  "suggestions": ["Add more internal links", "Improve heading structure"]
}"#;

const REWRITE_SYSTEM: &str = r#"You are an expert content editor. Rewrite the supplied text for clarity, engagement and SEO while keeping its meaning and tone.
Respond with a single JSON object of this shape:
{
  "rewritten_content": "Improved content here",
  "changes_made": ["Improved sentence structure", "Added transition words"]
}"#;

const EXPAND_SYSTEM: &str = r#"You are an expert content writer. Expand the supplied text with more detail, examples and explanation.
Respond with a single JSON object of this shape:
{
  "expanded_content": "Expanded content here",
  "added_word_count": 200
}"#;

fn keyword_list(keywords: &[String]) -> String {
    keywords.join(", ")
}

pub fn outline_prompt(req: &OutlineRequest, tone: Tone) -> Prompt {
    let user = format!(
        "Create a blog outline for the following:\n\
         Topic: {}\n\
         Target Audience: {}\n\
         Tone: {}\n\
         Target Word Count: {}\n\
         SEO Focus: {}\n\
         Keywords: {}",
        req.topic,
        req.audience.as_deref().unwrap_or(DEFAULT_AUDIENCE),
        tone,
        req.word_count.unwrap_or(DEFAULT_WORD_COUNT),
        req.seo_focus.unwrap_or_default().label(),
        keyword_list(&req.keywords),
    );

    Prompt {
        action: AiAction::GenerateOutline,
        system: OUTLINE_SYSTEM.to_string(),
        user,
    }
}

pub fn content_prompt(req: &ContentRequest, tone: Tone) -> Prompt {
    let word_count = req.word_count.unwrap_or(DEFAULT_WORD_COUNT);
    let system = format!(
        "You are an expert blog writer. Write engaging, original content that follows the supplied outline.\n\
         Guidelines:\n\
         - Write in a {tone} tone\n\
         - Aim for roughly {word_count} words\n\
         - Work the target keywords in naturally\n\
         - Keep it search-friendly but readable\n\
         - Format the body as HTML paragraphs and headings\n\
         - Open with a compelling introduction and close with a conclusion\n\n\
         Respond with a single JSON object of this shape:\n\
         {{\n  \"content\": \"Full blog content in HTML format\",\n  \"word_count\": 1500,\n  \"reading_time\": 7\n}}"
    );

    let outline = serde_json::to_string(&req.outline).unwrap_or_else(|_| "[]".to_string());
    let user = format!(
        "Write the full blog post titled \"{}\" based on this outline:\n{}\n\nTarget Keywords: {}",
        req.title,
        outline,
        keyword_list(&req.keywords),
    );

    Prompt {
        action: AiAction::GenerateContent,
        system,
        user,
    }
}

pub fn seo_prompt(req: &SeoRequest) -> Prompt {
    Prompt {
        action: AiAction::SeoAnalyze,
        system: SEO_SYSTEM.to_string(),
        user: format!(
            "Analyze this blog content for SEO:\n\nTitle: {}\n\nContent: {}\n\nTarget Keywords: {}",
            req.title,
            req.content,
            keyword_list(&req.keywords),
        ),
    }
}

pub fn rewrite_prompt(req: &RewriteRequest) -> Prompt {
    Prompt {
        action: AiAction::Rewrite,
        system: REWRITE_SYSTEM.to_string(),
        user: format!(
            "Rewrite this content:\n{}\n\nTone: {}\nGoal: {}",
            req.content,
            req.tone.unwrap_or_default(),
            req.goal.as_deref().unwrap_or(DEFAULT_GOAL),
        ),
    }
}

pub fn expand_prompt(req: &ExpandRequest) -> Prompt {
    Prompt {
        action: AiAction::Expand,
        system: EXPAND_SYSTEM.to_string(),
        user: format!(
            "Expand this content with more details:\n{}\n\nTarget additional words: {}",
            req.content,
            req.additional_words.unwrap_or(DEFAULT_ADDITIONAL_WORDS),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline_request() -> OutlineRequest {
        OutlineRequest {
            topic: "Async Rust".to_string(),
            keywords: vec!["tokio".to_string(), "futures".to_string()],
            audience: None,
            tone: None,
            word_count: None,
            seo_focus: None,
        }
    }

    #[test]
    fn test_outline_prompt_applies_defaults() {
        let prompt = outline_prompt(&outline_request(), Tone::default());
        assert_eq!(prompt.action, AiAction::GenerateOutline);
        assert!(prompt.user.contains("Topic: Async Rust"));
        assert!(prompt.user.contains("Target Audience: general readers"));
        assert!(prompt.user.contains("Tone: professional"));
        assert!(prompt.user.contains("Target Word Count: 1500"));
        assert!(prompt.user.contains("SEO Focus: Google"));
        assert!(prompt.user.contains("Keywords: tokio, futures"));
        assert!(prompt.system.contains("title_options"));
    }

    #[test]
    fn test_content_prompt_embeds_tone_and_outline() {
        let req = ContentRequest {
            outline: vec![OutlineItem {
                level: "h2".to_string(),
                text: "Why async".to_string(),
            }],
            title: "Async Rust".to_string(),
            keywords: vec![],
            tone: None,
            word_count: Some(800),
        };
        let prompt = content_prompt(&req, Tone::Casual);
        assert!(prompt.system.contains("Write in a casual tone"));
        assert!(prompt.system.contains("roughly 800 words"));
        assert!(prompt.user.contains(r#"{"level":"h2","text":"Why async"}"#));
    }

    #[test]
    fn test_rewrite_and_expand_defaults() {
        let rewrite = rewrite_prompt(&RewriteRequest {
            content: "Text".to_string(),
            tone: None,
            goal: None,
        });
        assert!(rewrite.user.contains("Goal: improve clarity and engagement"));
        assert!(rewrite.user.contains("Tone: professional"));

        let expand = expand_prompt(&ExpandRequest {
            content: "Text".to_string(),
            additional_words: None,
        });
        assert!(expand.user.contains("Target additional words: 200"));
    }

    #[test]
    fn test_outline_request_validation() {
        let mut req = outline_request();
        assert!(req.validate().is_ok());

        req.word_count = Some(100);
        assert!(req.validate().is_err());

        req.word_count = None;
        req.keywords = vec!["k".repeat(51)];
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("keywords"));

        req.keywords = vec![];
        req.topic = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_unknown_tone_is_rejected() {
        let result = serde_json::from_str::<RewriteRequest>(r#"{"content":"x","tone":"angry"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_range() {
        let req = ExpandRequest {
            content: "x".to_string(),
            additional_words: Some(2000),
        };
        assert!(req.validate().is_err());
    }
}
