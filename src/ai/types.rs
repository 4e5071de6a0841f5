//! Typed shapes of the JSON objects the model is asked to return.
//!
//! Models are loose with number types (`"1500"`, `1500.0`), so numeric
//! fields accept integers, floats and numeric strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value).map(|n| n.round() as i64).unwrap_or(0))
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value).unwrap_or(0.0))
}

/// Heading entry of a generated outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineItem {
    pub level: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineResult {
    #[serde(default)]
    pub title_options: Vec<String>,
    pub outline: Vec<OutlineItem>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub estimated_word_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentResult {
    pub content: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub word_count: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub reading_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoAnalysis {
    #[serde(deserialize_with = "lenient_i64")]
    pub seo_score: i64,
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub keyword_density: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub readability_score: i64,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl SeoAnalysis {
    /// Score clamped to the stored 0-100 range.
    pub fn clamped_score(&self) -> i32 {
        self.seo_score.clamp(0, 100) as i32
    }

    pub fn clamped_readability(&self) -> i32 {
        self.readability_score.clamp(0, 100) as i32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteResult {
    pub rewritten_content: String,
    #[serde(default)]
    pub changes_made: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandResult {
    pub expanded_content: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub added_word_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_accepts_float_and_string_counts() {
        let outline: OutlineResult = serde_json::from_str(
            r#"{"title_options":["A"],"outline":[{"level":"h1","text":"A"}],"estimated_word_count":"1500"}"#,
        )
        .unwrap();
        assert_eq!(outline.estimated_word_count, 1500);

        let outline: OutlineResult =
            serde_json::from_str(r#"{"outline":[],"estimated_word_count":1499.6}"#).unwrap();
        assert_eq!(outline.estimated_word_count, 1500);
        assert!(outline.title_options.is_empty());
    }

    #[test]
    fn test_outline_requires_outline_field() {
        let result = serde_json::from_str::<OutlineResult>(r#"{"title_options":["A"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_seo_analysis_clamps_and_parses_percentages() {
        let seo: SeoAnalysis = serde_json::from_str(
            r#"{"seo_score":140,"keyword_density":"2.5%","readability_score":-3}"#,
        )
        .unwrap();
        assert_eq!(seo.clamped_score(), 100);
        assert_eq!(seo.clamped_readability(), 0);
        assert!((seo.keyword_density - 2.5).abs() < f64::EPSILON);
    }
}
