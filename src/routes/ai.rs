/**
 * AI Routes
 * Outline, content, SEO, rewrite and expand generation through the model provider
 */
use axum::{http::HeaderMap, Extension};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::ai::{
    generate,
    prompts::{
        content_prompt, expand_prompt, outline_prompt, rewrite_prompt, seo_prompt,
        ContentRequest, ExpandRequest, OutlineRequest, RewriteRequest, SeoRequest,
    },
    truncate_chars,
    types::{ContentResult, ExpandResult, OutlineResult, RewriteResult, SeoAnalysis},
    usage_log, CompletionProvider, Generation, Prompt,
};
use crate::db::{self, models::SeoMetadataInput, models::Tone};
use crate::routes::{
    auth::{require_user, Claims},
    blogs::ensure_can_access,
    pool, ApiError, ApiResult, Json,
};

/// Shared provider handle injected as a request extension
pub type Provider = Arc<dyn CompletionProvider>;

const META_TITLE_MAX: usize = 60;
const META_DESCRIPTION_MAX: usize = 155;

/// Successful generation: `{ message, data, tokens_used }`
#[derive(Debug, Serialize)]
pub struct AiResponse<T> {
    pub message: &'static str,
    pub data: T,
    pub tokens_used: i64,
}

fn respond<T>(message: &'static str, generation: Generation<T>) -> Json<AiResponse<T>> {
    Json(AiResponse {
        message,
        data: generation.data,
        tokens_used: generation.tokens_used,
    })
}

/// Tone from the request, else the caller's saved preference, else the default.
async fn resolve_tone(requested: Option<Tone>, claims: &Claims) -> Tone {
    if let Some(tone) = requested {
        return tone;
    }
    let (Some(pool), Ok(user_id)) = (db::get_pool(), claims.user_id()) else {
        return Tone::default();
    };
    match db::users::find_by_id(&pool, user_id).await {
        Ok(Some(user)) => user.preferences.0.tone.unwrap_or_default(),
        Ok(None) => Tone::default(),
        Err(e) => {
            tracing::warn!(error = %e, "could not load tone preference");
            Tone::default()
        }
    }
}

/// Run one provider call and append its usage log.
///
/// A failed log write is reported but does not fail the request.
async fn run<T: DeserializeOwned>(
    provider: &dyn CompletionProvider,
    claims: &Claims,
    prompt: &Prompt,
    failure: &'static str,
) -> ApiResult<Generation<T>> {
    let generation = generate::<T>(provider, prompt)
        .await
        .map_err(|source| ApiError::Ai {
            message: failure,
            source,
        })?;

    match (db::get_pool(), claims.user_id()) {
        (Some(pool), Ok(user_id)) => {
            let log = usage_log(user_id, prompt, &generation);
            if let Err(e) = db::ai_logs::insert(&pool, &log).await {
                tracing::error!(error = %e, action = prompt.action.as_str(), "failed to record AI usage");
            }
        }
        _ => tracing::debug!(
            action = prompt.action.as_str(),
            "no database, AI usage not recorded"
        ),
    }

    Ok(generation)
}

/// Fields of an analysis that are written to a blog's SEO metadata.
fn seo_input(analysis: &SeoAnalysis) -> SeoMetadataInput {
    let non_empty = |s: &str, max: usize| {
        let s = s.trim();
        (!s.is_empty()).then(|| truncate_chars(s, max).to_string())
    };
    SeoMetadataInput {
        meta_title: non_empty(&analysis.meta_title, META_TITLE_MAX),
        meta_description: non_empty(&analysis.meta_description, META_DESCRIPTION_MAX),
        keywords: Some(analysis.keywords.clone()),
        keyword_density: Some(analysis.keyword_density),
        readability_score: Some(analysis.clamped_readability()),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/ai/generate-outline
pub async fn generate_outline(
    headers: HeaderMap,
    Extension(provider): Extension<Provider>,
    Json(payload): Json<OutlineRequest>,
) -> ApiResult<Json<AiResponse<OutlineResult>>> {
    let claims = require_user(&headers)?;
    payload.validate()?;

    let tone = resolve_tone(payload.tone, &claims).await;
    let prompt = outline_prompt(&payload, tone);
    let generation = run(provider.as_ref(), &claims, &prompt, "Failed to generate outline").await?;

    Ok(respond("Outline generated successfully", generation))
}

/// POST /api/ai/generate-content
pub async fn generate_content(
    headers: HeaderMap,
    Extension(provider): Extension<Provider>,
    Json(payload): Json<ContentRequest>,
) -> ApiResult<Json<AiResponse<ContentResult>>> {
    let claims = require_user(&headers)?;
    payload.validate()?;

    let tone = resolve_tone(payload.tone, &claims).await;
    let prompt = content_prompt(&payload, tone);
    let generation = run(provider.as_ref(), &claims, &prompt, "Failed to generate content").await?;

    Ok(respond("Content generated successfully", generation))
}

/// POST /api/ai/seo-analyze
///
/// With a `blog_id` the analysis is also saved to that blog; access is
/// checked before the provider is called.
pub async fn seo_analyze(
    headers: HeaderMap,
    Extension(provider): Extension<Provider>,
    Json(payload): Json<SeoRequest>,
) -> ApiResult<Json<AiResponse<SeoAnalysis>>> {
    let claims = require_user(&headers)?;
    payload.validate()?;

    let target: Option<Uuid> = match payload.blog_id {
        Some(blog_id) => {
            let pool = pool()?;
            let blog = db::blogs::find(&pool, blog_id)
                .await?
                .ok_or(ApiError::NotFound)?;
            ensure_can_access(&claims, blog.blog.user_id)?;
            Some(blog_id)
        }
        None => None,
    };

    let prompt = seo_prompt(&payload);
    let generation: Generation<SeoAnalysis> =
        run(provider.as_ref(), &claims, &prompt, "Failed to analyze SEO").await?;

    if let Some(blog_id) = target {
        let pool = pool()?;
        db::blogs::set_seo_score(&pool, blog_id, generation.data.clamped_score()).await?;
        db::blogs::upsert_seo(&pool, blog_id, &seo_input(&generation.data)).await?;
        tracing::info!(blog_id = %blog_id, seo_score = generation.data.clamped_score(), "SEO analysis saved");
    }

    Ok(respond("SEO analysis complete", generation))
}

/// POST /api/ai/rewrite
pub async fn rewrite(
    headers: HeaderMap,
    Extension(provider): Extension<Provider>,
    Json(payload): Json<RewriteRequest>,
) -> ApiResult<Json<AiResponse<RewriteResult>>> {
    let claims = require_user(&headers)?;
    payload.validate()?;

    let prompt = rewrite_prompt(&payload);
    let generation = run(provider.as_ref(), &claims, &prompt, "Failed to rewrite content").await?;

    Ok(respond("Content rewritten successfully", generation))
}

/// POST /api/ai/expand
pub async fn expand(
    headers: HeaderMap,
    Extension(provider): Extension<Provider>,
    Json(payload): Json<ExpandRequest>,
) -> ApiResult<Json<AiResponse<ExpandResult>>> {
    let claims = require_user(&headers)?;
    payload.validate()?;

    let prompt = expand_prompt(&payload);
    let generation = run(provider.as_ref(), &claims, &prompt, "Failed to expand content").await?;

    Ok(respond("Content expanded successfully", generation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::MockProvider;
    use crate::ai::AiError;
    use crate::routes::auth::create_access_token;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn ai_router(provider: Arc<MockProvider>) -> Router {
        let provider: Provider = provider;
        Router::new()
            .route("/api/ai/generate-outline", post(generate_outline))
            .route("/api/ai/generate-content", post(generate_content))
            .route("/api/ai/seo-analyze", post(seo_analyze))
            .route("/api/ai/rewrite", post(rewrite))
            .route("/api/ai/expand", post(expand))
            .layer(Extension(provider))
    }

    fn token() -> String {
        create_access_token(&Uuid::new_v4().to_string(), "w@example.com", "writer").unwrap()
    }

    async fn post_json(
        app: Router,
        uri: &str,
        token: Option<&str>,
        json: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::post(uri).header("content-type", "application/json");
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {}", token));
        }
        let req = req
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_outline_returns_data_and_tokens() {
        let provider = Arc::new(MockProvider::replying(
            r#"{"title_options":["A","B"],"outline":[{"level":"h1","text":"A"}],"estimated_word_count":1200}"#,
            150,
        ));
        let (status, body) = post_json(
            ai_router(provider.clone()),
            "/api/ai/generate-outline",
            Some(&token()),
            serde_json::json!({"topic": "Ownership in Rust", "tone": "technical"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Outline generated successfully");
        assert_eq!(body["tokens_used"], 150);
        assert_eq!(body["data"]["outline"][0]["text"], "A");
        assert_eq!(body["data"]["estimated_word_count"], 1200);

        let seen = provider.seen.lock().unwrap();
        assert!(seen[0].1.contains("Topic: Ownership in Rust"));
        assert!(seen[0].1.contains("Tone: technical"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported() {
        let provider = Arc::new(MockProvider::failing(|| AiError::NotConfigured));
        let (status, body) = post_json(
            ai_router(provider),
            "/api/ai/rewrite",
            Some(&token()),
            serde_json::json!({"content": "Some text"}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to rewrite content");
        assert!(body["error"].as_str().unwrap().contains("GROQ_API_KEY"));
    }

    #[tokio::test]
    async fn test_malformed_model_output_is_an_error() {
        let provider = Arc::new(MockProvider::replying("not json at all", 10));
        let (status, body) = post_json(
            ai_router(provider),
            "/api/ai/expand",
            Some(&token()),
            serde_json::json!({"content": "Short text", "additional_words": 100}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to expand content");
    }

    #[tokio::test]
    async fn test_validation_runs_before_provider() {
        let provider = Arc::new(MockProvider::replying("{}", 0));
        let (status, body) = post_json(
            ai_router(provider.clone()),
            "/api/ai/generate-content",
            Some(&token()),
            serde_json::json!({"outline": [], "title": "T", "word_count": 10}),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["outline"].is_array());
        assert!(body["errors"]["word_count"].is_array());
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tone_is_a_field_error() {
        let provider = Arc::new(MockProvider::replying("{}", 0));
        let (status, body) = post_json(
            ai_router(provider.clone()),
            "/api/ai/generate-outline",
            Some(&token()),
            serde_json::json!({"topic": "Rust", "tone": "angry"}),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["tone"][0], "The tone field is invalid.");
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let provider = Arc::new(MockProvider::replying("{}", 0));
        let (status, _) = post_json(
            ai_router(provider),
            "/api/ai/seo-analyze",
            None,
            serde_json::json!({"title": "T", "content": "C"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_seo_analyze_without_blog_id() {
        let provider = Arc::new(MockProvider::replying(
            r#"{"seo_score":72,"meta_title":"T","meta_description":"D","keywords":["k"],"keyword_density":1.5,"readability_score":64,"suggestions":["More links"]}"#,
            90,
        ));
        let (status, body) = post_json(
            ai_router(provider),
            "/api/ai/seo-analyze",
            Some(&token()),
            serde_json::json!({"title": "T", "content": "<p>C</p>", "keywords": ["k"]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "SEO analysis complete");
        assert_eq!(body["data"]["seo_score"], 72);
        assert_eq!(body["data"]["suggestions"][0], "More links");
    }

    #[tokio::test]
    async fn test_seo_analyze_for_blog_needs_database() {
        let provider = Arc::new(MockProvider::replying("{}", 0));
        let (status, _) = post_json(
            ai_router(provider.clone()),
            "/api/ai/seo-analyze",
            Some(&token()),
            serde_json::json!({"title": "T", "content": "C", "blog_id": Uuid::new_v4()}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_seo_input_truncates_and_skips_blank_fields() {
        let analysis: SeoAnalysis = serde_json::from_value(serde_json::json!({
            "seo_score": 50,
            "meta_title": "x".repeat(80),
            "meta_description": "   ",
            "readability_score": 120
        }))
        .unwrap();
        let input = seo_input(&analysis);
        assert_eq!(input.meta_title.unwrap().len(), META_TITLE_MAX);
        assert_eq!(input.meta_description, None);
        assert_eq!(input.readability_score, Some(100));
    }
}
