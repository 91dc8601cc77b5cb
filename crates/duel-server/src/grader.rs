//! AI-assisted quality analysis and hint generation (§6.5), backed by an
//! HTTP call to an external model-serving endpoint. Same external
//! collaborator shape as [`crate::sandbox::HttpSandbox`].

use duel_judge::AiGrader;
use duel_judge::QualityBreakdown;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone)]
pub struct HttpAiGrader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAiGrader {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: std::env::var("AI_GRADER_URL").expect("AI_GRADER_URL must be set"),
        }
    }
}

#[derive(Serialize)]
struct AnalyzeBody<'a> {
    code: &'a str,
    language: &'a str,
    context: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    quality: f32,
    creativity: f32,
    feedback: String,
}

#[derive(Serialize)]
struct HintBody<'a> {
    code: &'a str,
    language: &'a str,
    context: &'a str,
    level: u8,
}

#[derive(Deserialize)]
struct HintResponse {
    hint: String,
}

impl AiGrader for HttpAiGrader {
    async fn analyze_code_quality(&self, code: &str, language: &str, context: &str) -> anyhow::Result<QualityBreakdown> {
        let body = AnalyzeBody { code, language, context };
        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<AnalyzeResponse>()
            .await?;
        Ok(QualityBreakdown {
            quality: response.quality,
            creativity: response.creativity,
            feedback: response.feedback,
        })
    }

    async fn generate_hint(&self, code: &str, language: &str, context: &str, level: u8) -> anyhow::Result<String> {
        let body = HintBody { code, language, context, level };
        let response = self
            .client
            .post(format!("{}/hint", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<HintResponse>()
            .await?;
        Ok(response.hint)
    }
}
