/// Quality/creativity breakdown from the external AI grader (§4.9 step 4).
#[derive(Debug, Clone)]
pub struct QualityBreakdown {
    /// 0..10 raw quality rating from the grader, scaled by the caller to
    /// [`duel_core::SCORE_QUALITY_MAX`].
    pub quality: f32,
    /// 0..10 raw creativity rating, scaled to
    /// [`duel_core::SCORE_CREATIVITY_MAX`].
    pub creativity: f32,
    pub feedback: String,
}

impl QualityBreakdown {
    /// §4.9 step 4 fallback: "on grader failure use deterministic defaults
    /// (5/10 each, scaled)".
    pub fn fallback_default() -> Self {
        Self {
            quality: 5.0,
            creativity: 5.0,
            feedback: String::new(),
        }
    }
}

/// External collaborator (§6.5): AI-assisted code analysis. `context`
/// carries whatever the grader needs beyond the raw code (challenge
/// description, test outcomes) — this crate treats it as an opaque string.
#[allow(async_fn_in_trait)]
pub trait AiGrader {
    async fn analyze_code_quality(&self, code: &str, language: &str, context: &str) -> anyhow::Result<QualityBreakdown>;

    /// §6.5 `GenerateHint`. Lives on the same trait as code-quality analysis
    /// since both are "ask the model about this submission" calls sharing
    /// one external boundary; the hint-specific cooldown/redaction logic
    /// stays in `duel_match::hint`.
    async fn generate_hint(&self, code: &str, language: &str, context: &str, level: u8) -> anyhow::Result<String>;
}
