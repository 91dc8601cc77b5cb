//! Judging Pipeline (§4.9, C8): sandboxed test execution, score
//! aggregation, hint penalty, and winner determination. Elo itself lives
//! in `duel_match::elo`, applied by the caller once a non-fallback
//! [`JudgingOutcome`] is in hand.

mod grader;
mod pipeline;
mod sandbox;
pub mod score;

pub use grader::AiGrader;
pub use grader::QualityBreakdown;
pub use pipeline::JudgingOutcome;
pub use pipeline::PlayerResult;
pub use pipeline::Submission;
pub use pipeline::judge;
pub use sandbox::Sandbox;
pub use sandbox::SandboxRequest;
pub use sandbox::SandboxResponse;
pub use score::TestCase;
