use crate::AiGrader;
use crate::QualityBreakdown;
use crate::Sandbox;
use crate::SandboxRequest;
use crate::TestCase;
use crate::score;
use duel_core::JUDGING_WATCHDOG;
use duel_core::SANDBOX_CASE_TIMEOUT;
use duel_core::SANDBOX_SUBMIT_TIMEOUT;
use duel_dto::TestCaseResult;

/// One player's submission as the pipeline needs it (§4.9 input).
pub struct Submission<'a> {
    pub language: &'a str,
    pub code: &'a str,
    pub hints_used: u8,
}

/// A single player's scored outcome.
#[derive(Debug, Clone)]
pub struct PlayerResult {
    pub test_results: Vec<TestCaseResult>,
    pub correctness: f32,
    pub efficiency: f32,
    pub quality: f32,
    pub creativity: f32,
    pub final_score: f32,
}

/// The judging pipeline's result (§4.9, §9 "pipeline functions return
/// `{outcome | fallback_outcome, error?}`"). `fallback` is true exactly
/// when the global watchdog fired; callers must not apply a rating update
/// in that case (§9 resolved open question).
#[derive(Debug, Clone)]
pub struct JudgingOutcome {
    pub player1: PlayerResult,
    pub player2: PlayerResult,
    /// `Some(true)` player1 wins, `Some(false)` player2 wins, `None` tie.
    pub player1_wins: Option<bool>,
    pub feedback: String,
    pub fallback: bool,
}

impl JudgingOutcome {
    fn fallback() -> Self {
        let empty = PlayerResult {
            test_results: Vec::new(),
            correctness: 0.0,
            efficiency: 0.0,
            quality: 0.0,
            creativity: 0.0,
            final_score: 0.0,
        };
        Self {
            player1: empty.clone(),
            player2: empty,
            player1_wins: None,
            feedback: String::new(),
            fallback: true,
        }
    }
}

/// Runs every test case for one submission against the sandbox, honoring
/// both the per-case deadline and the whole-submission deadline (§4.9 step
/// 1, §5 suspension points).
async fn run_submission<S: Sandbox>(sandbox: &S, submission: &Submission<'_>, cases: &[TestCase]) -> Vec<TestCaseResult> {
    let run_all = async {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let request = SandboxRequest {
                language: submission.language,
                code: submission.code,
                test_input_json: &case.input,
                timeout_ms: SANDBOX_CASE_TIMEOUT.as_millis() as u64,
            };
            let outcome = tokio::time::timeout(SANDBOX_CASE_TIMEOUT, sandbox.execute(request)).await;
            results.push(to_test_case_result(case, outcome));
        }
        results
    };
    match tokio::time::timeout(SANDBOX_SUBMIT_TIMEOUT, run_all).await {
        Ok(results) => results,
        Err(_) => cases
            .iter()
            .map(|case| TestCaseResult {
                passed: false,
                hidden: case.hidden,
                actual_output: None,
                stdout: String::new(),
                stderr: String::new(),
                execution_time_ms: SANDBOX_SUBMIT_TIMEOUT.as_millis() as u64,
                timed_out: true,
                shielded: false,
            })
            .collect(),
    }
}

fn to_test_case_result(
    case: &TestCase,
    outcome: Result<anyhow::Result<crate::SandboxResponse>, tokio::time::error::Elapsed>,
) -> TestCaseResult {
    match outcome {
        Ok(Ok(response)) => TestCaseResult {
            passed: !response.timed_out && score::outputs_match(&response.stdout, &case.expected_output),
            hidden: case.hidden,
            actual_output: Some(response.stdout.clone()),
            stdout: response.stdout,
            stderr: response.stderr,
            execution_time_ms: response.execution_time_ms,
            timed_out: response.timed_out,
            shielded: false,
        },
        Ok(Err(err)) => {
            log::warn!("sandbox execution failed: {}", err);
            TestCaseResult {
                passed: false,
                hidden: case.hidden,
                actual_output: None,
                stdout: String::new(),
                stderr: err.to_string(),
                execution_time_ms: 0,
                timed_out: false,
                shielded: false,
            }
        }
        Err(_) => TestCaseResult {
            passed: false,
            hidden: case.hidden,
            actual_output: None,
            stdout: String::new(),
            stderr: String::new(),
            execution_time_ms: SANDBOX_CASE_TIMEOUT.as_millis() as u64,
            timed_out: true,
            shielded: false,
        },
    }
}

async fn grade<G: AiGrader>(grader: &G, code: &str, language: &str, context: &str) -> QualityBreakdown {
    match grader.analyze_code_quality(code, language, context).await {
        Ok(breakdown) => breakdown,
        Err(err) => {
            log::warn!("AI grader failed, using deterministic defaults: {}", err);
            QualityBreakdown::fallback_default()
        }
    }
}

/// Drives the full §4.9 pipeline for both players at once (scores are
/// compared across players, so they cannot be computed independently):
/// sandbox execution, correctness/efficiency scoring, AI quality grading,
/// hint penalty, and winner determination. A global watchdog forces the
/// §4.5 fallback completion (null winner, empty feedback) rather than
/// leaving the match stuck `active`.
pub async fn judge<S, G>(
    sandbox: &S,
    grader: &G,
    context: &str,
    cases: &[TestCase],
    player1: Submission<'_>,
    player2: Submission<'_>,
) -> JudgingOutcome
where
    S: Sandbox,
    G: AiGrader,
{
    let run = async {
        let (results1, results2) = tokio::join!(
            run_submission(sandbox, &player1, cases),
            run_submission(sandbox, &player2, cases),
        );
        let correctness1 = score::correctness_score(cases, &results1);
        let correctness2 = score::correctness_score(cases, &results2);

        let mean1 = score::mean_execution_ms(&results1);
        let mean2 = score::mean_execution_ms(&results2);
        let baseline = median_of_two(mean1, mean2);
        let efficiency1 = score::efficiency_score(mean1, baseline);
        let efficiency2 = score::efficiency_score(mean2, baseline);

        let (quality1, quality2) = tokio::join!(
            grade(grader, player1.code, player1.language, context),
            grade(grader, player2.code, player2.language, context),
        );

        let total1 = score::total_score(correctness1, efficiency1, quality1.quality, quality1.creativity);
        let total2 = score::total_score(correctness2, efficiency2, quality2.quality, quality2.creativity);
        let final1 = score::apply_hint_penalty(total1, player1.hints_used);
        let final2 = score::apply_hint_penalty(total2, player2.hints_used);

        let player1_wins = if final1 > final2 {
            Some(true)
        } else if final2 > final1 {
            Some(false)
        } else {
            None
        };

        let feedback = [quality1.feedback, quality2.feedback].join("\n").trim().to_string();

        JudgingOutcome {
            player1: PlayerResult {
                test_results: results1,
                correctness: correctness1,
                efficiency: efficiency1,
                quality: quality1.quality,
                creativity: quality1.creativity,
                final_score: final1,
            },
            player2: PlayerResult {
                test_results: results2,
                correctness: correctness2,
                efficiency: efficiency2,
                quality: quality2.quality,
                creativity: quality2.creativity,
                final_score: final2,
            },
            player1_wins,
            feedback,
            fallback: false,
        }
    };

    match tokio::time::timeout(JUDGING_WATCHDOG, run).await {
        Ok(outcome) => outcome,
        Err(_) => {
            log::error!("judging watchdog exceeded {:?}, forcing fallback completion", JUDGING_WATCHDOG);
            JudgingOutcome::fallback()
        }
    }
}

fn median_of_two(a: f32, b: f32) -> f32 {
    if a <= 0.0 {
        b
    } else if b <= 0.0 {
        a
    } else {
        (a + b) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SandboxResponse;

    struct EchoSandbox;
    impl Sandbox for EchoSandbox {
        async fn execute(&self, request: SandboxRequest<'_>) -> anyhow::Result<SandboxResponse> {
            Ok(SandboxResponse {
                stdout: request.test_input_json.to_string(),
                stderr: String::new(),
                exit_code: 0,
                execution_time_ms: 5,
                memory_bytes: 0,
                timed_out: false,
            })
        }
    }

    struct FixedGrader;
    impl AiGrader for FixedGrader {
        async fn analyze_code_quality(&self, _code: &str, _language: &str, _context: &str) -> anyhow::Result<QualityBreakdown> {
            Ok(QualityBreakdown {
                quality: 8.0,
                creativity: 6.0,
                feedback: "looks good".into(),
            })
        }
        async fn generate_hint(&self, _code: &str, _language: &str, _context: &str, _level: u8) -> anyhow::Result<String> {
            Ok("try a hash map".into())
        }
    }

    fn cases() -> Vec<TestCase> {
        vec![TestCase {
            input: "42".into(),
            expected_output: "42".into(),
            hidden: false,
            weight: 1.0,
        }]
    }

    #[tokio::test]
    async fn identical_correct_submissions_tie() {
        let outcome = judge(
            &EchoSandbox,
            &FixedGrader,
            "ctx",
            &cases(),
            Submission { language: "rust", code: "a", hints_used: 0 },
            Submission { language: "rust", code: "b", hints_used: 0 },
        )
        .await;
        assert_eq!(outcome.player1_wins, None);
        assert!(!outcome.fallback);
        assert_eq!(outcome.player1.correctness, 400.0);
    }

    #[tokio::test]
    async fn hint_usage_breaks_a_tie_in_favor_of_the_non_hinter() {
        let outcome = judge(
            &EchoSandbox,
            &FixedGrader,
            "ctx",
            &cases(),
            Submission { language: "rust", code: "a", hints_used: 2 },
            Submission { language: "rust", code: "b", hints_used: 0 },
        )
        .await;
        assert_eq!(outcome.player1_wins, Some(false));
    }
}
