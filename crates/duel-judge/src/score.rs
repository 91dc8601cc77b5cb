use duel_core::SCORE_CORRECTNESS_MAX;
use duel_core::SCORE_CREATIVITY_MAX;
use duel_core::SCORE_EFFICIENCY_MAX;
use duel_core::SCORE_QUALITY_MAX;
use duel_core::Score;
use duel_dto::TestCaseResult;

/// A test case as the judging pipeline needs it (§3 `Challenge.TestCase`).
#[derive(Debug, Clone)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    pub hidden: bool,
    pub weight: f32,
}

/// §4.9 step 2: weighted sum of passed test cases over total weight,
/// scaled to `0..SCORE_CORRECTNESS_MAX`. Hidden tests count the same as
/// visible ones.
pub fn correctness_score(cases: &[TestCase], results: &[TestCaseResult]) -> Score {
    let total_weight: f32 = cases.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let passed_weight: f32 = cases
        .iter()
        .zip(results.iter())
        .filter(|(_, r)| r.passed)
        .map(|(c, _)| c.weight)
        .sum();
    (passed_weight / total_weight) * SCORE_CORRECTNESS_MAX
}

/// §4.9 step 3: scaled from mean per-case execution time vs. a baseline
/// (the median of both players' means when no known-optimal baseline
/// exists). A submission at or faster than the baseline scores the full
/// `SCORE_EFFICIENCY_MAX`; slower submissions scale down proportionally.
pub fn efficiency_score(mean_execution_ms: f32, baseline_ms: f32) -> Score {
    if mean_execution_ms <= 0.0 || baseline_ms <= 0.0 {
        return SCORE_EFFICIENCY_MAX;
    }
    let ratio = baseline_ms / mean_execution_ms;
    ratio.min(1.0).max(0.0) * SCORE_EFFICIENCY_MAX
}

/// Mean per-case execution time across `results`, or 0 if there were none.
pub fn mean_execution_ms(results: &[TestCaseResult]) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    let total: u64 = results.iter().map(|r| r.execution_time_ms).sum();
    total as f32 / results.len() as f32
}

/// Structural (deep-equal over JSON) comparison of a test case's actual
/// output against its expected output, falling back to a string compare
/// when either side fails to parse as JSON (§4.9 step 1).
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    match (
        serde_json::from_str::<serde_json::Value>(actual),
        serde_json::from_str::<serde_json::Value>(expected),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => actual.trim() == expected.trim(),
    }
}

/// §4.9 step 4: `correctness + efficiency + quality + creativity`.
pub fn total_score(correctness: Score, efficiency: Score, quality_raw: f32, creativity_raw: f32) -> Score {
    let quality = (quality_raw / 10.0) * SCORE_QUALITY_MAX;
    let creativity = (creativity_raw / 10.0) * SCORE_CREATIVITY_MAX;
    correctness + efficiency + quality + creativity
}

/// §4.9 step 6: the hint penalty, applied on top of [`total_score`].
pub fn apply_hint_penalty(total: Score, hints_used: u8) -> Score {
    total * (1.0 - duel_core::HINT_PENALTY * hints_used.min(3) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(passed: bool, execution_time_ms: u64) -> TestCaseResult {
        TestCaseResult {
            passed,
            hidden: false,
            actual_output: None,
            stdout: String::new(),
            stderr: String::new(),
            execution_time_ms,
            timed_out: false,
            shielded: false,
        }
    }

    #[test]
    fn correctness_scales_weighted_passes_to_400() {
        let cases = vec![
            TestCase { input: "".into(), expected_output: "".into(), hidden: false, weight: 1.0 },
            TestCase { input: "".into(), expected_output: "".into(), hidden: true, weight: 3.0 },
        ];
        let results = vec![result(true, 1), result(false, 1)];
        assert_eq!(correctness_score(&cases, &results), 100.0); // 1/4 weight passed
    }

    #[test]
    fn efficiency_caps_at_max_when_faster_than_baseline() {
        assert_eq!(efficiency_score(50.0, 100.0), SCORE_EFFICIENCY_MAX);
    }

    #[test]
    fn efficiency_scales_down_when_slower_than_baseline() {
        assert_eq!(efficiency_score(200.0, 100.0), SCORE_EFFICIENCY_MAX * 0.5);
    }

    #[test]
    fn hint_penalty_matches_spec_formula() {
        assert_eq!(apply_hint_penalty(800.0, 2), 720.0);
        assert_eq!(apply_hint_penalty(760.0, 0), 760.0);
    }

    #[test]
    fn structural_output_comparison_ignores_json_formatting() {
        assert!(outputs_match("[1, 2, 3]", "[1,2,3]"));
        assert!(outputs_match(" hello ", "hello"));
        assert!(!outputs_match("[1,2]", "[1,3]"));
    }
}
