use duel_core::HINT_COOLDOWN;
use duel_core::HINT_LIMIT;
use duel_core::HINT_PENALTY;
use std::time::Duration;
use std::time::Instant;

/// Per-(match, player) hint/coach state (§4.8). A failed AI generation must
/// not consume an attempt — `hints_used` only increments on success.
#[derive(Debug, Clone, Default)]
pub struct HintState {
    hints_used: u8,
    last_hint_at: Option<Instant>,
}

pub struct HintAvailability {
    pub allowed: bool,
    pub cooldown_remaining: Option<Duration>,
    pub hints_remaining: u8,
}

impl HintState {
    pub fn hints_used(&self) -> u8 {
        self.hints_used
    }

    pub fn availability(&self) -> HintAvailability {
        let cooldown_remaining = self
            .last_hint_at
            .map(|at| at + HINT_COOLDOWN)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .filter(|d| !d.is_zero());
        let hints_remaining = HINT_LIMIT.saturating_sub(self.hints_used);
        HintAvailability {
            allowed: hints_remaining > 0 && cooldown_remaining.is_none(),
            cooldown_remaining,
            hints_remaining,
        }
    }

    /// Records a successful hint generation. Callers must have already
    /// checked [`Self::availability`]; this does not re-validate.
    pub fn record_success(&mut self) {
        self.hints_used += 1;
        self.last_hint_at = Some(Instant::now());
    }

    /// The §4.9 step-6 score multiplier for this player's final score.
    pub fn penalty_multiplier(&self) -> f32 {
        1.0 - HINT_PENALTY * self.hints_used.min(3) as f32
    }
}

/// Scrubs a generated hint of any substring matching a hidden test case's
/// JSON-serialized input or expected output (§4.8), so the hint cannot leak
/// the answer verbatim. Case-insensitive; only strings longer than 2
/// characters are considered, to avoid redacting common short tokens.
pub fn redact_hidden_data(hint: &str, hidden_substrings: &[String]) -> String {
    let mut out = hint.to_string();
    for needle in hidden_substrings.iter().filter(|s| s.len() > 2) {
        out = redact_case_insensitive(&out, needle);
    }
    out
}

fn redact_case_insensitive(haystack: &str, needle: &str) -> String {
    let lower_hay = haystack.to_lowercase();
    let lower_needle = needle.to_lowercase();
    if lower_needle.is_empty() {
        return haystack.to_string();
    }
    let mut result = String::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut rest_lower = lower_hay.as_str();
    while let Some(pos) = rest_lower.find(&lower_needle) {
        result.push_str(&rest[..pos]);
        result.push_str("[REDACTED]");
        let skip = pos + lower_needle.len();
        rest = &rest[skip..];
        rest_lower = &rest_lower[skip..];
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_caps_at_three_hints() {
        let mut state = HintState::default();
        for _ in 0..3 {
            assert!(state.availability().allowed);
            state.record_success();
            // bypass cooldown for this test by resetting last_hint_at
            state.last_hint_at = None;
        }
        assert!(!state.availability().allowed);
        assert_eq!(state.availability().hints_remaining, 0);
    }

    #[test]
    fn cooldown_blocks_immediate_second_hint() {
        let mut state = HintState::default();
        state.record_success();
        let avail = state.availability();
        assert!(!avail.allowed);
        assert!(avail.cooldown_remaining.unwrap() <= HINT_COOLDOWN);
    }

    #[test]
    fn penalty_multiplier_matches_formula() {
        let mut state = HintState::default();
        assert_eq!(state.penalty_multiplier(), 1.0);
        state.hints_used = 2;
        assert!((state.penalty_multiplier() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn redaction_hides_hidden_values_case_insensitively() {
        let hint = "Try returning TARGET_VALUE directly from the loop.";
        let redacted = redact_hidden_data(hint, &["target_value".to_string()]);
        assert_eq!(redacted, "Try returning [REDACTED] directly from the loop.");
    }

    #[test]
    fn redaction_skips_very_short_needles() {
        let hint = "Use a for loop.";
        let redacted = redact_hidden_data(hint, &["a".to_string(), "".to_string()]);
        assert_eq!(redacted, hint);
    }
}
