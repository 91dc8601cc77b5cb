//! Challenge catalog (§4.4 step 3, §6.3): the read side matchmaking and
//! judging both depend on but neither owns. Kept as a narrow external
//! collaborator so C4 and C8 never reach into a concrete problem-bank
//! schema directly.

#[cfg(feature = "database")]
pub mod repository;
#[cfg(feature = "database")]
pub use repository::schema::Challenges;

use duel_core::ChallengeId;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// A single visible or hidden test case attached to a challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: serde_json::Value,
    pub expected_output: serde_json::Value,
    pub hidden: bool,
    pub weight: f32,
}

/// A competitive-programming problem: statement, starter code, and the
/// mixed visible/hidden test suite that the judging pipeline (C8) runs
/// submissions against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub title: String,
    pub statement_md: String,
    pub difficulty: Difficulty,
    pub starter_code: String,
    /// A known-correct solution, used only to synthesize an AI ghost
    /// (§4.10) when no human `GhostRecording` exists yet for this
    /// challenge. Never sent to clients.
    pub reference_solution: String,
    pub time_limit_secs: u32,
    pub test_cases: Vec<TestCase>,
}

impl Challenge {
    pub fn visible_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|c| !c.hidden)
    }
}

/// Read access to the problem bank. Implementations may be backed by
/// Postgres (`database` feature), a static fixture set, or anything else;
/// C4 and C8 only ever see this trait.
#[allow(async_fn_in_trait)]
pub trait ChallengeCatalog {
    /// A uniformly random published challenge matching `difficulty`, or any
    /// difficulty if `None` (§4.4 step 3).
    async fn random_for_difficulty(&self, difficulty: Option<Difficulty>) -> anyhow::Result<Option<Challenge>>;
    async fn get(&self, id: ChallengeId) -> anyhow::Result<Option<Challenge>>;
}

/// An immutable, in-process catalog useful for tests and for seeding a
/// fresh deployment before any challenges have been authored out-of-band.
pub struct StaticCatalog {
    challenges: Vec<Challenge>,
}

impl StaticCatalog {
    pub fn new(challenges: Vec<Challenge>) -> Self {
        Self { challenges }
    }
}

impl ChallengeCatalog for StaticCatalog {
    async fn random_for_difficulty(&self, difficulty: Option<Difficulty>) -> anyhow::Result<Option<Challenge>> {
        let matching: Vec<&Challenge> = self
            .challenges
            .iter()
            .filter(|c| difficulty.is_none_or(|d| c.difficulty == d))
            .collect();
        if matching.is_empty() {
            return Ok(None);
        }
        let pick = (duel_core::ID::<duel_core::Player>::default().inner().as_u128() as usize) % matching.len();
        Ok(Some(matching[pick].clone()))
    }

    async fn get(&self, id: ChallengeId) -> anyhow::Result<Option<Challenge>> {
        Ok(self.challenges.iter().find(|c| c.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(difficulty: Difficulty) -> Challenge {
        Challenge {
            id: ChallengeId::default(),
            title: "two sum".into(),
            statement_md: "# Two Sum".into(),
            difficulty,
            starter_code: "fn solve() {}".into(),
            reference_solution: "fn solve() { 3 }".into(),
            time_limit_secs: 600,
            test_cases: vec![TestCase {
                input: serde_json::json!([1, 2]),
                expected_output: serde_json::json!(3),
                hidden: false,
                weight: 1.0,
            }],
        }
    }

    #[tokio::test]
    async fn random_for_difficulty_filters_by_band() {
        let catalog = StaticCatalog::new(vec![sample(Difficulty::Easy), sample(Difficulty::Hard)]);
        let picked = catalog.random_for_difficulty(Some(Difficulty::Hard)).await.unwrap().unwrap();
        assert_eq!(picked.difficulty, Difficulty::Hard);
    }

    #[tokio::test]
    async fn random_for_difficulty_is_none_when_band_is_empty() {
        let catalog = StaticCatalog::new(vec![sample(Difficulty::Easy)]);
        let picked = catalog.random_for_difficulty(Some(Difficulty::Hard)).await.unwrap();
        assert!(picked.is_none());
    }
}
