use crate::Challenge;
use crate::Difficulty;
use crate::TestCase;
use duel_core::ChallengeId;
use std::sync::Arc;
use tokio_postgres::Client;

/// Postgres-backed [`crate::ChallengeCatalog`]. Lives behind the
/// `database` feature alongside `duel-pg`'s other repository impls.
impl crate::ChallengeCatalog for Arc<Client> {
    async fn random_for_difficulty(&self, difficulty: Option<Difficulty>) -> anyhow::Result<Option<Challenge>> {
        let row = match difficulty {
            Some(d) => {
                self.query_opt(
                    const_format::concatcp!(
                        "SELECT id, title, statement_md, difficulty, starter_code, reference_solution, time_limit_secs, test_cases FROM ",
                        duel_pg::CHALLENGES,
                        " WHERE difficulty = $1 ORDER BY random() LIMIT 1"
                    ),
                    &[&d.as_str()],
                )
                .await?
            }
            None => {
                self.query_opt(
                    const_format::concatcp!(
                        "SELECT id, title, statement_md, difficulty, starter_code, reference_solution, time_limit_secs, test_cases FROM ",
                        duel_pg::CHALLENGES,
                        " ORDER BY random() LIMIT 1"
                    ),
                    &[],
                )
                .await?
            }
        };
        Ok(row.map(|r| from_row(&r)))
    }

    async fn get(&self, id: ChallengeId) -> anyhow::Result<Option<Challenge>> {
        let row = self
            .query_opt(
                const_format::concatcp!(
                    "SELECT id, title, statement_md, difficulty, starter_code, reference_solution, time_limit_secs, test_cases FROM ",
                    duel_pg::CHALLENGES,
                    " WHERE id = $1"
                ),
                &[&id.inner()],
            )
            .await?;
        Ok(row.map(|r| from_row(&r)))
    }
}

fn from_row(row: &tokio_postgres::Row) -> Challenge {
    let difficulty_str: String = row.get(3);
    let test_cases: serde_json::Value = row.get(7);
    Challenge {
        id: ChallengeId::from(row.get::<_, uuid::Uuid>(0)),
        title: row.get(1),
        statement_md: row.get(2),
        difficulty: Difficulty::parse(&difficulty_str).unwrap_or(Difficulty::Medium),
        starter_code: row.get(4),
        reference_solution: row.get(5),
        time_limit_secs: row.get::<_, i32>(6) as u32,
        test_cases: serde_json::from_value::<Vec<TestCase>>(test_cases).expect("stored test cases deserialize"),
    }
}

pub mod schema {
    use duel_pg::Schema;

    pub struct Challenges;

    impl Schema for Challenges {
        fn name() -> &'static str {
            duel_pg::CHALLENGES
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                duel_pg::CHALLENGES,
                " (
                    id               UUID PRIMARY KEY,
                    title            VARCHAR(128) NOT NULL,
                    statement_md     TEXT NOT NULL,
                    difficulty       VARCHAR(16) NOT NULL,
                    starter_code     TEXT NOT NULL,
                    reference_solution TEXT NOT NULL DEFAULT '',
                    time_limit_secs  INTEGER NOT NULL,
                    test_cases       JSONB NOT NULL
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_challenges_difficulty ON ",
                duel_pg::CHALLENGES,
                " (difficulty);"
            )
        }
        fn truncates() -> &'static str {
            const_format::concatcp!("TRUNCATE TABLE ", duel_pg::CHALLENGES, " CASCADE;")
        }
    }
}
