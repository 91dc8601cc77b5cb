/// Schema metadata for PostgreSQL tables.
///
/// Purely descriptive — no I/O. Actual reads/writes are handled by each
/// domain crate's own repository trait, parameterized SQL, and row decoding.
pub trait Schema {
    /// Returns the table name in the database.
    fn name() -> &'static str;
    /// Returns the `CREATE TABLE IF NOT EXISTS` DDL statement.
    fn creates() -> &'static str;
    /// Returns `CREATE INDEX IF NOT EXISTS` statements for all indices.
    fn indices() -> &'static str;
    /// Returns the `TRUNCATE TABLE` statement, used by integration tests.
    fn truncates() -> &'static str;
}
