use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations that have not been applied yet.
///
/// Version 1 creates the flat `problems` table; `seq` preserves insertion order
/// and `problem_id` carries the user-supplied identifier.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: problems with their five review slots.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS problems (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    problem_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    difficulty TEXT,
                    category TEXT,
                    link TEXT,
                    solved_date TEXT NOT NULL CHECK (length(solved_date) = 10),
                    review1_date TEXT NOT NULL CHECK (length(review1_date) = 10),
                    review2_date TEXT NOT NULL CHECK (length(review2_date) = 10),
                    review3_date TEXT NOT NULL CHECK (length(review3_date) = 10),
                    review4_date TEXT NOT NULL CHECK (length(review4_date) = 10),
                    review5_date TEXT NOT NULL CHECK (length(review5_date) = 10),
                    review1_done INTEGER NOT NULL DEFAULT 0 CHECK (review1_done IN (0, 1)),
                    review2_done INTEGER NOT NULL DEFAULT 0 CHECK (review2_done IN (0, 1)),
                    review3_done INTEGER NOT NULL DEFAULT 0 CHECK (review3_done IN (0, 1)),
                    review4_done INTEGER NOT NULL DEFAULT 0 CHECK (review4_done IN (0, 1)),
                    review5_done INTEGER NOT NULL DEFAULT 0 CHECK (review5_done IN (0, 1))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_problems_solved_date
                    ON problems (solved_date);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied sqlite migration");
    }

    Ok(())
}
