use sqlx::Row;

use crate::repository::{ProblemRecord, StorageError};

/// Column list shared by every `SELECT` on `problems`.
pub(crate) const PROBLEM_COLUMNS: &str = "
    problem_id, name, difficulty, category, link, solved_date,
    review1_date, review2_date, review3_date, review4_date, review5_date,
    review1_done, review2_done, review3_done, review4_done, review5_done
";

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps an insert/update failure, turning unique-key violations into `Conflict`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => conn(e),
    }
}

pub(crate) fn map_problem_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProblemRecord, StorageError> {
    Ok(ProblemRecord {
        problem_id: row.try_get("problem_id").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        difficulty: row.try_get("difficulty").map_err(ser)?,
        category: row.try_get("category").map_err(ser)?,
        link: row.try_get("link").map_err(ser)?,
        solved_date: row.try_get("solved_date").map_err(ser)?,
        review1_date: row.try_get("review1_date").map_err(ser)?,
        review2_date: row.try_get("review2_date").map_err(ser)?,
        review3_date: row.try_get("review3_date").map_err(ser)?,
        review4_date: row.try_get("review4_date").map_err(ser)?,
        review5_date: row.try_get("review5_date").map_err(ser)?,
        review1_done: row.try_get("review1_done").map_err(ser)?,
        review2_done: row.try_get("review2_done").map_err(ser)?,
        review3_done: row.try_get("review3_done").map_err(ser)?,
        review4_done: row.try_get("review4_done").map_err(ser)?,
        review5_done: row.try_get("review5_done").map_err(ser)?,
    })
}
