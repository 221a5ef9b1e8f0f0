use chrono::NaiveDate;
use sqlx::{Sqlite, Transaction};
use tracker_core::model::{Problem, ProblemId};
use tracker_core::time::format_date;

use super::SqliteRepository;
use super::mapping::{PROBLEM_COLUMNS, conn, map_problem_row, write_err};
use crate::repository::{ProblemPatch, ProblemRecord, ProblemRepository, StorageError};

async fn fetch_record(
    tx: &mut Transaction<'_, Sqlite>,
    id: &ProblemId,
) -> Result<ProblemRecord, StorageError> {
    let sql = format!("SELECT {PROBLEM_COLUMNS} FROM problems WHERE problem_id = ?1");
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;
    map_problem_row(&row)
}

impl SqliteRepository {
    /// Problems with an open review dated on or before `today`, in insertion order.
    ///
    /// Dates are compared as `YYYY-MM-DD` text, which orders like the dates themselves.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query failure or malformed rows.
    pub async fn due_on_or_before(&self, today: NaiveDate) -> Result<Vec<Problem>, StorageError> {
        let sql = format!(
            r"
            SELECT {PROBLEM_COLUMNS}
            FROM problems
            WHERE (review1_done = 0 AND review1_date <= ?1)
               OR (review2_done = 0 AND review2_date <= ?1)
               OR (review3_done = 0 AND review3_date <= ?1)
               OR (review4_done = 0 AND review4_date <= ?1)
               OR (review5_done = 0 AND review5_date <= ?1)
            ORDER BY seq ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(format_date(today))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter()
            .map(|row| map_problem_row(row)?.into_problem())
            .collect()
    }
}

#[async_trait::async_trait]
impl ProblemRepository for SqliteRepository {
    async fn list_all(&self) -> Result<Vec<Problem>, StorageError> {
        let sql = format!("SELECT {PROBLEM_COLUMNS} FROM problems ORDER BY seq ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut problems = Vec::with_capacity(rows.len());
        for row in rows {
            problems.push(map_problem_row(&row)?.into_problem()?);
        }
        Ok(problems)
    }

    async fn get(&self, id: &ProblemId) -> Result<Problem, StorageError> {
        let sql = format!("SELECT {PROBLEM_COLUMNS} FROM problems WHERE problem_id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        map_problem_row(&row)?.into_problem()
    }

    async fn insert(&self, problem: &Problem) -> Result<Problem, StorageError> {
        let r = ProblemRecord::from_problem(problem);
        sqlx::query(
            r"
            INSERT INTO problems (
                problem_id, name, difficulty, category, link, solved_date,
                review1_date, review2_date, review3_date, review4_date, review5_date,
                review1_done, review2_done, review3_done, review4_done, review5_done
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ",
        )
        .bind(r.problem_id)
        .bind(r.name)
        .bind(r.difficulty)
        .bind(r.category)
        .bind(r.link)
        .bind(r.solved_date)
        .bind(r.review1_date)
        .bind(r.review2_date)
        .bind(r.review3_date)
        .bind(r.review4_date)
        .bind(r.review5_date)
        .bind(r.review1_done)
        .bind(r.review2_done)
        .bind(r.review3_done)
        .bind(r.review4_done)
        .bind(r.review5_done)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        // Read back what the table actually holds.
        self.get(problem.id()).await
    }

    async fn update_fields(
        &self,
        id: &ProblemId,
        patch: &ProblemPatch,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let mut r = fetch_record(&mut tx, id).await?;
        patch.apply_to(&mut r);

        sqlx::query(
            r"
            UPDATE problems SET
                name = ?2,
                difficulty = ?3,
                category = ?4,
                link = ?5,
                review1_date = ?6,
                review2_date = ?7,
                review3_date = ?8,
                review4_date = ?9,
                review5_date = ?10,
                review1_done = ?11,
                review2_done = ?12,
                review3_done = ?13,
                review4_done = ?14,
                review5_done = ?15
            WHERE problem_id = ?1
            ",
        )
        .bind(r.problem_id)
        .bind(r.name)
        .bind(r.difficulty)
        .bind(r.category)
        .bind(r.link)
        .bind(r.review1_date)
        .bind(r.review2_date)
        .bind(r.review3_date)
        .bind(r.review4_date)
        .bind(r.review5_date)
        .bind(r.review1_done)
        .bind(r.review2_done)
        .bind(r.review3_done)
        .bind(r.review4_done)
        .bind(r.review5_done)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn delete(&self, id: &ProblemId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM problems WHERE problem_id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
