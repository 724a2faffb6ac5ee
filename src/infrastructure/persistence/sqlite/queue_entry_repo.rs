//! SQLite Queue Entry Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{QueueEntryRepositoryPort, RepositoryError};
use crate::domain::queue::{DestinationId, EntryId, MediaLocator, QueueEntry};

/// SQLite Queue Entry Repository
pub struct SqliteQueueEntryRepository {
    pool: DbPool,
}

impl SqliteQueueEntryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct QueueEntryRow {
    id: String,
    destination_id: String,
    title: String,
    duration_ms: Option<i64>,
    submitter_id: String,
    media_locator: String,
    enqueued_at: String,
}

impl TryFrom<QueueEntryRow> for QueueEntry {
    type Error = RepositoryError;

    fn try_from(row: QueueEntryRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let destination_id = DestinationId::new(row.destination_id)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let enqueued_at = DateTime::parse_from_rfc3339(&row.enqueued_at)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?
            .with_timezone(&Utc);

        Ok(QueueEntry::restore(
            EntryId::from_uuid(id),
            destination_id,
            row.title,
            row.submitter_id,
            MediaLocator::new(row.media_locator),
            row.duration_ms.and_then(|ms| u64::try_from(ms).ok()),
            enqueued_at,
        ))
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, destination_id, title, duration_ms, submitter_id, media_locator, enqueued_at FROM queue_entries";

fn database_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::DatabaseError(e.to_string())
}

#[async_trait]
impl QueueEntryRepositoryPort for SqliteQueueEntryRepository {
    async fn save(&self, entry: &QueueEntry) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO queue_entries
                (id, destination_id, title, duration_ms, submitter_id, media_locator, enqueued_at, position)
            SELECT ?, ?, ?, ?, ?, ?, ?, COALESCE(MAX(position), -1) + 1
            FROM queue_entries WHERE destination_id = ?
            "#,
        )
        .bind(entry.id().to_string())
        .bind(entry.destination_id().as_str())
        .bind(entry.title())
        .bind(entry.duration_ms().and_then(|ms| i64::try_from(ms).ok()))
        .bind(entry.submitter_id())
        .bind(entry.media().as_str())
        .bind(entry.enqueued_at().to_rfc3339())
        .bind(entry.destination_id().as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(RepositoryError::Duplicate(entry.id().to_string()))
            }
            Err(e) => Err(database_error(e)),
        }
    }

    async fn find_by_id(&self, id: EntryId) -> Result<Option<QueueEntry>, RepositoryError> {
        let row: Option<QueueEntryRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?;

        row.map(QueueEntry::try_from).transpose()
    }

    async fn find_by_destination(
        &self,
        destination_id: &DestinationId,
    ) -> Result<Vec<QueueEntry>, RepositoryError> {
        let rows: Vec<QueueEntryRow> = sqlx::query_as(&format!(
            "{} WHERE destination_id = ? ORDER BY position ASC",
            SELECT_COLUMNS
        ))
        .bind(destination_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    async fn find_all_pending(&self) -> Result<Vec<QueueEntry>, RepositoryError> {
        let rows: Vec<QueueEntryRow> = sqlx::query_as(&format!(
            "{} ORDER BY destination_id ASC, position ASC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    async fn delete(&self, id: EntryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM queue_entries WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn save_order(
        &self,
        destination_id: &DestinationId,
        order: &[EntryId],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        for (position, id) in order.iter().enumerate() {
            sqlx::query(
                "UPDATE queue_entries SET position = ? WHERE id = ? AND destination_id = ?",
            )
            .bind(position as i64)
            .bind(id.to_string())
            .bind(destination_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;
        }

        tx.commit().await.map_err(database_error)?;
        Ok(())
    }
}
