use super::SqliteStore;
use crate::catalog::{NewRepository, RepositoryCatalog, RepositoryRecord};
use crate::error::MemoryError;
use crate::vector_store::BoxFuture;

type RepositoryTuple = (i64, i64, String, String, Option<String>, i64, i64);

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, name, full_name, local_path, selected, indexed FROM repositories";

fn record_from_tuple(t: RepositoryTuple) -> RepositoryRecord {
    RepositoryRecord {
        id: t.0,
        user_id: t.1,
        name: t.2,
        full_name: t.3,
        local_path: t.4,
        selected: t.5 != 0,
        indexed: t.6 != 0,
    }
}

impl SqliteStore {
    /// Insert a repository record and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails, including a duplicate `full_name` for the same user.
    pub async fn add_repository(&self, repo: &NewRepository) -> Result<RepositoryRecord, MemoryError> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO repositories (user_id, name, full_name, local_path) \
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(repo.user_id)
        .bind(&repo.name)
        .bind(&repo.full_name)
        .bind(&repo.local_path)
        .fetch_one(self.pool())
        .await?;

        tracing::debug!(repo_id = row.0, full_name = %repo.full_name, "repository added");

        Ok(RepositoryRecord {
            id: row.0,
            user_id: repo.user_id,
            name: repo.name.clone(),
            full_name: repo.full_name.clone(),
            local_path: repo.local_path.clone(),
            selected: false,
            indexed: false,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn repository(&self, id: i64) -> Result<Option<RepositoryRecord>, MemoryError> {
        let row: Option<RepositoryTuple> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(record_from_tuple))
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn repositories(
        &self,
        user_id: Option<i64>,
    ) -> Result<Vec<RepositoryRecord>, MemoryError> {
        let rows: Vec<RepositoryTuple> = match user_id {
            Some(uid) => {
                sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE user_id = ? ORDER BY id ASC"))
                    .bind(uid)
                    .fetch_all(self.pool())
                    .await?
            }
            None => {
                sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
                    .fetch_all(self.pool())
                    .await?
            }
        };
        Ok(rows.into_iter().map(record_from_tuple).collect())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn selected_repository_ids(&self, user_id: i64) -> Result<Vec<i64>, MemoryError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM repositories WHERE user_id = ? AND selected = 1 ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    async fn update_flag(&self, id: i64, column: Flag, value: bool) -> Result<(), MemoryError> {
        let sql = match column {
            Flag::Selected => {
                "UPDATE repositories SET selected = ?, updated_at = datetime('now') WHERE id = ?"
            }
            Flag::Indexed => {
                "UPDATE repositories SET indexed = ?, updated_at = datetime('now') WHERE id = ?"
            }
        };
        let result = sqlx::query(sql)
            .bind(i64::from(value))
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(MemoryError::RepositoryNotFound(id));
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Flag {
    Selected,
    Indexed,
}

impl RepositoryCatalog for SqliteStore {
    fn add(&self, repo: NewRepository) -> BoxFuture<'_, Result<RepositoryRecord, MemoryError>> {
        Box::pin(async move { self.add_repository(&repo).await })
    }

    fn get(&self, id: i64) -> BoxFuture<'_, Result<Option<RepositoryRecord>, MemoryError>> {
        Box::pin(self.repository(id))
    }

    fn list(
        &self,
        user_id: Option<i64>,
    ) -> BoxFuture<'_, Result<Vec<RepositoryRecord>, MemoryError>> {
        Box::pin(self.repositories(user_id))
    }

    fn selected_ids(&self, user_id: i64) -> BoxFuture<'_, Result<Vec<i64>, MemoryError>> {
        Box::pin(self.selected_repository_ids(user_id))
    }

    fn set_selected(&self, id: i64, selected: bool) -> BoxFuture<'_, Result<(), MemoryError>> {
        Box::pin(self.update_flag(id, Flag::Selected, selected))
    }

    fn set_indexed(&self, id: i64, indexed: bool) -> BoxFuture<'_, Result<(), MemoryError>> {
        Box::pin(self.update_flag(id, Flag::Indexed, indexed))
    }
}
