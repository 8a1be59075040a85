use std::collections::HashMap;

use async_trait::async_trait;
use convoy_core::{StoreError, UserDirectory, UserId, UserSummary};
use convoy_shared::Masked;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl From<UserRow> for UserSummary {
    fn from(row: UserRow) -> Self {
        UserSummary {
            id: row.id,
            username: row.username,
            first_name: row.first_name.map(Masked),
            last_name: row.last_name.map(Masked),
        }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn summaries(&self, ids: &[UserId]) -> Result<HashMap<UserId, UserSummary>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, username, first_name, last_name FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id, UserSummary::from(row)))
            .collect())
    }
}
