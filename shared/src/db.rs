//! Database connection management and the restriction store.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::info;

use crate::models::MealLogRequest;
use crate::secrets::DatabaseCredentials;
use crate::{Config, Error, Result};

/// Create a database connection pool.
pub async fn create_pool(config: &Config, credentials: &DatabaseCredentials) -> Result<PgPool> {
    let mut options = PgConnectOptions::new()
        .host(credentials.host.as_deref().unwrap_or(&config.db_host))
        .database(credentials.dbname.as_deref().unwrap_or(&config.db_name))
        .username(&credentials.username)
        .password(&credentials.password);
    if let Some(port) = credentials.port {
        options = options.port(port);
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
        .map_err(Error::Database)?;

    Ok(pool)
}

/// Reads and writes the per-user restriction column.
#[derive(Debug, Clone)]
pub struct RestrictionStore {
    pool: PgPool,
}

impl RestrictionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stored restrictions for a phone number, registering the user on first
    /// contact.
    pub async fn load(&self, phone_number: &str) -> Result<Option<String>> {
        let stored: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO users (phone_number)
            VALUES ($1)
            ON CONFLICT (phone_number) DO UPDATE SET phone_number = EXCLUDED.phone_number
            RETURNING dietary_restrictions
            "#,
        )
        .bind(phone_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    /// Overwrite the stored restrictions. `None` clears them.
    pub async fn save(&self, phone_number: &str, restrictions: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (phone_number, dietary_restrictions)
            VALUES ($1, $2)
            ON CONFLICT (phone_number) DO UPDATE SET dietary_restrictions = EXCLUDED.dietary_restrictions
            "#,
        )
        .bind(phone_number)
        .bind(restrictions)
        .execute(&self.pool)
        .await?;

        info!(rows = result.rows_affected(), "Saved dietary restrictions");
        Ok(())
    }
}

/// Where a screened meal stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealStatus {
    /// Screened and safe, waiting for the user to name the meal type.
    AwaitingMealType,
    /// Sent to the meal logger.
    Logged,
}

impl MealStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MealStatus::AwaitingMealType => "pending",
            MealStatus::Logged => "logged",
        }
    }
}

/// The latest screened meal per user, kept until its type is known.
///
/// One row per phone number: a new photo replaces an unanswered one.
#[derive(Debug, Clone)]
pub struct MealStore {
    pool: PgPool,
}

impl MealStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Park a screened meal until the user names its type.
    pub async fn hold(&self, request: &MealLogRequest) -> Result<()> {
        self.put(request, MealStatus::AwaitingMealType).await
    }

    /// Record that a meal was sent to the logger.
    pub async fn mark_logged(&self, request: &MealLogRequest) -> Result<()> {
        self.put(request, MealStatus::Logged).await
    }

    /// The user's latest meal, if it is in `status`.
    pub async fn find(&self, phone_number: &str, status: MealStatus) -> Result<Option<MealLogRequest>> {
        let row: Option<Json<MealLogRequest>> = sqlx::query_scalar(
            r#"
            SELECT request
            FROM meal_confirmations
            WHERE phone_number = $1 AND status = $2
            "#,
        )
        .bind(phone_number)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(request)| request))
    }

    async fn put(&self, request: &MealLogRequest, status: MealStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO meal_confirmations (phone_number, request, status, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (phone_number) DO UPDATE
            SET request = EXCLUDED.request, status = EXCLUDED.status, updated_at = NOW()
            "#,
        )
        .bind(&request.phone_number)
        .bind(Json(request))
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        info!(
            request_id = %request.request_id,
            status = status.as_str(),
            "Stored meal confirmation state"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_status_column_values() {
        assert_eq!(MealStatus::AwaitingMealType.as_str(), "pending");
        assert_eq!(MealStatus::Logged.as_str(), "logged");
    }
}
