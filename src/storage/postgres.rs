use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use uuid::Uuid;

use super::{App, AppStore, StorageError, StorageResult, User, UserStore, normalize_email};
use crate::crypto::{HashedPassword, generate_secret};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    salt: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: HashedPassword::from_phc(row.password_hash),
            salt: row.salt,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AppRow {
    id: Uuid,
    name: String,
    secret: String,
}

impl From<AppRow> for App {
    fn from(row: AppRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            secret: row.secret,
        }
    }
}

fn backend(op: &'static str) -> impl FnOnce(sqlx::Error) -> StorageError {
    move |e| StorageError::Backend {
        op,
        source: Box::new(e),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Users and apps in PostgreSQL, sharing one connection pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool with at most `max_connections` connections.
    pub async fn connect(
        options: PgConnectOptions,
        max_connections: u32,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Round-trips a trivial query to check the database is reachable.
    pub async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(backend("storage.ping"))
    }

    /// Closes every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn save(&self, email: &str, password_hash: &HashedPassword) -> StorageResult<Uuid> {
        const OP: &str = "storage.user.save";

        let result = sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO users_schema."user" (id, email, password_hash, salt)
               VALUES ($1, $2, $3, $4)
               RETURNING id"#,
        )
        .bind(Uuid::new_v4())
        .bind(normalize_email(email))
        .bind(password_hash.as_str())
        .bind(generate_secret())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(e) if is_unique_violation(&e) => Err(StorageError::UserExists { op: OP }),
            Err(e) => Err(backend(OP)(e)),
        }
    }

    async fn get(&self, email: &str) -> StorageResult<User> {
        const OP: &str = "storage.user.get";

        sqlx::query_as::<_, UserRow>(
            r#"SELECT id, email, password_hash, salt
               FROM users_schema."user"
               WHERE email = $1"#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend(OP))?
        .map(User::from)
        .ok_or(StorageError::UserNotFound { op: OP })
    }

    async fn delete(&self, email: &str) -> StorageResult<Uuid> {
        const OP: &str = "storage.user.delete";

        sqlx::query_scalar::<_, Uuid>(
            r#"DELETE FROM users_schema."user" WHERE email = $1 RETURNING id"#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend(OP))?
        .ok_or(StorageError::UserNotFound { op: OP })
    }
}

#[async_trait]
impl AppStore for PgStore {
    async fn save(&self, name: &str, secret: &str) -> StorageResult<Uuid> {
        const OP: &str = "storage.app.save";

        let result = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO apps_schema.app (id, name, secret) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(secret)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(e) if is_unique_violation(&e) => Err(StorageError::AppExists { op: OP }),
            Err(e) => Err(backend(OP)(e)),
        }
    }

    async fn get(&self, id: Uuid) -> StorageResult<App> {
        const OP: &str = "storage.app.get";

        sqlx::query_as::<_, AppRow>("SELECT id, name, secret FROM apps_schema.app WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend(OP))?
            .map(App::from)
            .ok_or(StorageError::AppNotFound { op: OP })
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        const OP: &str = "storage.app.delete";

        let result = sqlx::query("DELETE FROM apps_schema.app WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend(OP))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::AppNotFound { op: OP });
        }

        Ok(())
    }
}
