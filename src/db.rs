use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

// users
//   unique: id
//   unique: username
//
// messages
//   unique: id
//   sender, receiver -> users.id

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        username TEXT NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY NOT NULL,
        sender TEXT NOT NULL REFERENCES users(id),
        receiver TEXT NOT NULL REFERENCES users(id),
        text TEXT NOT NULL,
        sent_at INTEGER NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS messages_dialog ON messages (sender, receiver, sent_at)"#,
];

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(database_url)
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

/// Single-connection in-memory database, every connection of a `:memory:` pool
/// would otherwise see its own empty database.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}
