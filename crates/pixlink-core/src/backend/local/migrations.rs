//! Versioned schema for the local backend.

use libsql::Connection;

use crate::error::Result;

/// Each step runs once, in order, inside its own transaction.
const MIGRATIONS: &[(i64, &[&str])] = &[(1, SOCIAL_SCHEMA), (2, LOCAL_ACCOUNTS)];

const SOCIAL_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        full_name TEXT,
        avatar_url TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS images (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        image_url TEXT NOT NULL,
        storage_path TEXT,
        likes_count INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_images_rank ON images(likes_count DESC, created_at DESC)",
    "CREATE TABLE IF NOT EXISTS tags (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE COLLATE NOCASE,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS image_tags (
        image_id TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
        tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (image_id, tag_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_image_tags_tag ON image_tags(tag_id)",
    "CREATE TABLE IF NOT EXISTS likes (
        id TEXT PRIMARY KEY,
        image_id TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (image_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        image_id TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_comments_image ON comments(image_id, created_at DESC)",
    "CREATE TABLE IF NOT EXISTS chats (
        id TEXT PRIMARY KEY,
        pair_key TEXT UNIQUE,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chat_participants (
        chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        joined_at INTEGER NOT NULL,
        PRIMARY KEY (chat_id, user_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_chat_participants_user ON chat_participants(user_id)",
    "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, created_at)",
    // Like counts are denormalized onto images
    "CREATE TRIGGER IF NOT EXISTS likes_ai AFTER INSERT ON likes BEGIN
        UPDATE images SET likes_count = likes_count + 1 WHERE id = NEW.image_id;
    END",
    "CREATE TRIGGER IF NOT EXISTS likes_ad AFTER DELETE ON likes BEGIN
        UPDATE images SET likes_count = MAX(likes_count - 1, 0) WHERE id = OLD.image_id;
    END",
];

const LOCAL_ACCOUNTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL,
        username TEXT,
        full_name TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS user_sessions (
        refresh_token TEXT PRIMARY KEY,
        access_token TEXT NOT NULL UNIQUE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        expires_at INTEGER NOT NULL
    )",
];

pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;

    let current = schema_version(conn).await?;
    for (version, statements) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
        apply(conn, *version, statements).await?;
    }
    Ok(())
}

async fn schema_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, version: i64, statements: &[&str]) -> Result<()> {
    let tx = conn.transaction().await?;
    for statement in statements {
        tx.execute(statement, ()).await?;
    }
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        libsql::params![version],
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Local schema now at version {version}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    fn latest() -> i64 {
        MIGRATIONS.last().map_or(0, |(version, _)| *version)
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = ?
                )",
                [name],
            )
            .await
            .unwrap();

        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = schema_version(&conn).await.unwrap();
        assert_eq!(version, latest());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let version = schema_version(&conn).await.unwrap();
        assert_eq!(version, latest());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_schema_tables_exist() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in [
            "profiles",
            "images",
            "tags",
            "image_tags",
            "likes",
            "comments",
            "chats",
            "chat_participants",
            "messages",
            "users",
            "user_sessions",
        ] {
            assert!(table_exists(&conn, table).await, "{table}");
        }
    }
}
