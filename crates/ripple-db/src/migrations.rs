use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (gratitude messages)");
        conn.execute_batch(
            "
            CREATE TABLE gratitude_messages (
                id                      TEXT PRIMARY KEY,
                message                 TEXT NOT NULL,
                category                TEXT NOT NULL,
                category_label          TEXT NOT NULL,
                country                 TEXT,
                created_at              TEXT NOT NULL,
                ripple_parent_id        TEXT,
                ripple_depth            INTEGER NOT NULL DEFAULT 0 CHECK (ripple_depth >= 0),
                ripple_count            INTEGER NOT NULL DEFAULT 0 CHECK (ripple_count >= 0),
                inspired_by_message_id  TEXT
            );

            CREATE INDEX idx_messages_parent
                ON gratitude_messages(ripple_parent_id);

            CREATE INDEX idx_messages_ripple_count
                ON gratitude_messages(ripple_count DESC, created_at ASC);

            CREATE INDEX idx_messages_created
                ON gratitude_messages(created_at);

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (app stats snapshot)");
        conn.execute_batch(
            "
            CREATE TABLE app_stats (
                id              INTEGER PRIMARY KEY CHECK (id = 1),
                total_messages  INTEGER NOT NULL DEFAULT 0,
                active_users    INTEGER NOT NULL DEFAULT 0,
                updated_at      TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (2);
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
