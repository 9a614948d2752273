use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Single-row table: the next capsule id, which is also the
            -- number of capsules ever created.
            CREATE TABLE registry_counter (
                id               INTEGER PRIMARY KEY CHECK (id = 0),
                next_capsule_id  INTEGER NOT NULL
            );

            INSERT INTO registry_counter (id, next_capsule_id) VALUES (0, 0);

            CREATE TABLE capsules (
                id           INTEGER PRIMARY KEY,
                owner        TEXT NOT NULL,
                message      TEXT NOT NULL,
                unlock_time  INTEGER NOT NULL,
                is_revealed  INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE owner_capsules (
                owner       TEXT NOT NULL,
                position    INTEGER NOT NULL,
                capsule_id  INTEGER NOT NULL REFERENCES capsules(id),
                PRIMARY KEY (owner, position)
            );

            CREATE TABLE events (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                kind        TEXT NOT NULL,
                capsule_id  INTEGER NOT NULL,
                owner       TEXT NOT NULL,
                at          INTEGER NOT NULL,
                payload     TEXT NOT NULL
            );

            CREATE INDEX idx_events_owner ON events(owner, seq);
            CREATE INDEX idx_events_capsule ON events(capsule_id, seq);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
