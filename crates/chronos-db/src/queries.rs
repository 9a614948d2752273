use crate::Database;
use crate::models::{CapsuleRow, EventRow, UserRow};
use anyhow::{Result, bail};
use chronos_types::events::CapsuleEvent;
use rusqlite::{Connection, Row};

// SQLite integers are signed. Timestamps and capsule ids are stored bit-cast
// to i64 and only ever compared for equality in SQL, so the full u64 range
// round-trips. Event `seq` is ordered in SQL and never exceeds i64::MAX.
fn to_sql(v: u64) -> i64 {
    v as i64
}

fn from_sql(v: i64) -> u64 {
    v as u64
}

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` if the username is already taken.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Capsules --

    pub fn get_capsule(&self, id: u64) -> Result<Option<CapsuleRow>> {
        self.with_conn(|conn| query_capsule(conn, id))
    }

    /// Capsule ids owned by `owner`, in the order they were created.
    pub fn get_owner_capsules(&self, owner: &str) -> Result<Vec<u64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT capsule_id FROM owner_capsules WHERE owner = ?1 ORDER BY position ASC",
            )?;
            let ids = stmt
                .query_map([owner], |row| row.get::<_, i64>(0).map(from_sql))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    pub fn capsule_count(&self) -> Result<u64> {
        self.with_conn(next_capsule_id)
    }

    // -- Events --

    /// Logged events with `seq > after`, oldest first.
    pub fn get_events_after(&self, after: u64, limit: u32) -> Result<Vec<EventRow>> {
        let Ok(after) = i64::try_from(after) else {
            return Ok(Vec::new());
        };

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, kind, capsule_id, owner, at, payload
                 FROM events
                 WHERE seq > ?1
                 ORDER BY seq ASC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![after, limit], map_event_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn last_event_seq(&self) -> Result<Option<u64>> {
        self.with_conn(|conn| {
            let seq: Option<i64> = conn.query_row("SELECT MAX(seq) FROM events", [], |r| r.get(0))?;
            Ok(seq.map(from_sql))
        })
    }
}

// -- Transaction-scoped helpers. Callers pass a `Transaction` (it derefs to
// `Connection`) so reads and writes land in the same unit of work.

pub fn query_capsule(conn: &Connection, id: u64) -> Result<Option<CapsuleRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner, message, unlock_time, is_revealed FROM capsules WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([to_sql(id)], |row| {
            Ok(CapsuleRow {
                id: from_sql(row.get(0)?),
                owner: row.get(1)?,
                message: row.get(2)?,
                unlock_time: from_sql(row.get(3)?),
                is_revealed: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub fn next_capsule_id(conn: &Connection) -> Result<u64> {
    let next: i64 = conn.query_row(
        "SELECT next_capsule_id FROM registry_counter WHERE id = 0",
        [],
        |r| r.get(0),
    )?;
    Ok(from_sql(next))
}

/// Store a capsule under `id`, append it to the owner's index and advance the
/// counter past it. `id` must be the value `next_capsule_id` just returned.
pub fn insert_capsule(
    conn: &Connection,
    id: u64,
    owner: &str,
    message: &str,
    unlock_time: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO capsules (id, owner, message, unlock_time) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![to_sql(id), owner, message, to_sql(unlock_time)],
    )?;

    conn.execute(
        "INSERT INTO owner_capsules (owner, position, capsule_id)
         SELECT ?1, COUNT(*), ?2 FROM owner_capsules WHERE owner = ?1",
        rusqlite::params![owner, to_sql(id)],
    )?;

    let advanced = conn.execute(
        "UPDATE registry_counter SET next_capsule_id = next_capsule_id + 1
         WHERE id = 0 AND next_capsule_id = ?1",
        [to_sql(id)],
    )?;
    if advanced != 1 {
        bail!("Capsule counter moved underneath insert of capsule {}", id);
    }

    Ok(())
}

/// Flip `is_revealed` on. Fails if the capsule is missing or already revealed.
pub fn mark_revealed(conn: &Connection, id: u64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE capsules SET is_revealed = 1 WHERE id = ?1 AND is_revealed = 0",
        [to_sql(id)],
    )?;
    if changed != 1 {
        bail!("Capsule {} was not in a revealable state", id);
    }
    Ok(())
}

/// Append to the event log. Returns the assigned sequence number.
pub fn append_event(conn: &Connection, at: u64, event: &CapsuleEvent) -> Result<u64> {
    let payload = serde_json::to_string(event)?;
    conn.execute(
        "INSERT INTO events (kind, capsule_id, owner, at, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            event.kind(),
            to_sql(event.capsule_id()),
            event.owner().as_str(),
            to_sql(at),
            payload
        ],
    )?;
    Ok(from_sql(conn.last_insert_rowid()))
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare("SELECT id, username, password FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        seq: from_sql(row.get(0)?),
        kind: row.get(1)?,
        capsule_id: from_sql(row.get(2)?),
        owner: row.get(3)?,
        at: from_sql(row.get(4)?),
        payload: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
