//! SQLite implementation of the participant store.

use super::pool::SqliteConnectionManager;
use super::{Participant, ParticipantStore, Response, StoreError, StoreResult};
use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use rusqlite::{params, OptionalExtension, Row};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS participants (
        id INTEGER PRIMARY KEY,
        call_id TEXT NOT NULL UNIQUE,
        number TEXT,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS responses (
        id INTEGER PRIMARY KEY,
        participant_id INTEGER NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
        leg_id TEXT NOT NULL,
        recording_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS responses_participant_id ON responses(participant_id);
    CREATE UNIQUE INDEX IF NOT EXISTS responses_participant_recording
        ON responses(participant_id, recording_id);
";

const DEFAULT_POOL_SIZE: u32 = 8;
const MEMORY_PATH: &str = ":memory:";

/// Participant store backed by a pooled SQLite database.
///
/// Each operation checks out its own connection, so requests for different calls
/// never wait on each other in-process; SQLite serializes the writes themselves.
#[derive(Debug, Clone)]
pub struct SqliteParticipantStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteParticipantStore {
    /// Open (or create) the database file at `path`. `:memory:` gives a database
    /// that lives as long as the store.
    pub fn open(path: &str) -> StoreResult<Self> {
        let builder = Pool::builder();

        let (manager, builder) = if path == MEMORY_PATH {
            // A shared-cache memory database is freed with its last connection and
            // locks out concurrent connections, so the pool keeps exactly one forever
            let builder = builder.max_size(1).max_lifetime(None).idle_timeout(None);
            (SqliteConnectionManager::memory(), builder)
        } else {
            (SqliteConnectionManager::file(path), builder.max_size(DEFAULT_POOL_SIZE))
        };

        let pool = builder.build(manager)?;
        Ok(Self { pool })
    }

    /// Fresh in-memory database with the schema already in place.
    #[cfg(test)]
    pub fn in_memory() -> StoreResult<Self> {
        let store = Self::open(MEMORY_PATH)?;
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn map_participant(row: &Row<'_>) -> rusqlite::Result<Participant> {
        Ok(Participant {
            id: row.get("id")?,
            call_id: row.get("call_id")?,
            number: row.get("number")?,
            created_at: row.get("created_at")?,
        })
    }

    fn count_with(conn: &rusqlite::Connection, participant_id: i64) -> StoreResult<u64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM responses WHERE participant_id = ?1",
            params![participant_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// A recording can answer only one question of a participant.
fn map_append_error(err: rusqlite::Error, recording_id: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::DuplicateResponse(recording_id.to_string())
    } else {
        err.into()
    }
}

impl ParticipantStore for SqliteParticipantStore {
    fn init_schema(&self) -> StoreResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn ping(&self) -> StoreResult<()> {
        self.conn()?.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn find_by_call_id(&self, call_id: &str) -> StoreResult<Option<Participant>> {
        let participant = self
            .conn()?
            .query_row(
                "SELECT id, call_id, number, created_at FROM participants WHERE call_id = ?1",
                params![call_id],
                Self::map_participant,
            )
            .optional()?;
        Ok(participant)
    }

    fn create(&self, call_id: &str, number: Option<&str>) -> StoreResult<Participant> {
        let conn = self.conn()?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO participants (call_id, number, created_at) VALUES (?1, ?2, ?3)",
            params![call_id, number, created_at],
        )
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::DuplicateKey(call_id.to_string())
            } else {
                err.into()
            }
        })?;

        Ok(Participant {
            id: conn.last_insert_rowid(),
            call_id: call_id.to_string(),
            number: number.map(str::to_string),
            created_at,
        })
    }

    fn count_responses(&self, participant_id: i64) -> StoreResult<u64> {
        let conn = self.conn()?;
        Self::count_with(&conn, participant_id)
    }

    fn append_response(&self, participant_id: i64, leg_id: &str, recording_id: &str) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO responses (participant_id, leg_id, recording_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![participant_id, leg_id, recording_id, Utc::now()],
        )
        .map_err(|err| map_append_error(err, recording_id))?;
        Ok(())
    }

    fn append_response_at(
        &self,
        participant_id: i64,
        expected_count: u64,
        leg_id: &str,
        recording_id: &str,
    ) -> StoreResult<()> {
        let conn = self.conn()?;

        // Count check and insert are one statement, so they run under a single write lock
        let inserted = conn.execute(
            "INSERT INTO responses (participant_id, leg_id, recording_id, created_at)
             SELECT ?1, ?2, ?3, ?4
             WHERE (SELECT COUNT(*) FROM responses WHERE participant_id = ?1) = ?5",
            params![participant_id, leg_id, recording_id, Utc::now(), expected_count as i64],
        )
        .map_err(|err| map_append_error(err, recording_id))?;

        if inserted == 0 {
            let actual = Self::count_with(&conn, participant_id)?;
            return Err(StoreError::Conflict {
                expected: expected_count,
                actual,
            });
        }

        Ok(())
    }

    fn list_participants_with_responses(&self) -> StoreResult<Vec<(Participant, Vec<Response>)>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, call_id, number, created_at FROM participants ORDER BY id ASC",
        )?;
        let participants = stmt
            .query_map([], Self::map_participant)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT id, participant_id, leg_id, recording_id, created_at
             FROM responses
             ORDER BY participant_id ASC, id ASC",
        )?;
        let mut responses = stmt
            .query_map([], |row| {
                Ok(Response {
                    id: row.get("id")?,
                    participant_id: row.get("participant_id")?,
                    leg_id: row.get("leg_id")?,
                    recording_id: row.get("recording_id")?,
                    created_at: row.get("created_at")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .peekable();

        // Both lists are sorted by participant id, so one merge pass groups them
        let mut grouped = Vec::with_capacity(participants.len());
        for participant in participants {
            let mut own = Vec::new();
            while let Some(response) = responses.next_if(|r| r.participant_id <= participant.id) {
                if response.participant_id == participant.id {
                    own.push(response);
                }
            }
            grouped.push((participant, own));
        }

        Ok(grouped)
    }
}
