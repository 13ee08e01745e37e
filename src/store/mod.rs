//! # Participant Store
//!
//! Persistent record of every survey call and the answers recorded for it. This is the
//! only shared mutable state of the service: request handlers keep nothing in memory
//! between webhook invocations, so everything the call-step resolver needs to pick the
//! next question comes from here.
//!
//! ## Layout:
//! - **participants**: one row per call (`call_id` is unique)
//! - **responses**: one row per answered question, in answer order
//!
//! The n-th response of a participant (ordered by insertion) is the answer to
//! question n of the question bank.
//!
//! ## Rust Concepts:
//! - **trait ParticipantStore**: The resolver depends on the trait, not on SQLite
//! - **Send + Sync**: Required so one store can be shared by all actix worker threads

pub mod pool;
pub mod sqlite;

pub use sqlite::SqliteParticipantStore;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// One caller's survey session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: i64,
    pub call_id: String,
    pub number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Recording metadata stored for one answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub id: i64,
    pub participant_id: i64,
    pub leg_id: String,
    pub recording_id: String,
    pub created_at: DateTime<Utc>,
}

/// Errors raised by a participant store.
#[derive(Debug)]
pub enum StoreError {
    /// A participant with this call identifier already exists
    DuplicateKey(String),

    /// A conditional append found a different number of responses than expected
    Conflict { expected: u64, actual: u64 },

    /// This recording is already stored for the participant
    DuplicateResponse(String),

    /// No connection could be obtained
    Unavailable(String),

    /// A statement failed
    Query(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateKey(call_id) => {
                write!(f, "Participant for call {} already exists", call_id)
            }
            StoreError::Conflict { expected, actual } => write!(
                f,
                "Expected {} stored responses but found {}",
                expected, actual
            ),
            StoreError::DuplicateResponse(recording_id) => {
                write!(f, "Recording {} is already stored", recording_id)
            }
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            StoreError::Query(msg) => write!(f, "Store query failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage contract used by the call-step resolver and the survey report.
///
/// Calls are synchronous; handlers run them on actix's blocking pool.
pub trait ParticipantStore: Send + Sync {
    /// Create both tables if they do not exist yet.
    fn init_schema(&self) -> StoreResult<()>;

    /// Cheap reachability probe.
    fn ping(&self) -> StoreResult<()>;

    fn find_by_call_id(&self, call_id: &str) -> StoreResult<Option<Participant>>;

    /// Fails with `DuplicateKey` if a row for `call_id` already exists.
    fn create(&self, call_id: &str, number: Option<&str>) -> StoreResult<Participant>;

    fn count_responses(&self, participant_id: i64) -> StoreResult<u64>;

    /// Append a response unconditionally. The resolver always goes through
    /// `append_response_at`; this is the plain append for seeding and repair.
    #[allow(dead_code)]
    fn append_response(&self, participant_id: i64, leg_id: &str, recording_id: &str) -> StoreResult<()>;

    /// Append a response only if the participant currently has exactly
    /// `expected_count` responses, otherwise fail with `Conflict`.
    ///
    /// Both appends fail with `DuplicateResponse` when the recording is already
    /// stored for this participant.
    fn append_response_at(
        &self,
        participant_id: i64,
        expected_count: u64,
        leg_id: &str,
        recording_id: &str,
    ) -> StoreResult<()>;

    /// Every participant with its responses in answer order, oldest participant first.
    fn list_participants_with_responses(&self) -> StoreResult<Vec<(Participant, Vec<Response>)>>;
}
