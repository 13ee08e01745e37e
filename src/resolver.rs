//! # Call-Step Resolver
//!
//! The survey state machine. The voice platform calls the webhook once per step of a
//! phone call, and every invocation is handled from scratch: the resolver looks the
//! call up in the participant store, records the answer that just arrived, and works
//! out which question comes next from the number of stored answers.
//!
//! ## Progression:
//! - **First contact** (no participant for the call yet): create the participant and
//!   start at question 0 with a welcome message. A body on this request is ignored.
//! - **Continuing call**: with `answered` responses stored, the incoming recording is
//!   the answer to question `answered`; it is stored and question `answered + 1` is next.
//! - **Done**: once the next index reaches the question count the call is closed.
//!   Any index past the end is treated the same way.
//!
//! ## Ordering:
//! Answers are appended with a compare-and-swap on the stored response count, so two
//! callbacks for the same call racing each other cannot both claim one question. A
//! recording id can be stored only once per participant, so a callback the platform
//! retries after the first delivery succeeded is rejected with a conflict instead of
//! shifting every later answer onto the wrong question. A retry arriving after the
//! last answer finds the survey complete and just gets the closing flow again.

use crate::error::{AppError, AppResult};
use crate::questions::QuestionBank;
use crate::store::ParticipantStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Metadata of the recording the caller just finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub leg_id: String,
    pub recording_id: String,
}

/// Body posted by the voice platform when a recording step finishes.
#[derive(Debug, Deserialize)]
struct RecordingBody {
    #[serde(rename = "legId")]
    leg_id: Option<String>,
    id: Option<String>,
}

/// The previous answer as found in the request body.
///
/// Parsing never fails outright: whether a missing or malformed body is an error
/// depends on where the call is in the survey, which only the resolver knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousAnswer {
    Absent,
    Recording(Recording),
    Malformed(String),
}

impl PreviousAnswer {
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return PreviousAnswer::Absent;
        }

        let parsed = match serde_json::from_slice::<Option<RecordingBody>>(body) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return PreviousAnswer::Absent,
            Err(e) => return PreviousAnswer::Malformed(format!("invalid JSON body: {}", e)),
        };

        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        match (non_blank(parsed.leg_id), non_blank(parsed.id)) {
            (Some(leg_id), Some(recording_id)) => PreviousAnswer::Recording(Recording {
                leg_id,
                recording_id,
            }),
            (None, _) => PreviousAnswer::Malformed("missing legId".to_string()),
            (_, None) => PreviousAnswer::Malformed("missing id".to_string()),
        }
    }
}

/// One webhook invocation.
#[derive(Debug, Clone)]
pub struct CallStepRequest {
    pub call_id: String,
    pub caller_number: Option<String>,
    pub previous: PreviousAnswer,
}

/// What the call should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDecision {
    /// Greet the caller, then ask question 0.
    Welcome { total_questions: usize, question: String },
    /// Ask question `index`.
    Ask { index: usize, question: String },
    /// All questions answered; say goodbye and stop recording.
    Closing,
}

/// Outcome of resolving one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStep {
    pub participant_id: i64,
    pub question_index: usize,
    pub new_participant: bool,
    pub stored_response: bool,
    pub decision: StepDecision,
}

/// Pick the decision for `question_index`. Indexes at or past the end of the
/// bank close the call.
pub fn decide(questions: &QuestionBank, question_index: usize) -> StepDecision {
    let Some(question) = questions.get(question_index) else {
        return StepDecision::Closing;
    };

    if question_index == 0 {
        StepDecision::Welcome {
            total_questions: questions.len(),
            question: question.to_string(),
        }
    } else {
        StepDecision::Ask {
            index: question_index,
            question: question.to_string(),
        }
    }
}

/// Resolves webhook invocations against the participant store.
#[derive(Clone)]
pub struct CallStepResolver {
    store: Arc<dyn ParticipantStore>,
    questions: QuestionBank,
}

impl CallStepResolver {
    pub fn new(store: Arc<dyn ParticipantStore>, questions: QuestionBank) -> Self {
        Self { store, questions }
    }

    pub fn questions(&self) -> &QuestionBank {
        &self.questions
    }

    pub fn store(&self) -> &Arc<dyn ParticipantStore> {
        &self.store
    }

    /// Record the incoming answer (if any) and decide the next step.
    ///
    /// Blocking: runs store queries, so call it from `web::block`.
    pub fn resolve(&self, request: &CallStepRequest) -> AppResult<CallStep> {
        let call_id = request.call_id.trim();
        if call_id.is_empty() {
            return Err(AppError::BadRequest("callID must not be empty".to_string()));
        }

        let total = self.questions.len();

        let step = match self.store.find_by_call_id(call_id)? {
            None => {
                let participant = self.store.create(call_id, request.caller_number.as_deref())?;
                info!(
                    call_id = %call_id,
                    participant_id = participant.id,
                    "Created participant"
                );

                if request.previous != PreviousAnswer::Absent {
                    debug!(call_id = %call_id, "Ignoring request body on first contact");
                }

                CallStep {
                    participant_id: participant.id,
                    question_index: 0,
                    new_participant: true,
                    stored_response: false,
                    decision: decide(&self.questions, 0),
                }
            }
            Some(participant) => {
                let answered = self.store.count_responses(participant.id)? as usize;
                let question_index = answered + 1;

                let stored_response = if answered < total {
                    let recording = match &request.previous {
                        PreviousAnswer::Recording(recording) => recording,
                        PreviousAnswer::Absent => {
                            return Err(AppError::BadRequest(format!(
                                "Missing previous recording (legId/id) for call {}",
                                call_id
                            )))
                        }
                        PreviousAnswer::Malformed(reason) => {
                            return Err(AppError::BadRequest(format!(
                                "Malformed previous recording for call {}: {}",
                                call_id, reason
                            )))
                        }
                    };

                    self.store.append_response_at(
                        participant.id,
                        answered as u64,
                        &recording.leg_id,
                        &recording.recording_id,
                    )?;
                    info!(
                        call_id = %call_id,
                        participant_id = participant.id,
                        question = answered,
                        "Added response"
                    );
                    true
                } else {
                    // Every question already has an answer; storing more would break the
                    // one-answer-per-question pairing, so the call is just closed again.
                    warn!(
                        call_id = %call_id,
                        participant_id = participant.id,
                        answered,
                        "Callback for completed survey, nothing stored"
                    );
                    false
                };

                CallStep {
                    participant_id: participant.id,
                    question_index,
                    new_participant: false,
                    stored_response,
                    decision: decide(&self.questions, question_index),
                }
            }
        };

        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteParticipantStore;

    fn resolver() -> CallStepResolver {
        let store = SqliteParticipantStore::in_memory().unwrap();
        let questions = QuestionBank::new(vec![
            "Question zero?".to_string(),
            "Question one?".to_string(),
            "Question two?".to_string(),
        ])
        .unwrap();
        CallStepResolver::new(Arc::new(store), questions)
    }

    fn request(call_id: &str, body: &str) -> CallStepRequest {
        CallStepRequest {
            call_id: call_id.to_string(),
            caller_number: Some("555".to_string()),
            previous: PreviousAnswer::from_body(body.as_bytes()),
        }
    }

    fn responses_for(resolver: &CallStepResolver, call_id: &str) -> u64 {
        let participant = resolver.store().find_by_call_id(call_id).unwrap().unwrap();
        resolver.store().count_responses(participant.id).unwrap()
    }

    #[test]
    fn test_parse_previous_answer() {
        assert_eq!(PreviousAnswer::from_body(b""), PreviousAnswer::Absent);
        assert_eq!(PreviousAnswer::from_body(b"  \n"), PreviousAnswer::Absent);
        assert_eq!(PreviousAnswer::from_body(b"null"), PreviousAnswer::Absent);
        assert_eq!(
            PreviousAnswer::from_body(br#"{"legId": "L1", "id": "R1", "status": "done"}"#),
            PreviousAnswer::Recording(Recording {
                leg_id: "L1".to_string(),
                recording_id: "R1".to_string(),
            })
        );
        assert!(matches!(
            PreviousAnswer::from_body(br#"{"legId": "L1"}"#),
            PreviousAnswer::Malformed(_)
        ));
        assert!(matches!(
            PreviousAnswer::from_body(br#"{"legId": "", "id": "R1"}"#),
            PreviousAnswer::Malformed(_)
        ));
        assert!(matches!(
            PreviousAnswer::from_body(b"{oops"),
            PreviousAnswer::Malformed(_)
        ));
    }

    #[test]
    fn test_decide_clamps_past_end() {
        let questions = QuestionBank::new(vec!["a".to_string(), "b".to_string()]).unwrap();

        assert!(matches!(decide(&questions, 0), StepDecision::Welcome { total_questions: 2, .. }));
        assert!(matches!(decide(&questions, 1), StepDecision::Ask { index: 1, .. }));
        assert_eq!(decide(&questions, 2), StepDecision::Closing);
        assert_eq!(decide(&questions, 7), StepDecision::Closing);
    }

    #[test]
    fn test_full_survey_scenario() {
        let resolver = resolver();

        let first = resolver.resolve(&request("A", "")).unwrap();
        assert!(first.new_participant);
        assert_eq!(first.question_index, 0);
        assert_eq!(
            first.decision,
            StepDecision::Welcome {
                total_questions: 3,
                question: "Question zero?".to_string()
            }
        );

        let second = resolver.resolve(&request("A", r#"{"legId":"L1","id":"R1"}"#)).unwrap();
        assert!(second.stored_response);
        assert_eq!(
            second.decision,
            StepDecision::Ask { index: 1, question: "Question one?".to_string() }
        );
        assert_eq!(responses_for(&resolver, "A"), 1);

        let third = resolver.resolve(&request("A", r#"{"legId":"L2","id":"R2"}"#)).unwrap();
        assert_eq!(
            third.decision,
            StepDecision::Ask { index: 2, question: "Question two?".to_string() }
        );

        let fourth = resolver.resolve(&request("A", r#"{"legId":"L3","id":"R3"}"#)).unwrap();
        assert_eq!(fourth.question_index, 3);
        assert_eq!(fourth.decision, StepDecision::Closing);
        assert_eq!(responses_for(&resolver, "A"), 3);

        let (_, stored) = resolver
            .store()
            .list_participants_with_responses()
            .unwrap()
            .remove(0);
        let pairs: Vec<(&str, &str)> = stored
            .iter()
            .map(|r| (r.leg_id.as_str(), r.recording_id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("L1", "R1"), ("L2", "R2"), ("L3", "R3")]);
    }

    #[test]
    fn test_each_call_adds_exactly_one_response() {
        let resolver = resolver();
        resolver.resolve(&request("B", "")).unwrap();

        for k in 1..=3u64 {
            assert_eq!(responses_for(&resolver, "B"), k - 1);
            let body = format!(r#"{{"legId":"L{k}","id":"R{k}"}}"#);
            resolver.resolve(&request("B", &body)).unwrap();
            assert_eq!(responses_for(&resolver, "B"), k);
        }
    }

    #[test]
    fn test_replayed_callback_is_rejected() {
        let resolver = resolver();
        resolver.resolve(&request("H", "")).unwrap();

        let body = r#"{"legId":"L1","id":"R1"}"#;
        let step = resolver.resolve(&request("H", body)).unwrap();
        assert!(matches!(step.decision, StepDecision::Ask { index: 1, .. }));

        let replay = resolver.resolve(&request("H", body)).unwrap_err();
        assert!(matches!(replay, AppError::Conflict(_)));
        assert_eq!(responses_for(&resolver, "H"), 1);

        // The next genuine answer still lands on question 1
        let step = resolver.resolve(&request("H", r#"{"legId":"L2","id":"R2"}"#)).unwrap();
        assert!(matches!(step.decision, StepDecision::Ask { index: 2, .. }));
        assert_eq!(responses_for(&resolver, "H"), 2);
    }

    #[test]
    fn test_first_contact_ignores_stray_body() {
        let resolver = resolver();

        let step = resolver.resolve(&request("C", r#"{"legId":"L0","id":"R0"}"#)).unwrap();
        assert!(matches!(step.decision, StepDecision::Welcome { .. }));
        assert!(!step.stored_response);
        assert_eq!(responses_for(&resolver, "C"), 0);

        // A malformed body on first contact is ignored as well
        let step = resolver.resolve(&request("D", "{oops")).unwrap();
        assert!(matches!(step.decision, StepDecision::Welcome { .. }));
    }

    #[test]
    fn test_continuing_call_requires_payload() {
        let resolver = resolver();
        resolver.resolve(&request("E", "")).unwrap();

        let missing = resolver.resolve(&request("E", "")).unwrap_err();
        assert!(matches!(missing, AppError::BadRequest(_)));

        let partial = resolver.resolve(&request("E", r#"{"id":"R1"}"#)).unwrap_err();
        assert!(matches!(partial, AppError::BadRequest(_)));

        assert_eq!(responses_for(&resolver, "E"), 0);
    }

    #[test]
    fn test_completed_survey_stays_closed() {
        let resolver = resolver();
        resolver.resolve(&request("F", "")).unwrap();
        for k in 1..=3 {
            let body = format!(r#"{{"legId":"L{k}","id":"R{k}"}}"#);
            resolver.resolve(&request("F", &body)).unwrap();
        }

        let extra = resolver.resolve(&request("F", r#"{"legId":"L4","id":"R4"}"#)).unwrap();
        assert_eq!(extra.question_index, 4);
        assert_eq!(extra.decision, StepDecision::Closing);
        assert!(!extra.stored_response);
        assert_eq!(responses_for(&resolver, "F"), 3);
    }

    #[test]
    fn test_corrupted_state_past_end_closes() {
        let resolver = resolver();
        let participant = resolver.store().create("G", None).unwrap();
        for k in 0..5 {
            resolver
                .store()
                .append_response(participant.id, &format!("L{k}"), &format!("R{k}"))
                .unwrap();
        }

        let step = resolver.resolve(&request("G", r#"{"legId":"Lx","id":"Rx"}"#)).unwrap();
        assert_eq!(step.question_index, 6);
        assert_eq!(step.decision, StepDecision::Closing);
        assert_eq!(responses_for(&resolver, "G"), 5);
    }

    #[test]
    fn test_empty_call_id_rejected() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve(&request("  ", "")),
            Err(AppError::BadRequest(_))
        ));
    }
}
