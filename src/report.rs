//! Survey report: stored answers paired with the questions they answer.

use crate::questions::QuestionBank;
use crate::store::{Participant, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantReport {
    pub call_id: String,
    pub number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responses: Vec<AnswerReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReport {
    pub question: String,
    pub leg_id: String,
    pub recording_id: String,
    pub play_url: String,
}

/// Relative URL of the recording pass-through for one answer. Each id is
/// percent-encoded so it stays a single path segment.
pub fn play_path(call_id: &str, leg_id: &str, recording_id: &str) -> String {
    format!(
        "/play/{}/{}/{}",
        encode_segment(call_id),
        encode_segment(leg_id),
        encode_segment(recording_id)
    )
}

// byte_serialize turns spaces into '+' and encodes a literal '+' as %2B,
// so swapping '+' for %20 gives a valid path segment.
fn encode_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Pair response i with question i. Responses without a matching question
/// (only possible with a corrupted store) are left out.
pub fn build_report(
    rows: Vec<(Participant, Vec<Response>)>,
    questions: &QuestionBank,
) -> Vec<ParticipantReport> {
    rows.into_iter()
        .map(|(participant, responses)| {
            let answers = questions
                .iter()
                .zip(responses)
                .map(|(question, response)| AnswerReport {
                    question: question.to_string(),
                    play_url: play_path(&participant.call_id, &response.leg_id, &response.recording_id),
                    leg_id: response.leg_id,
                    recording_id: response.recording_id,
                })
                .collect();

            ParticipantReport {
                call_id: participant.call_id,
                number: participant.number,
                created_at: participant.created_at,
                responses: answers,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: i64, call_id: &str) -> Participant {
        Participant {
            id,
            call_id: call_id.to_string(),
            number: Some("555".to_string()),
            created_at: Utc::now(),
        }
    }

    fn response(participant_id: i64, n: usize) -> Response {
        Response {
            id: n as i64,
            participant_id,
            leg_id: format!("L{n}"),
            recording_id: format!("R{n}"),
            created_at: Utc::now(),
        }
    }

    fn questions() -> QuestionBank {
        QuestionBank::new(vec!["Q0".to_string(), "Q1".to_string(), "Q2".to_string()]).unwrap()
    }

    #[test]
    fn test_partial_answers_pair_by_position() {
        let rows = vec![(participant(1, "A"), vec![response(1, 0), response(1, 1)])];
        let report = build_report(rows, &questions());

        assert_eq!(report.len(), 1);
        let answers = &report[0].responses;
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].question, "Q0");
        assert_eq!(answers[0].leg_id, "L0");
        assert_eq!(answers[1].question, "Q1");
        assert_eq!(answers[1].recording_id, "R1");
        assert_eq!(answers[1].play_url, "/play/A/L1/R1");
    }

    #[test]
    fn test_play_path_keeps_ids_in_one_segment() {
        assert_eq!(play_path("A", "L1", "R1"), "/play/A/L1/R1");
        assert_eq!(
            play_path("a/b", "l?1", "r#1"),
            "/play/a%2Fb/l%3F1/r%231"
        );
        assert_eq!(play_path("a b", "l+1", "r%1"), "/play/a%20b/l%2B1/r%251");
    }

    #[test]
    fn test_extra_responses_are_dropped() {
        let responses = (0..5).map(|n| response(1, n)).collect();
        let report = build_report(vec![(participant(1, "A"), responses)], &questions());
        assert_eq!(report[0].responses.len(), 3);
    }

    #[test]
    fn test_participant_without_answers() {
        let report = build_report(vec![(participant(1, "A"), vec![])], &questions());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json[0]["callId"], "A");
        assert_eq!(json[0]["responses"].as_array().unwrap().len(), 0);
    }
}
