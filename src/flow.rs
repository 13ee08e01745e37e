//! # Call Flow Builder
//!
//! Turns a survey decision into the call flow JSON understood by the voice platform:
//!
//! ```json
//! {
//!   "title": "Survey Call Step",
//!   "steps": [
//!     { "action": "say", "options": { "payload": "...", "voice": "male", "language": "en-US" } },
//!     { "action": "record", "options": { "finishOnKey": "any", "timeout": 10, "onFinish": "https://host/callStep" } }
//!   ]
//! }
//! ```
//!
//! Everything here is pure: no I/O, no state.

use crate::resolver::StepDecision;
use serde::Serialize;

pub const VOICE: &str = "male";
pub const LANGUAGE: &str = "en-US";
pub const FINISH_ON_KEY: &str = "any";
/// Seconds of silence after which a recording stops.
pub const RECORD_TIMEOUT_SECS: u32 = 10;

pub const CLOSING_MESSAGE: &str = "You have completed our survey. Thank you for participating!";

/// A call flow returned from the webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallFlow {
    pub title: String,
    pub steps: Vec<Step>,
}

/// One instruction of a call flow, serialized as `{"action": ..., "options": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "options", rename_all = "lowercase")]
pub enum Step {
    Say(SayOptions),
    Record(RecordOptions),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SayOptions {
    pub payload: String,
    pub voice: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOptions {
    pub finish_on_key: String,
    pub timeout: u32,
    pub on_finish: String,
}

/// Speak `text` with the fixed survey voice.
pub fn say(text: impl Into<String>) -> Step {
    Step::Say(SayOptions {
        payload: text.into(),
        voice: VOICE.to_string(),
        language: LANGUAGE.to_string(),
    })
}

/// Record the caller until any key press or 10 seconds of silence, then POST
/// the recording metadata to `callback_url`.
pub fn record_next(callback_url: impl Into<String>) -> Step {
    Step::Record(RecordOptions {
        finish_on_key: FINISH_ON_KEY.to_string(),
        timeout: RECORD_TIMEOUT_SECS,
        on_finish: callback_url.into(),
    })
}

pub fn welcome_message(total_questions: usize) -> String {
    format!(
        "Welcome to our survey! You will be asked {} questions. The answers will be recorded. \
         Speak your response for each and press any key on your phone to move on to the next question. \
         Here is the first question:",
        total_questions
    )
}

impl CallFlow {
    /// Build the flow for a decision. Asking steps always end with a recording
    /// that calls back `callback_url`; the closing flow has no recording step.
    pub fn from_decision(title: &str, decision: &StepDecision, callback_url: &str) -> Self {
        let steps = match decision {
            StepDecision::Closing => vec![say(CLOSING_MESSAGE)],
            StepDecision::Welcome {
                total_questions,
                question,
            } => vec![
                say(welcome_message(*total_questions)),
                say(question.as_str()),
                record_next(callback_url),
            ],
            StepDecision::Ask { question, .. } => {
                vec![say(question.as_str()), record_next(callback_url)]
            }
        };

        Self {
            title: title.to_string(),
            steps,
        }
    }

    pub fn has_record_step(&self) -> bool {
        self.steps.iter().any(|step| matches!(step, Step::Record(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_say_wire_format() {
        let value = serde_json::to_value(say("Hello")).unwrap();
        assert_eq!(
            value,
            json!({
                "action": "say",
                "options": { "payload": "Hello", "voice": "male", "language": "en-US" }
            })
        );
    }

    #[test]
    fn test_record_wire_format() {
        let value = serde_json::to_value(record_next("https://survey.example.com/callStep")).unwrap();
        assert_eq!(
            value,
            json!({
                "action": "record",
                "options": {
                    "finishOnKey": "any",
                    "timeout": 10,
                    "onFinish": "https://survey.example.com/callStep"
                }
            })
        );
    }

    #[test]
    fn test_welcome_flow() {
        let decision = StepDecision::Welcome {
            total_questions: 3,
            question: "Q0".to_string(),
        };
        let flow = CallFlow::from_decision("Survey Call Step", &decision, "http://h/callStep");

        assert_eq!(flow.title, "Survey Call Step");
        assert_eq!(flow.steps.len(), 3);
        assert_eq!(flow.steps[0], say(welcome_message(3)));
        assert_eq!(flow.steps[1], say("Q0"));
        assert_eq!(flow.steps[2], record_next("http://h/callStep"));
        assert!(welcome_message(3).contains("asked 3 questions"));
    }

    #[test]
    fn test_closing_flow_has_no_record() {
        let flow = CallFlow::from_decision("t", &StepDecision::Closing, "http://h/callStep");

        assert_eq!(flow.steps, vec![say(CLOSING_MESSAGE)]);
        assert!(!flow.has_record_step());
    }
}
