//! # Call Step Webhook
//!
//! `GET|POST /callStep?callID=<id>&source=<caller number>`
//!
//! The voice platform calls this endpoint when a call starts and again each time a
//! recording step finishes, posting the recording metadata:
//!
//! ```json
//! { "legId": "f4f5e1c4-...", "id": "9fa4c6d2-..." }
//! ```
//!
//! The response is the call flow to run next. Recording steps call back this same
//! endpoint, so the URL in `onFinish` has to be absolute and has to use the scheme
//! the platform actually reached us on (the service usually sits behind a TLS proxy).

use crate::error::{AppError, AppResult};
use crate::flow::CallFlow;
use crate::resolver::{CallStepRequest, PreviousAnswer};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::debug;

pub const CALL_STEP_PATH: &str = "/callStep";

/// Query parameters sent by the voice platform.
#[derive(Debug, Deserialize)]
pub struct CallStepQuery {
    #[serde(rename = "callID")]
    pub call_id: Option<String>,
    /// Caller's phone number
    pub source: Option<String>,
}

/// Absolute URL of this webhook as seen by the caller.
///
/// The scheme is `https` when the connection itself is https or a proxy says so in
/// `X-Forwarded-Proto`; otherwise `http`.
pub fn callback_url(req: &HttpRequest) -> String {
    let info = req.connection_info();

    let forwarded_https = req
        .headers()
        .get("X-Forwarded-Proto")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false);

    let scheme = if info.scheme() == "https" || forwarded_https {
        "https"
    } else {
        "http"
    };

    format!("{}://{}{}", scheme, info.host(), CALL_STEP_PATH)
}

pub async fn call_step(
    req: HttpRequest,
    query: web::Query<CallStepQuery>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let CallStepQuery { call_id, source } = query.into_inner();

    let call_id = call_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing callID query parameter".to_string()))?;

    let request = CallStepRequest {
        call_id,
        caller_number: source.filter(|number| !number.trim().is_empty()),
        previous: PreviousAnswer::from_body(&body),
    };

    let resolver = state.resolver.clone();
    let step = web::block(move || resolver.resolve(&request)).await??;

    let flow = CallFlow::from_decision(&state.config.survey.title, &step.decision, &callback_url(&req));

    debug!(
        participant_id = step.participant_id,
        question_index = step.question_index,
        steps = flow.steps.len(),
        records = flow.has_record_step(),
        "Returning call flow"
    );

    Ok(HttpResponse::Ok().json(flow))
}
