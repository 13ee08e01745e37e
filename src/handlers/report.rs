use crate::error::AppResult;
use crate::report::build_report;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Every participant with their answers paired to questions by position.
///
/// ## Endpoint: `GET /admin`
///
/// ## Response:
/// ```json
/// {
///   "total_questions": 3,
///   "participants": [
///     {
///       "callId": "A",
///       "number": "555",
///       "createdAt": "2025-01-01T12:00:00Z",
///       "responses": [
///         { "question": "...", "legId": "L1", "recordingId": "R1", "playUrl": "/play/A/L1/R1" }
///       ]
///     }
///   ]
/// }
/// ```
pub async fn survey_report(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let resolver = state.resolver.clone();
    let rows = web::block(move || resolver.store().list_participants_with_responses()).await??;

    let participants = build_report(rows, state.resolver.questions());

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "title": state.config.survey.title,
        "total_questions": state.resolver.questions().len(),
        "participants": participants
    })))
}

#[cfg(test)]
mod tests {
    use crate::handlers::{configure_routes, test_state};
    use actix_web::{test, web, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_report_shows_answered_questions_only() {
        let state = test_state(&["Q0", "Q1", "Q2"]);
        let store = state.resolver.store().clone();
        let a = store.create("A", Some("555")).unwrap();
        store.append_response(a.id, "L1", "R1").unwrap();
        store.append_response(a.id, "L2", "R2").unwrap();
        store.create("B", None).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/admin").to_request();
        let report: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(report["total_questions"], 3);
        let participants = report["participants"].as_array().unwrap();
        assert_eq!(participants.len(), 2);

        let answers = participants[0]["responses"].as_array().unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0]["question"], "Q0");
        assert_eq!(answers[1]["question"], "Q1");
        assert_eq!(answers[1]["legId"], "L2");
        assert_eq!(answers[1]["playUrl"], "/play/A/L2/R2");

        assert_eq!(participants[1]["callId"], "B");
        assert!(participants[1]["number"].is_null());
        assert!(participants[1]["responses"].as_array().unwrap().is_empty());
    }
}
