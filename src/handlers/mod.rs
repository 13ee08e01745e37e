pub mod call_step;
pub mod config;
pub mod playback;
pub mod report;

pub use call_step::*;
pub use config::*;
pub use playback::*;
pub use report::*;

use crate::health;
use actix_web::web;

/// All service routes: the survey webhook, the report, recording playback and
/// the diagnostics under `/api/v1`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(CALL_STEP_PATH)
            .name("call_step")
            .route(web::get().to(call_step))
            .route(web::post().to(call_step)),
    )
    .route("/admin", web::get().to(survey_report))
    .route(
        "/play/{call_id}/{leg_id}/{recording_id}",
        web::get().to(play_recording),
    )
    .service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/config", web::get().to(get_config)),
    )
    .route("/health", web::get().to(health::health_check));
}

/// Application state over an in-memory store, for handler tests.
#[cfg(test)]
pub(crate) fn test_state(questions: &[&str]) -> crate::state::AppState {
    use crate::config::AppConfig;
    use crate::questions::QuestionBank;
    use crate::resolver::CallStepResolver;
    use crate::store::SqliteParticipantStore;
    use crate::voice_api::VoiceApiClient;
    use std::sync::Arc;

    let config = AppConfig::default();
    let questions = QuestionBank::new(questions.iter().map(|q| q.to_string()).collect()).unwrap();
    let store = SqliteParticipantStore::in_memory().unwrap();
    let resolver = CallStepResolver::new(Arc::new(store), questions);
    let voice_api = VoiceApiClient::new(&config.voice).unwrap();

    crate::state::AppState::new(config, resolver, voice_api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_health_reports_store_and_questions() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(&["Q0", "Q1"])))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let health: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["store"]["available"], true);
        assert_eq!(health["survey"]["total_questions"], 2);
    }

    #[actix_web::test]
    async fn test_config_endpoint_lists_questions() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(&["Q0", "Q1"])))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/config").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["config"]["server"]["port"], 8080);
        assert_eq!(body["questions"][1], "Q1");
    }
}
