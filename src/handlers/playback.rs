use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse};
use tracing::warn;

/// Stream a recording from the voice platform back to the caller.
///
/// ## Endpoint: `GET /play/{callId}/{legId}/{recordingId}`
///
/// The upstream status, content type and bytes are passed through untouched, so an
/// upstream 404 or 401 reaches the browser as-is. Only a transport failure (no
/// response at all) becomes our own 502.
pub async fn play_recording(
    path: web::Path<(String, String, String)>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let (call_id, leg_id, recording_id) = path.into_inner();

    let upstream = state
        .voice_api
        .fetch_recording(&call_id, &leg_id, &recording_id)
        .await?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| AppError::Upstream(format!("Invalid upstream status: {}", e)))?;

    if !status.is_success() {
        warn!(
            call_id = %call_id,
            leg_id = %leg_id,
            recording_id = %recording_id,
            status = status.as_u16(),
            "Voice API refused recording"
        );
    }

    let mut response = HttpResponse::build(status);

    if let Some(content_type) = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        response.insert_header((header::CONTENT_TYPE, content_type.to_string()));
    }

    if let Some(length) = upstream.content_length() {
        response.no_chunking(length);
    }

    Ok(response.streaming(upstream.bytes_stream()))
}

#[cfg(test)]
mod tests {
    use crate::handlers::{configure_routes, test_state};
    use actix_web::{http::StatusCode, test, web, App};

    #[actix_web::test]
    async fn test_play_without_api_key_is_config_error() {
        // test_state leaves the API key unset, so nothing is sent upstream
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(&["Q0"])))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/play/A/L1/R1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "config_error");
    }

    #[actix_web::test]
    async fn test_encoded_report_link_reaches_playback() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(&["Q0"])))
                .configure(configure_routes),
        )
        .await;

        // Reaching the handler (config_error) rather than 404 means the route matched
        let uri = crate::report::play_path("a/b", "l?1", "r#1");
        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
