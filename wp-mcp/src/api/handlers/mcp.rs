// Envelope handler
//
// Accepts request envelopes on `POST /mcp`, authenticates the caller, and
// hands the body to the dispatcher. Every outcome is an envelope; only
// authentication failures change the HTTP status.

use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;

use crate::auth::presented_key;
use crate::errors::McpError;
use crate::protocol::Response;
use crate::tools::ToolContext;
use crate::McpServer;

const API_KEY_HEADER: &str = "X-API-Key";
const SESSION_HEADER: &str = "X-Session-Id";
const USER_HEADER: &str = "X-User-Id";

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Build the tool context from request headers and the peer address
fn context_from_request(req: &HttpRequest) -> ToolContext {
    let mut context = ToolContext::new(header(req, USER_HEADER).unwrap_or("anonymous"));
    if let Some(session_id) = header(req, SESSION_HEADER) {
        context = context.with_session(session_id);
    }
    if let Some(peer) = req.peer_addr() {
        context = context.with_ip(peer.ip().to_string());
    }
    context
}

/// Handler for request envelopes
pub async fn handle_envelope(
    server: web::Data<Arc<McpServer>>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let production = server.settings.is_production();

    let key = presented_key(
        header(&req, API_KEY_HEADER),
        header(&req, actix_web::http::header::AUTHORIZATION.as_str()),
    );
    if let Err(err) = server.auth.authenticate(key) {
        log::warn!(
            "Rejected unauthenticated request from {}",
            req.peer_addr().map(|peer| peer.to_string()).unwrap_or_default()
        );
        return HttpResponse::Unauthorized().json(Response::from_error(&err, production));
    }

    let context = context_from_request(&req);
    let response = match std::str::from_utf8(&body) {
        Ok(body) => server.dispatcher.handle_str(body, context).await,
        Err(e) => Response::from_error(&McpError::Parse(e.to_string()), production),
    };

    HttpResponse::Ok().json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    use crate::config::Settings;
    use crate::errors::codes;

    fn server(auth_enabled: bool) -> Arc<McpServer> {
        let mut settings = Settings::default();
        settings.auth.enabled = auth_enabled;
        settings.auth.api_key = "test-key".to_string();
        Arc::new(McpServer::build(Arc::new(settings)).unwrap())
    }

    #[actix_rt::test]
    async fn test_envelope_round_trip() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(server(false)))
                .configure(crate::api::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/mcp")
            .insert_header((SESSION_HEADER, "s-1"))
            .set_json(json!({ "kind": "invoke", "name": "prompts/list" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["kind"], "success");
        assert_eq!(body["data"]["prompts"].as_array().unwrap().len(), 3);

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_payload("not json")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["kind"], "error");
        assert_eq!(body["error"]["code"], codes::PARSE_ERROR);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
    }

    #[actix_rt::test]
    async fn test_api_key_required_when_enabled() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(server(true)))
                .configure(crate::api::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_json(json!({ "kind": "describe" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("Authorization", "Bearer test-key"))
            .set_json(json!({ "kind": "describe" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["kind"], "success");
    }
}
