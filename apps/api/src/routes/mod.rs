pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{ai, auth, editor, export, github, layout, newsletter};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // AI writing
        .route("/api/ai/generate", post(ai::handlers::handle_generate))
        .route("/api/ai/chat", post(ai::handlers::handle_chat))
        .route("/api/ai/titles", post(ai::handlers::handle_titles))
        .route("/api/ai/workflow", post(ai::handlers::handle_workflow))
        .route("/api/ai/health", get(ai::handlers::handle_health))
        // Export
        .route("/api/export/docx", post(export::handlers::handle_export_docx))
        .route("/api/export/pdf", post(export::handlers::handle_export_pdf))
        // Editor sessions
        .route("/api/editor", post(editor::handlers::handle_create))
        .route(
            "/api/editor/:id",
            get(editor::handlers::handle_get)
                .patch(editor::handlers::handle_update)
                .delete(editor::handlers::handle_delete),
        )
        .route(
            "/api/editor/:id/command",
            post(editor::handlers::handle_command),
        )
        .route(
            "/api/editor/:id/generate",
            post(editor::handlers::handle_generate),
        )
        .route("/api/editor/:id/chat", post(editor::handlers::handle_chat))
        .route(
            "/api/editor/:id/workflow",
            post(editor::handlers::handle_workflow),
        )
        .route(
            "/api/editor/:id/export/docx",
            post(editor::handlers::handle_export_docx),
        )
        .route(
            "/api/editor/:id/export/pdf",
            post(editor::handlers::handle_export_pdf),
        )
        // Layout preview
        .route("/api/layout/paginate", post(layout::handlers::handle_paginate))
        // Newsletter
        .route("/api/newsletter", post(newsletter::handle_subscribe))
        // GitHub sign-in and commits
        .route("/api/auth/signin", get(auth::handlers::handle_signin))
        .route(
            "/api/auth/callback/github",
            get(auth::handlers::handle_callback),
        )
        .route("/api/auth/session", get(auth::handlers::handle_session))
        .route("/api/auth/signout", post(auth::handlers::handle_signout))
        .route("/api/github/commit", post(github::handlers::handle_commit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::editor::state::{BusyAction, EditorState};
    use crate::providers::gateway::MISSING_PROVIDER_MESSAGE;

    fn app_with(pairs: &[(&str, &str)]) -> Router {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(|key| {
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap();
        build_router(AppState::new(config, reqwest::Client::new()))
    }

    fn app() -> Router {
        app_with(&[])
    }

    fn test_state() -> AppState {
        let config = Config::from_lookup(|_| None).unwrap();
        AppState::new(config, reqwest::Client::new())
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Opens an editor and returns its id with the creation response.
    async fn open_editor(app: &Router, body: &str) -> (String, Value) {
        let resp = app
            .clone()
            .oneshot(json_post("/api/editor", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let id = body["id"].as_str().unwrap().to_string();
        (id, body)
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(resp: Response) -> Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["service"], "makalah-api");
    }

    #[tokio::test]
    async fn test_ai_health_without_keys() {
        let resp = app()
            .oneshot(Request::get("/api/ai/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["provider"], "none");
    }

    #[tokio::test]
    async fn test_ai_health_reports_configured_provider() {
        let resp = app_with(&[("OPENAI_API_KEY", "sk-test")])
            .oneshot(Request::get("/api/ai/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["provider"], "openai");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert!(!body.to_string().contains("sk-test"));
    }

    #[tokio::test]
    async fn test_generate_without_keys_is_provider_error() {
        let resp = app()
            .oneshot(json_post("/api/ai/generate", r#"{"topic":"Energi terbarukan"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], MISSING_PROVIDER_MESSAGE);
        assert_eq!(body["provider"], "none");
    }

    #[tokio::test]
    async fn test_titles_rejects_blank_topic() {
        let resp = app()
            .oneshot(json_post("/api/ai/titles", r#"{"topic":"   "}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_export_pdf_headers() {
        let resp = app()
            .oneshot(json_post(
                "/api/export/pdf",
                r#"{"title":"Makalah Energi","content":"Paragraf satu.\n\nParagraf dua."}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers().clone();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"makalah-energi.pdf\""
        );
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        assert!(body_bytes(resp).await.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_export_docx_is_zip() {
        let resp = app()
            .oneshot(json_post(
                "/api/export/docx",
                r#"{"title":"Makalah","contentHtml":"<h2>Bab I</h2><p>Isi</p>"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Makalah.docx\""
        );
        assert!(body_bytes(resp).await.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_paginate_endpoint() {
        let resp = app()
            .oneshot(json_post(
                "/api/layout/paginate",
                r#"{"contentHtml":"<p>Satu</p><hr class=\"page-break\"><p>Dua</p>"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["pageCount"], 2);
    }

    #[tokio::test]
    async fn test_newsletter_invalid_email_redirects_with_failure() {
        let resp = app()
            .oneshot(
                Request::post("/api/newsletter")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("name=Siti&email=bukan-email"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/?subscribed=0");
    }

    #[tokio::test]
    async fn test_newsletter_without_target_still_succeeds() {
        let resp = app()
            .oneshot(
                Request::post("/api/newsletter")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("name=Siti&email=siti%40kampus.id"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/?subscribed=1");
    }

    #[tokio::test]
    async fn test_signin_requires_oauth_config() {
        let resp = app()
            .oneshot(Request::get("/api/auth/signin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body_json(resp).await["code"], "NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_signin_redirects_to_github() {
        let resp = app_with(&[("GITHUB_ID", "cid"), ("GITHUB_SECRET", "sec")])
            .oneshot(Request::get("/api/auth/signin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let location = resp.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(location.contains("client_id=cid"));
        assert!(location.contains("state="));
    }

    #[tokio::test]
    async fn test_callback_rejects_unknown_state() {
        let resp = app_with(&[("GITHUB_ID", "cid"), ("GITHUB_SECRET", "sec")])
            .oneshot(
                Request::get("/api/auth/callback/github?code=abc&state=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_unauthenticated() {
        let resp = app()
            .oneshot(Request::get("/api/auth/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["authenticated"], false);
        assert!(body.get("user").is_none());
    }

    #[tokio::test]
    async fn test_commit_requires_session() {
        let resp = app()
            .oneshot(json_post(
                "/api/github/commit",
                r#"{"repo":"budi/makalah","path":"makalah.md","content":"Isi"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signout_expires_cookie() {
        let resp = app()
            .oneshot(Request::post("/api/auth/signout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_editor_create_and_get() {
        let app = app();
        let (id, created) = open_editor(
            &app,
            r#"{"title":"Makalah Energi","contentHtml":"<h2>Bab I</h2><p>Isi</p>"}"#,
        )
        .await;
        assert_eq!(created["title"], "Makalah Energi");
        assert_eq!(created["theme"], "system");
        assert_eq!(created["blocks"].as_array().unwrap().len(), 2);
        assert_eq!(created["layout"]["pageCount"], 1);
        assert_eq!(created["provider"], "none");
        assert_eq!(created["busy"], serde_json::json!([]));

        let resp = app
            .oneshot(Request::get(format!("/api/editor/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["plainText"], created["plainText"]);
    }

    #[tokio::test]
    async fn test_editor_page_break_command_adds_page() {
        let app = app();
        let (id, _) = open_editor(&app, r#"{"content":"Satu.\n\nDua."}"#).await;

        let resp = app
            .oneshot(json_post(
                &format!("/api/editor/{id}/command"),
                r#"{"command":"insertPageBreak","index":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["blocks"][1]["type"], "pageBreak");
        assert_eq!(body["layout"]["pageCount"], 2);
    }

    #[tokio::test]
    async fn test_editor_command_out_of_range_is_validation_error() {
        let app = app();
        let (id, _) = open_editor(&app, r#"{"content":"Satu."}"#).await;

        let resp = app
            .oneshot(json_post(
                &format!("/api/editor/{id}/command"),
                r#"{"command":"deleteBlock","index":7}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_editor_unknown_id_is_not_found() {
        let uri = format!("/api/editor/{}", uuid::Uuid::new_v4());
        let resp = app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_editor_update_cycles_theme_and_layout() {
        let app = app();
        let (id, _) = open_editor(&app, r#"{"content":"Satu."}"#).await;

        let resp = app
            .oneshot(json_request(
                "PATCH",
                &format!("/api/editor/{id}"),
                r#"{"cycleTheme":true,"toggleSidebar":true,"aiEditMode":"replace","layout":{"pageSize":"A4L"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["theme"], "dark");
        assert_eq!(body["themeLabel"], "Dark");
        assert_eq!(body["sidebarOpen"], false);
        assert_eq!(body["aiEditMode"], "replace");
        assert_eq!(body["layout"]["geometry"]["size"], "A4L");
    }

    #[tokio::test]
    async fn test_editor_generate_failure_releases_busy_flag() {
        let app = app();
        let (id, _) = open_editor(&app, r#"{"content":"Satu."}"#).await;

        let resp = app
            .clone()
            .oneshot(json_post(
                &format!("/api/editor/{id}/generate"),
                r#"{"topic":"Energi"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["error"], MISSING_PROVIDER_MESSAGE);

        let resp = app
            .oneshot(Request::get(format!("/api/editor/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["busy"], serde_json::json!([]));
        assert_eq!(body["blocks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_editor_action_in_progress_is_conflict() {
        let state = test_state();
        let editors = state.editors.clone();
        let app = build_router(state);

        let (id, editor) = editors.create(EditorState::new("Makalah")).await;
        let _held = editor.lock().await.try_begin(BusyAction::Generate).unwrap();

        let resp = app
            .clone()
            .oneshot(json_post(&format!("/api/editor/{id}/generate"), "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["code"], "CONFLICT");

        let resp = app
            .clone()
            .oneshot(Request::get(format!("/api/editor/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["busy"], serde_json::json!(["generate"]));

        let resp = app
            .oneshot(
                Request::delete(format!("/api/editor/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_editor_chat_rejects_empty_message() {
        let app = app();
        let (id, _) = open_editor(&app, r#"{"content":"Satu."}"#).await;

        let resp = app
            .oneshot(json_post(
                &format!("/api/editor/{id}/chat"),
                r#"{"message":"   "}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_editor_exports_use_editor_title() {
        let app = app();
        let (id, _) = open_editor(
            &app,
            r#"{"title":"Makalah Energi","content":"Paragraf satu."}"#,
        )
        .await;

        let resp = app
            .clone()
            .oneshot(json_post(&format!("/api/editor/{id}/export/pdf"), ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"makalah-energi.pdf\""
        );

        let resp = app
            .oneshot(json_post(&format!("/api/editor/{id}/export/docx"), ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_bytes(resp).await.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_editor_delete_then_get_is_not_found() {
        let app = app();
        let (id, _) = open_editor(&app, r#"{"content":"Satu."}"#).await;

        let resp = app
            .clone()
            .oneshot(
                Request::delete(format!("/api/editor/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(Request::get(format!("/api/editor/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
