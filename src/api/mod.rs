pub mod auth;
pub mod error;
mod password_reset;
mod settings;
mod sleep;
mod stats;
pub mod validation;

use axum::{
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let require_auth = middleware::from_fn_with_state(state.clone(), auth::auth_middleware);

    // Auth routes
    let auth_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route_layer(require_auth.clone())
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(password_reset::forgot_password))
        .route("/verify-code", post(password_reset::verify_code))
        .route("/reset-password", post(password_reset::reset_password));

    // Protected API routes
    let api_routes = Router::new()
        // Sleep sessions
        .route("/sleep", get(sleep::list_sessions).post(sleep::create_session))
        .route("/sleep/current", get(sleep::current_sleep))
        .route("/sleep/start", post(sleep::start_sleep))
        .route("/sleep/end", post(sleep::end_sleep))
        .route("/sleep/:id", delete(sleep::delete_session))
        // Reminders
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        // Statistics
        .route("/stats", get(stats::summary))
        .route("/stats/weekdays", get(stats::weekdays))
        .route("/stats/weeks", get(stats::weeks))
        .route("/stats/months", get(stats::months))
        .route("/stats/trend", get(stats::trend))
        .layer(require_auth);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{init_in_memory, PasswordReset};
    use crate::notifications::ResetMailer;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ResetMailer for RecordingMailer {
        async fn send_reset_code(
            &self,
            to_email: &str,
            _username: &str,
            code: &str,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp down");
            }
            self.sent
                .lock()
                .unwrap()
                .push((to_email.to_string(), code.to_string()));
            Ok(())
        }
    }

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
        mailer: Arc<RecordingMailer>,
    }

    async fn app_with_mailer(mailer: RecordingMailer) -> TestApp {
        let db = init_in_memory().await.unwrap();
        let mailer = Arc::new(mailer);
        let state = Arc::new(AppState::new(Config::default(), db, mailer.clone()));
        TestApp {
            router: create_router(state.clone()),
            state,
            mailer,
        }
    }

    async fn app() -> TestApp {
        app_with_mailer(RecordingMailer::default()).await
    }

    impl TestApp {
        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("Authorization", format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn register(&self, username: &str, email: &str) -> (StatusCode, Value) {
            self.send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "password": "secret1",
                    "confirm_password": "secret1",
                    "email": email,
                })),
            )
            .await
        }

        async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
            self.send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await
        }

        async fn token(&self, username: &str) -> String {
            let (_, body) = self.login(username, "secret1").await;
            body["token"].as_str().unwrap().to_string()
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let app = app().await;

        let (status, body) = app.register("luna", "luna@example.com").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["username"], "luna");
        assert!(body.get("password_hash").is_none());

        let (status, _) = app.register("luna", "other@example.com").await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = app.register("sol", "luna@example.com").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app.login("luna", "wrong").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = app.login("nobody", "secret1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.login("luna", "secret1").await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap();

        let (status, body) = app.send(Method::GET, "/api/auth/me", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "luna@example.com");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let app = app().await;
        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "username": "lu",
                    "password": "short",
                    "confirm_password": "other",
                    "email": "not-an-email",
                })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        let details = &body["error"]["details"];
        for field in ["username", "password", "confirm_password", "email"] {
            assert!(details.get(field).is_some(), "missing {}", field);
        }
    }

    #[tokio::test]
    async fn test_register_trims_username_before_length_check() {
        let app = app().await;
        let (status, body) = app.register("  ab", "ab@example.com").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert!(body["error"]["details"].get("username").is_some());

        let (status, body) = app.register("  abc  ", " abc@example.com ").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["username"], "abc");
        assert_eq!(body["email"], "abc@example.com");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let app = app().await;
        let (status, body) = app.send(Method::GET, "/api/sleep", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let (status, _) = app
            .send(Method::GET, "/api/sleep", Some("bogus"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let app = app().await;
        app.register("luna", "luna@example.com").await;
        let token = app.token("luna").await;

        let (status, _) = app
            .send(Method::POST, "/api/auth/logout", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sleep_sessions_flow() {
        let app = app().await;
        app.register("luna", "luna@example.com").await;
        app.register("sol", "sol@example.com").await;
        let token = app.token("luna").await;
        let other = app.token("sol").await;

        for (day, hours) in [(3, 6.0), (4, 8.0), (5, 7.0)] {
            let (status, _) = app
                .send(
                    Method::POST,
                    "/api/sleep",
                    Some(&token),
                    Some(json!({ "year": 2024, "month": 6, "day": day, "hours": hours })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = app
            .send(
                Method::POST,
                "/api/sleep",
                Some(&token),
                Some(json!({ "year": 2023, "month": 2, "day": 29, "hours": -1.0 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"].get("date").is_some());
        assert!(body["error"]["details"].get("hours").is_some());

        let (_, sessions) = app.send(Method::GET, "/api/sleep", Some(&token), None).await;
        let sessions = sessions.as_array().unwrap();
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0]["day"], 5);

        let id = sessions[0]["id"].as_i64().unwrap();
        let (status, _) = app
            .send(Method::DELETE, &format!("/api/sleep/{}", id), Some(&other), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .send(Method::DELETE, &format!("/api/sleep/{}", id), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = app.send(Method::GET, "/api/stats", Some(&token), None).await;
        assert_eq!(body["session_count"], 2);
        assert_eq!(body["average_hours"], 7.0);
        assert_eq!(body["recent"].as_array().unwrap().len(), 2);

        let (_, body) = app
            .send(Method::GET, "/api/stats/weekdays", Some(&token), None)
            .await;
        let days: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["weekday"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(days, vec!["Mon", "Tue"]);

        let (_, body) = app
            .send(Method::GET, "/api/stats/weeks?weeks=8", Some(&token), None)
            .await;
        assert_eq!(body[0]["week"], "2024-W22");

        let (_, body) = app
            .send(Method::GET, "/api/stats/months", Some(&token), None)
            .await;
        assert_eq!(body[0]["month"], 6);

        let (status, body) = app
            .send(Method::GET, "/api/stats/trend?limit=30", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["points"].as_array().unwrap().len(), 2);

        // Other user sees nothing
        let (_, body) = app.send(Method::GET, "/api/stats", Some(&other), None).await;
        assert_eq!(body["session_count"], 0);
        assert!(body["average_hours"].is_null());
    }

    #[tokio::test]
    async fn test_live_tracking() {
        let app = app().await;
        app.register("luna", "luna@example.com").await;
        let token = app.token("luna").await;

        let (_, body) = app
            .send(Method::GET, "/api/sleep/current", Some(&token), None)
            .await;
        assert_eq!(body["sleeping"], false);

        let (status, _) = app
            .send(Method::POST, "/api/sleep/end", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .send(Method::POST, "/api/sleep/start", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = app
            .send(Method::POST, "/api/sleep/start", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = app
            .send(Method::GET, "/api/sleep/current", Some(&token), None)
            .await;
        assert_eq!(body["sleeping"], true);

        let (status, body) = app
            .send(Method::POST, "/api/sleep/end", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["hours"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let app = app().await;
        app.register("luna", "luna@example.com").await;
        let token = app.token("luna").await;

        let (_, body) = app.send(Method::GET, "/api/settings", Some(&token), None).await;
        assert_eq!(body["bedtime_hour"], "10");
        assert_eq!(body["alarm_enabled"], false);

        let (status, body) = app
            .send(
                Method::PUT,
                "/api/settings",
                Some(&token),
                Some(json!({
                    "bedtime_enabled": true,
                    "bedtime_hour": "9",
                    "bedtime_minute": "45",
                    "bedtime_ampm": "pm",
                    "alarm_enabled": true,
                    "alarm_hour": "06",
                    "alarm_minute": "30",
                    "alarm_ampm": "AM",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bedtime_hour"], "09");
        assert_eq!(body["bedtime_ampm"], "PM");

        let (_, body) = app.send(Method::GET, "/api/settings", Some(&token), None).await;
        assert_eq!(body["bedtime_enabled"], true);
        assert_eq!(body["bedtime_minute"], "45");

        let (status, body) = app
            .send(
                Method::PUT,
                "/api/settings",
                Some(&token),
                Some(json!({
                    "bedtime_enabled": true,
                    "bedtime_hour": "13",
                    "bedtime_minute": "00",
                    "bedtime_ampm": "PM",
                    "alarm_enabled": false,
                    "alarm_hour": "06",
                    "alarm_minute": "30",
                    "alarm_ampm": "AM",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"].get("bedtime").is_some());
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let app = app().await;
        app.register("luna", "luna@example.com").await;

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/forgot-password",
                None,
                Some(json!({ "email": "nobody@example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/forgot-password",
                None,
                Some(json!({ "email": "bad" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/forgot-password",
                None,
                Some(json!({ "email": "luna@example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let code = app.mailer.sent.lock().unwrap()[0].1.clone();
        assert_eq!(code.len(), 6);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/verify-code",
                None,
                Some(json!({ "email": "luna@example.com", "code": "not-it" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/verify-code",
                None,
                Some(json!({ "email": "luna@example.com", "code": code })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);

        // Weak password is refused and the code stays usable
        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/reset-password",
                None,
                Some(json!({
                    "email": "luna@example.com",
                    "code": code,
                    "password": "weakpass",
                    "confirm_password": "weakpass",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/reset-password",
                None,
                Some(json!({
                    "email": "luna@example.com",
                    "code": code,
                    "password": "Sleepy123!",
                    "confirm_password": "Sleepy123!",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.login("luna", "secret1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = app.login("luna", "Sleepy123!").await;
        assert_eq!(status, StatusCode::OK);

        // Code is single use
        assert!(!PasswordReset::verify(
            &app.state.db,
            "luna@example.com",
            &code,
            chrono::Utc::now().naive_utc()
        )
        .await
        .unwrap());
    }

    #[tokio::test]
    async fn test_forgot_password_mail_failure_is_502() {
        let app = app_with_mailer(RecordingMailer {
            fail: true,
            ..Default::default()
        })
        .await;
        app.register("luna", "luna@example.com").await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/forgot-password",
                None,
                Some(json!({ "email": "luna@example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "external_service_error");
    }
}
