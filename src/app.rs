//! HTTP application assembly
//!
//! Builds the services from configuration and stores, and merges the
//! per-module routers under shared CORS, compression and tracing layers.

use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode, header},
    routing::get,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::core::attendance::{AttendanceApiState, AttendanceService, attendance_api_router};
use crate::core::auth::{
    AuthApiState, AuthService, JwtService, RefreshTokenLedger, auth_api_router,
};
use crate::core::clock::SharedClock;
use crate::core::config::Config;
use crate::core::db::{PgPool, Stores, health_check};
use crate::core::notify::NotificationDispatcher;
use crate::core::qr::{QrApiState, QrRenderer, QrService, qr_api_router};

/// Every service the HTTP surface needs
#[derive(Clone)]
pub struct AppServices {
    pub jwt: JwtService,
    pub ledger: RefreshTokenLedger,
    pub auth: AuthService,
    pub attendance: AttendanceService,
    pub qr: QrService,
    /// Set when running against PostgreSQL
    pub pool: Option<PgPool>,
}

impl AppServices {
    pub fn new(
        config: &Config,
        stores: Stores,
        notifications: NotificationDispatcher,
        clock: SharedClock,
    ) -> Self {
        let jwt = JwtService::new(config.jwt.clone()).with_clock(clock.clone());
        let ledger = RefreshTokenLedger::new(
            stores.refresh_tokens.clone(),
            config.jwt.refresh_ttl(),
            clock.clone(),
        );

        let auth = AuthService::new(
            stores.users.clone(),
            ledger.clone(),
            jwt.clone(),
            notifications,
            clock.clone(),
            config.auth.clone(),
        );
        let attendance = AttendanceService::new(
            stores.users.clone(),
            stores.attendance.clone(),
            config.check_in,
            clock.clone(),
        );
        let qr = QrService::new(stores.users, QrRenderer::new(config.qr_code_size), clock);

        Self {
            jwt,
            ledger,
            auth,
            attendance,
            qr,
            pool: None,
        }
    }

    /// Report `pool` from the health endpoint
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
}

/// GET /health
async fn health_handler(
    State(pool): State<Option<PgPool>>,
) -> (StatusCode, Json<HealthResponse>) {
    let Some(pool) = pool else {
        return (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                store: "memory",
            }),
        );
    };

    match health_check(&pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                store: "postgres",
            }),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    store: "postgres",
                }),
            )
        }
    }
}

/// Build the full application router
pub fn app_router(services: AppServices) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any);

    let health = Router::new()
        .route("/health", get(health_handler))
        .with_state(services.pool.clone());

    Router::new()
        .merge(health)
        .merge(auth_api_router(AuthApiState {
            auth_service: services.auth,
        }))
        .merge(attendance_api_router(AttendanceApiState {
            attendance_service: services.attendance,
            jwt: services.jwt.clone(),
        }))
        .merge(qr_api_router(QrApiState {
            qr_service: services.qr,
            jwt: services.jwt,
        }))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attendance::CheckInPolicy;
    use crate::core::clock::FixedClock;
    use crate::core::db::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<FixedClock>) {
        let mut config = Config::new("test_secret_key_for_testing_only_32bytes!")
            .check_in(CheckInPolicy::new(chrono_tz::UTC, 8));
        config.auth.bcrypt_cost = 4;
        config.qr_code_size = 64;

        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 2, 7, 55, 0).unwrap(),
        ));
        let (notifications, _outbox) = NotificationDispatcher::channel();
        let services = AppServices::new(
            &config,
            Stores::from_single(Arc::new(MemoryStore::new())),
            notifications,
            clock.clone(),
        );

        (app_router(services), clock)
    }

    fn request(method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn read_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_memory_store() {
        let (router, _clock) = test_app();

        let response = router
            .oneshot(request("GET", "/health", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body, json!({"status": "ok", "store": "memory"}));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (router, _clock) = test_app();

        let response = router
            .oneshot(request("GET", "/api/v1/nope", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_register_login_qr_check_in_flow() {
        let (router, clock) = test_app();

        let registered = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(json!({"email": "a@x.com", "password": "Abcdef1!", "confirm_password": "Abcdef1!"})),
            ))
            .await
            .unwrap();
        assert_eq!(registered.status(), StatusCode::CREATED);
        let user_id = read_json(registered).await["user_id"]
            .as_str()
            .unwrap()
            .to_string();

        let login = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(json!({"email": "a@x.com", "password": "Abcdef1!"})),
            ))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        let access = read_json(login).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        let qr = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/qr/generate",
                Some(&access),
                Some(json!({ "user_id": user_id })),
            ))
            .await
            .unwrap();
        assert_eq!(qr.status(), StatusCode::OK);
        let qr_token = read_json(qr).await["qr_code_token"]
            .as_str()
            .unwrap()
            .to_string();

        // Still inside the access token lifetime, but past the 08:00 cutoff
        clock.set(Utc.with_ymd_and_hms(2025, 3, 2, 8, 5, 0).unwrap());

        let check_in = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/attendance/qr-checkin",
                Some(&access),
                Some(json!({ "qr_code_token": qr_token })),
            ))
            .await
            .unwrap();
        assert_eq!(check_in.status(), StatusCode::CREATED);
        let record = read_json(check_in).await;
        assert_eq!(record["user_id"], user_id.as_str());
        assert_eq!(record["qr_based"], true);
        assert_eq!(record["late"], true);

        let analytics = router
            .oneshot(request(
                "GET",
                "/api/v1/attendance/analytics?date=2025-03-02",
                Some(&access),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(analytics.status(), StatusCode::OK);
        let body = read_json(analytics).await;
        assert_eq!(body["total_attendance_for_date"], 1);
        assert_eq!(body["members_for_date"], 1);
    }
}
