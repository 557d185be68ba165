//! HTTP server: router, middleware and listener.

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers;
use crate::config::ServerConfig;
use crate::ledger::Ledger;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
}

/// Build the application router.
pub fn router(ledger: Ledger, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/buy", post(handlers::buy))
        .route("/sell", post(handlers::sell))
        .route("/deposit", post(handlers::deposit))
        .route("/withdraw", post(handlers::withdraw))
        .route("/portfolio/:user_id", get(handlers::portfolio))
        .route("/users/:user_id", get(handlers::get_user).put(handlers::update_user))
        .route("/users/:user_id/transactions", get(handlers::transactions))
        .route("/instruments", get(handlers::list_instruments))
        .route("/instruments/:instrument_id", get(handlers::get_instrument))
        .route("/amounts", get(handlers::list_amounts));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { ledger })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Bind and serve until Ctrl+C.
pub async fn serve(ledger: Ledger, config: ServerConfig) -> Result<()> {
    let app = router(ledger, &config);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!(address = %config.bind, "Ledger API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::response::ErrorResponse;
    use crate::db::tests::{new_user, test_db};
    use crate::models::TransactionKind;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_trade_flow_over_http() {
        let (_dir, db) = test_db().await;
        let user = db.create_user(&new_user("ana@example.com", dec!(1000))).await.unwrap();
        let acme = db.create_instrument("ACME", dec!(100), dec!(1.5)).await.unwrap();
        let app = router(Ledger::new(db), &ServerConfig::default());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/buy",
            Some(json!({ "user_id": user.id, "instrument_id": acme.id, "quantity": 4 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount"], "400.00");
        assert_eq!(body["balance_before"], "1000.00");
        assert_eq!(body["balance_after"], "600.00");
        assert_eq!(body["position"]["quantity"], 4);
        assert_eq!(body["transaction"]["kind"], "BUY");

        let (status, body) = call(&app, Method::GET, &format!("/api/portfolio/{}", user.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["positions"][0]["instrument"]["name"], "ACME");
        assert_eq!(body["positions"][0]["market_value"], "400.00");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/sell",
            Some(json!({ "user_id": user.id, "instrument_id": acme.id, "quantity": 4 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["position"], Value::Null);
        assert_eq!(body["balance_after"], "1000.00");

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/api/users/{}/transactions?limit=1", user.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["kind"], "SELL");
    }

    #[tokio::test]
    async fn test_error_responses() {
        let (_dir, db) = test_db().await;
        let user = db.create_user(&new_user("ana@example.com", dec!(10))).await.unwrap();
        let acme = db.create_instrument("ACME", dec!(100), dec!(0)).await.unwrap();
        let withdrawal = db
            .create_amount_config(dec!(50), TransactionKind::Withdraw, None)
            .await
            .unwrap();
        let app = router(Ledger::new(db), &ServerConfig::default());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/buy",
            Some(json!({ "user_id": user.id, "instrument_id": acme.id, "quantity": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(error.error, "INSUFFICIENT_FUNDS");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/sell",
            Some(json!({ "user_id": user.id, "instrument_id": acme.id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_ARGUMENT");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/deposit",
            Some(json!({ "user_id": user.id, "config_id": withdrawal.id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "NO_SUCH_CONFIG");

        let (status, body) = call(&app, Method::GET, "/api/users/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "USER_NOT_FOUND");

        let (status, body) = call(&app, Method::GET, "/api/amounts?kind=transfer", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_profile_update_cannot_touch_balance() {
        let (_dir, db) = test_db().await;
        let user = db.create_user(&new_user("ana@example.com", dec!(10))).await.unwrap();
        let app = router(Ledger::new(db), &ServerConfig::default());

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/users/{}", user.id),
            Some(json!({ "name": "Ana", "bank_account": "0123", "balance": "99999", "credential": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ana");
        assert_eq!(body["bank_account"], "0123");
        assert_eq!(body["balance"], "10.00");
        assert!(body.get("credential").is_none());
    }
}
