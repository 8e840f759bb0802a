use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::usecases::payments::{PaymentError, PaymentUseCase};

pub fn routes(payment_usecase: Arc<PaymentUseCase>) -> Router {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/gateway-return", get(gateway_return))
        .with_state(payment_usecase)
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub subscription_id: Uuid,
    pub bank_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    checkout_url: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(err: PaymentError) -> axum::response::Response {
    (
        err.status_code(),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

pub async fn create_checkout(
    State(payment_usecase): State<Arc<PaymentUseCase>>,
    headers: HeaderMap,
    Json(payload): Json<CreateCheckoutRequest>,
) -> impl IntoResponse {
    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .unwrap_or("0.0.0.0")
        .trim()
        .to_string();

    match payment_usecase
        .create_payment_url(payload.subscription_id, client_ip, payload.bank_code)
        .await
    {
        Ok(checkout_url) => {
            (StatusCode::OK, Json(CheckoutResponse { checkout_url })).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub async fn gateway_return(
    State(payment_usecase): State<Arc<PaymentUseCase>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    match payment_usecase.handle_gateway_callback(&params).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}
