//! Request handlers
//!
//! Each returns a finished reply or an [`ApiError`]; [`finish`] renders the
//! latter.

use crate::context::AppContext;
use crate::error::ApiError;
use chrono::Utc;
use funnel_core::validation::{digits, mask_cpf};
use funnel_core::{LookupError, NewBenefit, NewCandidate, NewState, PaymentError, PaymentRequest, Region};
use serde::de::DeserializeOwned;
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// Largest accepted request body
pub(crate) const MAX_BODY_BYTES: usize = 64 * 1024;

pub(crate) fn json<T: Serialize>(status: StatusCode, body: &T) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

pub(crate) fn finish(result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(|e| {
        tracing::warn!("Request failed: {}", e);
        e.into_response()
    })
}

pub(crate) fn parse<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T, ApiError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(ApiError::PayloadTooLarge);
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejected {} body: {}", what, e);
        ApiError::BadRequest(format!("Invalid {what} data"))
    })
}

pub(crate) fn health(ctx: &AppContext) -> Response {
    json(
        StatusCode::OK,
        &serde_json::json!({
            "status": "ok",
            "env": ctx.config.env,
            "version": crate::VERSION,
            "timestamp": Utc::now().to_rfc3339(),
        }),
    )
}

pub(crate) fn regions(ctx: &AppContext) -> Response {
    let regions: Vec<Region> = ctx.repository.states().iter().map(Region::from).collect();
    json(StatusCode::OK, &regions)
}

pub(crate) fn create_state(ctx: &AppContext, body: &[u8]) -> Result<Response, ApiError> {
    let new: NewState = parse(body, "state")?;
    let state = ctx.repository.create_state(new)?;
    Ok(json(StatusCode::CREATED, &state))
}

pub(crate) fn create_benefit(ctx: &AppContext, body: &[u8]) -> Result<Response, ApiError> {
    let new: NewBenefit = parse(body, "benefit")?;
    let benefit = ctx.repository.create_benefit(new)?;
    Ok(json(StatusCode::CREATED, &benefit))
}

pub(crate) fn create_candidate(ctx: &AppContext, body: &[u8]) -> Result<Response, ApiError> {
    let new: NewCandidate = parse(body, "candidate")?;
    let candidate = ctx.repository.create_candidate(new)?;
    tracing::info!("Registered candidate {} in {}", candidate.id, candidate.state);
    Ok(json(StatusCode::CREATED, &candidate))
}

pub(crate) async fn create_payment(ctx: &AppContext, body: &[u8]) -> Result<Response, ApiError> {
    let mut request: PaymentRequest = parse(body, "payment")?;
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required.".to_string()));
    }
    if digits(&request.cpf).is_empty() {
        return Err(ApiError::BadRequest("CPF is required.".to_string()));
    }
    request.amount = Some(ctx.config.payment_amount);

    tracing::info!(
        "Creating PIX payment of R$ {:.2} for CPF {}",
        ctx.config.payment_amount,
        mask_cpf(&request.cpf)
    );
    let payment = ctx.payments.create(&request).await.map_err(|e| match e {
        PaymentError::InvalidRequest(msg) => ApiError::BadRequest(msg),
        other => {
            tracing::error!("Payment creation failed: {}", other);
            ApiError::Internal(other.user_message().to_string())
        }
    })?;
    Ok(json(StatusCode::OK, &payment))
}

pub(crate) async fn vehicle_info(ctx: &AppContext, plate: &str) -> Result<Response, ApiError> {
    match ctx.vehicles.lookup(plate).await {
        Ok(resolved) => Ok(json(StatusCode::OK, &resolved.info)),
        Err(e @ LookupError::InvalidPlate(_)) => Err(ApiError::BadRequest(e.user_message().to_string())),
        Err(e @ LookupError::Unavailable { .. }) => {
            tracing::warn!("Vehicle proxy: {}", e);
            Err(ApiError::Upstream(e.user_message().to_string()))
        }
    }
}
