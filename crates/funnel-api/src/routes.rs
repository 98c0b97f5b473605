//! warp filters and handlers
//!
//! Handlers never reject: every outcome, errors included, becomes a reply.
//! Rejections are left to routing alone, so an `/api/*` path nothing
//! matched falls through to the `{error, path}` 404.

use crate::context::AppContext;
use crate::error::{error_reply, ApiError};
use crate::handlers::{self, MAX_BODY_BYTES};
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// The whole API
pub fn routes(ctx: AppContext) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: AppContext| handlers::health(&ctx));

    let states = warp::path!("api" / "states")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: AppContext| handlers::json(StatusCode::OK, &ctx.repository.states()));

    let states_with_vacancies = warp::path!("api" / "states" / "with-vacancies")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: AppContext| handlers::json(StatusCode::OK, &ctx.repository.states_with_vacancies()));

    let regions = warp::path!("api" / "regions")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: AppContext| handlers::regions(&ctx));

    let create_state = warp::path!("api" / "states")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(json_body())
        .map(|ctx: AppContext, body: Result<Bytes, ApiError>| {
            handlers::finish(body.and_then(|body| handlers::create_state(&ctx, &body)))
        });

    let benefits = warp::path!("api" / "benefits")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: AppContext| handlers::json(StatusCode::OK, &ctx.repository.benefits()));

    let create_benefit = warp::path!("api" / "benefits")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(json_body())
        .map(|ctx: AppContext, body: Result<Bytes, ApiError>| {
            handlers::finish(body.and_then(|body| handlers::create_benefit(&ctx, &body)))
        });

    let candidates = warp::path!("api" / "candidates")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: AppContext| handlers::json(StatusCode::OK, &ctx.repository.candidates()));

    let create_candidate = warp::path!("api" / "candidates")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(json_body())
        .map(|ctx: AppContext, body: Result<Bytes, ApiError>| {
            handlers::finish(body.and_then(|body| handlers::create_candidate(&ctx, &body)))
        });

    let create_payment = warp::path!("api" / "payments" / "pix")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(json_body())
        .then(|ctx: AppContext, body: Result<Bytes, ApiError>| async move {
            match body {
                Ok(body) => handlers::finish(handlers::create_payment(&ctx, &body).await),
                Err(e) => handlers::finish(Err(e)),
            }
        });

    let vehicle_info = warp::path!("api" / "vehicle-info" / String)
        .and(warp::get())
        .and(with_context(ctx))
        .then(|plate: String, ctx: AppContext| async move {
            handlers::finish(handlers::vehicle_info(&ctx, &plate).await)
        });

    let api_not_found = warp::path("api")
        .and(warp::path::full())
        .map(|path: FullPath| error_reply(StatusCode::NOT_FOUND, "Not found", Some(path.as_str())));

    health
        .or(states_with_vacancies)
        .or(states)
        .or(create_state)
        .or(regions)
        .or(benefits)
        .or(create_benefit)
        .or(candidates)
        .or(create_candidate)
        .or(create_payment)
        .or(vehicle_info)
        .or(api_not_found)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_context(ctx: AppContext) -> impl Filter<Extract = (AppContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Request body, or `PayloadTooLarge` when the declared length is over the
/// limit; such bodies are never buffered
fn json_body() -> impl Filter<Extract = (Result<Bytes, ApiError>,), Error = Rejection> + Clone {
    let declared_too_large = warp::header::optional::<u64>("content-length").and_then(
        |len: Option<u64>| async move {
            match len {
                Some(len) if len > MAX_BODY_BYTES as u64 => {
                    Ok::<Result<Bytes, ApiError>, Rejection>(Err(ApiError::PayloadTooLarge))
                }
                _ => Err(warp::reject::not_found()),
            }
        },
    );
    let buffered = warp::body::bytes().map(Ok::<Bytes, ApiError>);
    declared_too_large.or(buffered).unify()
}

/// Turn routing rejections into `{error}` replies
///
/// # Errors
/// Never; the error type only satisfies warp's recover signature
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    Ok(error_reply(status, message, None))
}
