use std::convert::Infallible;

use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::api::ApiContext;
use crate::api::handlers::{self, error_response};

/// Largest JSON body accepted on write endpoints.
const MAX_BODY_BYTES: u64 = 16 * 1024;

fn with_ctx(ctx: ApiContext) -> impl Filter<Extract = (ApiContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn routes(ctx: ApiContext) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let signals = warp::path!("api" / "signals")
        .and(warp::get())
        .and(warp::query())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::list_signals);

    let symbol_signals = warp::path!("api" / "signals" / String)
        .and(warp::get())
        .and(warp::query())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::symbol_signals);

    let historical = warp::path!("api" / "historical" / String / u64)
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::historical);

    let get_settings = warp::path!("api" / "settings")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::get_settings);

    let update_settings = warp::path!("api" / "settings")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::update_settings);

    let notifications = warp::path!("api" / "settings" / "notifications")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::toggle_notifications);

    let list_subscribers = warp::path!("api" / "subscribers")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::list_subscribers);

    let register_subscriber = warp::path!("api" / "subscribers")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::register_subscriber);

    let approval = warp::path!("api" / "subscribers" / i64 / "approval")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::set_approval);

    let status = warp::path!("api" / "status")
        .and(warp::get())
        .and(with_ctx(ctx))
        .and_then(handlers::status);

    health
        .or(signals)
        .or(symbol_signals)
        .or(historical)
        .or(get_settings)
        .or(update_settings)
        .or(notifications)
        .or(list_subscribers)
        .or(register_subscriber)
        .or(approval)
        .or(status)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "expected application/json".to_string(),
        )
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:?}"))
    };

    Ok(error_response(status, message))
}
