use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tokio::signal;
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, UnsupportedMediaType,
    },
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::{constants::JSON_BODY_LIMIT, error::Error, schema::LabelKind, state::State};

pub mod labels;
pub mod recipes;
pub mod user;

/// The complete filter tree: `/api/...` plus stored media under `/media`.
pub fn routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let recipe = warp::path("recipe").and(
        recipes::routes(state.clone())
            .or(labels::routes(LabelKind::Tag, state.clone()))
            .unify()
            .or(labels::routes(LabelKind::Ingredient, state.clone()))
            .unify(),
    );

    let api = warp::path("api").and(
        warp::path("user")
            .and(user::routes(state.clone()))
            .or(recipe)
            .unify(),
    );

    let media = warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(state.media.root().to_owned()));

    api.or(media)
        .recover(handle_rejection)
        .with(warp::log("recipe::api"))
}

pub(crate) fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

pub(crate) fn reply_json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub(crate) fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Handlers render their own errors instead of rejecting, so a failed
/// request never falls through to sibling routes.
pub(crate) fn respond(result: Result<Response, Error>) -> Result<Response, Rejection> {
    Ok(result.unwrap_or_else(|e| e.to_response()))
}

fn detail(message: &str, status: StatusCode) -> Response {
    reply_json(&json!({ "detail": message }), status)
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<Error>() {
        return Ok(e.to_response());
    }
    if let Some(e) = err.find::<BodyDeserializeError>() {
        return Ok(detail(&format!("JSON parse error - {e}"), StatusCode::BAD_REQUEST));
    }
    if let Some(e) = err.find::<InvalidQuery>() {
        return Ok(detail(&e.to_string(), StatusCode::BAD_REQUEST));
    }
    if let Some(e) = err.find::<MissingHeader>() {
        return Ok(detail(&e.to_string(), StatusCode::BAD_REQUEST));
    }
    if let Some(e) = err.find::<InvalidHeader>() {
        return Ok(detail(&e.to_string(), StatusCode::BAD_REQUEST));
    }
    if err.find::<LengthRequired>().is_some() {
        return Ok(detail("Content-Length required.", StatusCode::LENGTH_REQUIRED));
    }
    if err.find::<PayloadTooLarge>().is_some() {
        return Ok(detail("Request body is too large.", StatusCode::PAYLOAD_TOO_LARGE));
    }
    if let Some(e) = err.find::<UnsupportedMediaType>() {
        return Ok(detail(&e.to_string(), StatusCode::UNSUPPORTED_MEDIA_TYPE));
    }
    if err.find::<MethodNotAllowed>().is_some() {
        return Ok(Error::MethodNotAllowed.to_response());
    }
    if err.is_not_found() {
        return Ok(Error::NotFound.to_response());
    }

    log::error!("Unhandled rejection: {err:?}");
    Ok(detail(
        "A server error occurred.",
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}

pub async fn start_server(state: Arc<State>, port: u16) -> Result<(), Error> {
    let address = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Binding to {address}");

    let (address, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(address, shutdown_signal())
        .map_err(|e| Error::Internal(format!("Failed to bind {address}: {e}")))?;
    log::info!("Server running on {address}");

    server.await;
    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
