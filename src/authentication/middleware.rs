use std::{convert::Infallible, sync::Arc};

use warp::{
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    reject::Rejection,
    Filter,
};

use crate::{error::Error, schema::User, state::State};

pub fn with_state(
    state: Arc<State>,
) -> impl Filter<Extract = (Arc<State>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Accepts `Bearer <token>` and `Token <token>`.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if !(scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token")) {
        return None;
    }
    if token.is_empty() {
        return None;
    }
    Some(token)
}

pub async fn authenticate(header: Option<HeaderValue>, state: &State) -> Result<User, Error> {
    let header = header.ok_or_else(Error::unauthenticated)?;
    let header = header.to_str().map_err(|_| Error::unauthenticated())?;
    let token = bearer_token(header).ok_or_else(Error::unauthenticated)?;
    let session = state.keys.verify_session(token)?;

    match state.store.get_user(session.user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(Error::Authentication("User inactive or deleted.".to_owned())),
    }
}

/// Resolves the requesting user from the `Authorization` header, rejecting
/// with 401 when it is missing or invalid.
pub fn with_session(state: Arc<State>) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    warp::header::headers_cloned()
        .map(|headers: HeaderMap| headers.get(AUTHORIZATION).cloned())
        .and(with_state(state))
        .and_then(|header: Option<HeaderValue>, state: Arc<State>| async move {
            authenticate(header, &state)
                .await
                .map_err(warp::reject::custom)
        })
}
