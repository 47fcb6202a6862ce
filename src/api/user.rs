use std::sync::Arc;

use serde_json::json;
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection};

use super::{json_body, reply_json, respond};
use crate::{
    accounts::{login_user, register_user, update_profile},
    form::{CredentialsPayload, ProfilePayload, RegisterPayload},
    middleware::{with_session, with_state},
    schema::{User, UserProfile},
    state::State,
};

/// `/user/create`, `/user/token` and `/user/profile`.
pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let create = warp::path!("create")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(create_user);

    let token = warp::path!("token")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(create_token);

    let get_profile = warp::path!("profile")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and_then(show_profile);

    let patch_profile = warp::path!("profile")
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(|user: User, state: Arc<State>, payload: ProfilePayload| {
            edit_profile(user, state, payload, true)
        });

    let put_profile = warp::path!("profile")
        .and(warp::put())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and(json_body())
        .and_then(|user: User, state: Arc<State>, payload: ProfilePayload| {
            edit_profile(user, state, payload, false)
        });

    create
        .or(token)
        .unify()
        .or(get_profile)
        .unify()
        .or(patch_profile)
        .unify()
        .or(put_profile)
        .unify()
        .boxed()
}

async fn create_user(
    state: Arc<State>,
    payload: RegisterPayload,
) -> Result<Response, Rejection> {
    respond(
        register_user(state.store.as_ref(), payload)
            .await
            .map(|user| reply_json(&UserProfile::from(&user), StatusCode::CREATED)),
    )
}

async fn create_token(
    state: Arc<State>,
    payload: CredentialsPayload,
) -> Result<Response, Rejection> {
    respond(
        login_user(state.store.as_ref(), &state.keys, payload)
            .await
            .map(|token| reply_json(&json!({ "token": token }), StatusCode::OK)),
    )
}

async fn show_profile(user: User) -> Result<Response, Rejection> {
    Ok(reply_json(&UserProfile::from(&user), StatusCode::OK))
}

async fn edit_profile(
    user: User,
    state: Arc<State>,
    payload: ProfilePayload,
    partial: bool,
) -> Result<Response, Rejection> {
    respond(
        update_profile(state.store.as_ref(), &user, payload, partial)
            .await
            .map(|user| reply_json(&UserProfile::from(&user), StatusCode::OK)),
    )
}
