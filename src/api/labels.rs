use std::sync::Arc;

use serde::Deserialize;
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection};

use super::{json_body, no_content, reply_json, respond};
use crate::{
    error::{Error, FieldErrors},
    form::{check_text, required, LabelPayload},
    middleware::{with_session, with_state},
    schema::{Id, LabelKind, User},
    state::State,
};

#[derive(Deserialize, Debug, Default)]
pub struct LabelQuery {
    pub assigned_only: Option<String>,
}

impl LabelQuery {
    /// `assigned_only` is an integer flag; anything but `0` enables it.
    pub fn assigned_only(&self) -> Result<bool, Error> {
        match self.assigned_only.as_deref().map(str::trim) {
            None | Some("") => Ok(false),
            Some(flag) => flag
                .parse::<i64>()
                .map(|flag| flag != 0)
                .map_err(|_| Error::invalid("assigned_only", "A valid integer is required.")),
        }
    }
}

/// Collection and detail routes for one label kind, e.g. `/tags` and
/// `/tags/{id}`.
pub fn routes(kind: LabelKind, state: Arc<State>) -> BoxedFilter<(Response,)> {
    let collection = move || warp::path(kind.table()).and(warp::path::end());
    let item = move || {
        warp::path(kind.table())
            .and(warp::path::param::<Id>())
            .and(warp::path::end())
    };

    let list = collection()
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(warp::query::<LabelQuery>())
        .and_then(move |user: User, state: Arc<State>, query: LabelQuery| {
            list_labels(kind, user, state, query)
        });

    let create = collection()
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(move |user: User, state: Arc<State>, payload: LabelPayload| {
            create_label(kind, user, state, payload)
        });

    let retrieve = item()
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(move |id: Id, user: User, state: Arc<State>| {
            retrieve_label(kind, id, user, state)
        });

    let patch = item()
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(
            move |id: Id, user: User, state: Arc<State>, payload: LabelPayload| {
                update_label(kind, id, user, state, payload, true)
            },
        );

    let put = item()
        .and(warp::put())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(
            move |id: Id, user: User, state: Arc<State>, payload: LabelPayload| {
                update_label(kind, id, user, state, payload, false)
            },
        );

    let delete = item()
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(move |id: Id, user: User, state: Arc<State>| {
            delete_label(kind, id, user, state)
        });

    list.or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(patch)
        .unify()
        .or(put)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

fn label_name(name: Option<String>) -> Result<String, Error> {
    let mut errors = FieldErrors::default();
    let name = required("name", name, &mut errors);
    let name = if errors.is_empty() {
        check_text("name", name, false, &mut errors)
    } else {
        name
    };
    errors.into_result(name)
}

async fn list_labels(
    kind: LabelKind,
    user: User,
    state: Arc<State>,
    query: LabelQuery,
) -> Result<Response, Rejection> {
    let result = async move {
        let assigned_only = query.assigned_only()?;
        let labels = state.store.list_labels(kind, user.id, assigned_only).await?;
        Ok::<_, Error>(reply_json(&labels, StatusCode::OK))
    };
    respond(result.await)
}

/// Get-or-create: posting a name the user already has returns that label.
async fn create_label(
    kind: LabelKind,
    user: User,
    state: Arc<State>,
    payload: LabelPayload,
) -> Result<Response, Rejection> {
    let result = async move {
        let name = label_name(payload.name)?;
        let (label, created) = state
            .store
            .get_or_create_label(kind, user.id, &name)
            .await?;

        let status = if created {
            log::info!("Created {} {:?} for user {}", kind.noun(), label.name, user.id);
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        Ok::<_, Error>(reply_json(&label, status))
    };
    respond(result.await)
}

async fn retrieve_label(
    kind: LabelKind,
    id: Id,
    user: User,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let result = async move {
        let label = state
            .store
            .get_label(kind, user.id, id)
            .await?
            .ok_or(Error::NotFound)?;
        Ok::<_, Error>(reply_json(&label, StatusCode::OK))
    };
    respond(result.await)
}

async fn update_label(
    kind: LabelKind,
    id: Id,
    user: User,
    state: Arc<State>,
    payload: LabelPayload,
    partial: bool,
) -> Result<Response, Rejection> {
    let result = async move {
        let label = match payload.name {
            None if partial => state.store.get_label(kind, user.id, id).await?,
            name => {
                let name = label_name(name)?;
                state.store.rename_label(kind, user.id, id, &name).await?
            }
        };

        let label = label.ok_or(Error::NotFound)?;
        Ok::<_, Error>(reply_json(&label, StatusCode::OK))
    };
    respond(result.await)
}

async fn delete_label(
    kind: LabelKind,
    id: Id,
    user: User,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let result = async move {
        if !state.store.delete_label(kind, user.id, id).await? {
            return Err(Error::NotFound);
        }
        log::info!("Deleted {} {id} of user {}", kind.noun(), user.id);
        Ok::<_, Error>(no_content())
    };
    respond(result.await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(flag: Option<&str>) -> LabelQuery {
        LabelQuery {
            assigned_only: flag.map(str::to_owned),
        }
    }

    #[test]
    fn assigned_only_flag() {
        assert!(!query(None).assigned_only().unwrap());
        assert!(!query(Some("0")).assigned_only().unwrap());
        assert!(query(Some("1")).assigned_only().unwrap());
        assert!(query(Some("yes")).assigned_only().is_err());
    }

    #[test]
    fn label_names_are_required_and_trimmed() {
        assert_eq!(label_name(Some(" Vegan ".to_owned())).unwrap(), "Vegan");
        assert!(label_name(None).is_err());
        assert!(label_name(Some("   ".to_owned())).is_err());
    }
}
