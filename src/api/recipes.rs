use std::{pin::pin, sync::Arc};

use futures::TryStreamExt;
use serde::Deserialize;
use warp::{
    filters::{multipart::FormData, BoxedFilter},
    http::StatusCode,
    hyper::body::Buf,
    reply::Response,
    Filter, Rejection,
};

use super::{json_body, no_content, reply_json, respond};
use crate::{
    error::Error,
    form::RecipePayload,
    middleware::{with_session, with_state},
    schema::{media_url, Id, RecipeFilter, RecipeImage, RecipeRow, RecipeView, User},
    state::State,
};

const IMAGE_FIELD: &str = "image";

#[derive(Deserialize, Debug, Default)]
pub struct RecipeQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

impl RecipeQuery {
    pub fn into_filter(self) -> Result<RecipeFilter, Error> {
        Ok(RecipeFilter {
            tags: parse_ids("tags", self.tags)?,
            ingredients: parse_ids("ingredients", self.ingredients)?,
        })
    }
}

/// Parses a comma separated id list such as `1,2,3`. An empty value means
/// no filter.
fn parse_ids(field: &str, raw: Option<String>) -> Result<Option<Vec<Id>>, Error> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(None);
    };

    raw.split(',')
        .map(|id| id.trim().parse::<Id>())
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
        .map_err(|_| Error::invalid(field, "Enter a comma separated list of ids."))
}

/// `/recipes`, `/recipes/{id}` and `/recipes/{id}/upload-image`.
pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(warp::query::<RecipeQuery>())
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(create_recipe);

    let retrieve = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(retrieve_recipe);

    let patch = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(
            |id: Id, user: User, state: Arc<State>, payload: RecipePayload| {
                update_recipe(id, user, state, payload, true)
            },
        );

    let put = warp::path!("recipes" / Id)
        .and(warp::put())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(
            |id: Id, user: User, state: Arc<State>, payload: RecipePayload| {
                update_recipe(id, user, state, payload, false)
            },
        );

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_recipe);

    let upload = warp::path!("recipes" / Id / "upload-image")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(warp::multipart::form().max_length(state.max_upload_bytes))
        .and(with_state(state))
        .and_then(upload_image);

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
        .or(upload)
        .unify()
        .boxed()
}

async fn list_recipes(
    user: User,
    state: Arc<State>,
    query: RecipeQuery,
) -> Result<Response, Rejection> {
    let result = async move {
        let filter = query.into_filter()?;
        let recipes = state.store.list_recipes(user.id, &filter).await?;
        let rows: Vec<RecipeRow> = recipes.iter().map(RecipeRow::from).collect();
        Ok::<_, Error>(reply_json(&rows, StatusCode::OK))
    };
    respond(result.await)
}

async fn create_recipe(
    user: User,
    state: Arc<State>,
    payload: RecipePayload,
) -> Result<Response, Rejection> {
    let result = async move {
        let (recipe, plan) = payload.into_new_recipe()?;
        let detail = state.store.create_recipe(user.id, recipe, plan).await?;
        log::info!("User {} created recipe {}", user.id, detail.recipe.id);
        Ok::<_, Error>(reply_json(&RecipeView::from(&detail), StatusCode::CREATED))
    };
    respond(result.await)
}

async fn retrieve_recipe(id: Id, user: User, state: Arc<State>) -> Result<Response, Rejection> {
    let result = async move {
        let detail = state
            .store
            .get_recipe(user.id, id)
            .await?
            .ok_or(Error::NotFound)?;
        Ok::<_, Error>(reply_json(&RecipeView::from(&detail), StatusCode::OK))
    };
    respond(result.await)
}

async fn update_recipe(
    id: Id,
    user: User,
    state: Arc<State>,
    payload: RecipePayload,
    partial: bool,
) -> Result<Response, Rejection> {
    let result = async move {
        let (changes, plan) = payload.into_changes(partial)?;
        let detail = state
            .store
            .update_recipe(user.id, id, changes, plan)
            .await?
            .ok_or(Error::NotFound)?;
        Ok::<_, Error>(reply_json(&RecipeView::from(&detail), StatusCode::OK))
    };
    respond(result.await)
}

async fn delete_recipe(id: Id, user: User, state: Arc<State>) -> Result<Response, Rejection> {
    let result = async move {
        let recipe = state
            .store
            .delete_recipe(user.id, id)
            .await?
            .ok_or(Error::NotFound)?;
        if let Some(image) = &recipe.image {
            state.media.discard(image).await;
        }
        log::info!("User {} deleted recipe {id}", user.id);
        Ok::<_, Error>(no_content())
    };
    respond(result.await)
}

/// Returns the bytes of the first `image` part, if the form has one.
async fn read_image(form: FormData) -> Result<Option<Vec<u8>>, Error> {
    let unreadable = |e: warp::Error| {
        log::debug!("Failed to read multipart body: {e}");
        Error::invalid(
            IMAGE_FIELD,
            "The submitted data was not a file. Check the encoding type on the form.",
        )
    };

    let mut form = pin!(form);
    while let Some(mut part) = form.try_next().await.map_err(unreadable)? {
        if part.name() != IMAGE_FIELD {
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = part.data().await {
            let mut chunk = chunk.map_err(unreadable)?;
            bytes.extend_from_slice(&chunk.copy_to_bytes(chunk.remaining()));
        }
        return Ok(Some(bytes));
    }
    Ok(None)
}

async fn upload_image(
    id: Id,
    user: User,
    form: FormData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let result = async move {
        let Some(bytes) = read_image(form).await? else {
            return Err(Error::invalid(IMAGE_FIELD, "No file was submitted."));
        };
        if bytes.is_empty() {
            return Err(Error::invalid(IMAGE_FIELD, "The submitted file is empty."));
        }

        let path = state.media.save_recipe_image(bytes).await?;
        let replaced = match state.store.set_recipe_image(user.id, id, &path).await {
            Ok(Some(replaced)) => replaced,
            Ok(None) => {
                state.media.discard(&path).await;
                return Err(Error::NotFound);
            }
            Err(e) => {
                state.media.discard(&path).await;
                return Err(e);
            }
        };
        if let Some(previous) = &replaced.previous {
            state.media.discard(previous).await;
        }

        let image = RecipeImage {
            id,
            image: media_url(&Some(path)),
        };
        Ok::<_, Error>(reply_json(&image, StatusCode::OK))
    };
    respond(result.await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_are_comma_separated() {
        assert_eq!(
            parse_ids("tags", Some("1, 2,3".to_owned())).unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(parse_ids("tags", Some(String::new())).unwrap(), None);
        assert_eq!(parse_ids("tags", None).unwrap(), None);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let Err(Error::Validation(errors)) = parse_ids("ingredients", Some("1,x".to_owned()))
        else {
            panic!("expected validation error");
        };
        assert!(errors.get("ingredients").is_some());
    }
}
