use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgConnection, Pool, Postgres};

use super::{
    actions::{labels, recipes, users},
    error::{Error, QueryError},
    reconcile::{Association, AssociationPlan},
    schema::{
        Id, ImageReplaced, Label, LabelKind, NewRecipe, NewUser, Recipe, RecipeChanges,
        RecipeDetail, RecipeFilter, User, UserChanges,
    },
    store::{duplicate_email, duplicate_label, Store},
};

pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!("Database migrations applied");

        Ok(Self::new(pool))
    }
}

async fn apply_plan(
    owner: Id,
    recipe_id: Id,
    plan: AssociationPlan,
    conn: &mut PgConnection,
) -> Result<(), QueryError> {
    if let Association::Replace(names) = plan.tags {
        labels::clear_recipe_links(LabelKind::Tag, recipe_id, &mut *conn).await?;
        for name in names {
            let (tag, _) =
                labels::get_or_create_label(LabelKind::Tag, owner, &name, &mut *conn).await?;
            labels::add_tag_to_recipe(recipe_id, tag.id, &mut *conn).await?;
        }
    }

    if let Association::Replace(links) = plan.ingredients {
        labels::clear_recipe_links(LabelKind::Ingredient, recipe_id, &mut *conn).await?;
        for link in links {
            let (ingredient, _) =
                labels::get_or_create_label(LabelKind::Ingredient, owner, &link.name, &mut *conn)
                    .await?;
            labels::add_ingredient_to_recipe(recipe_id, ingredient.id, &link.quantity, &mut *conn)
                .await?;
        }
    }

    Ok(())
}

async fn load_detail(recipe: Recipe, conn: &mut PgConnection) -> Result<RecipeDetail, QueryError> {
    let mut details = recipes::load_details(vec![recipe], conn).await?;
    details
        .pop()
        .ok_or_else(|| QueryError::new("Recipe vanished while loading".to_owned()))
}

#[async_trait]
impl Store for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, Error> {
        match users::register_user(&user, &self.pool).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(duplicate_email()),
            Err(e) if e.is_unique_violation() => Err(duplicate_email()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        Ok(users::get_user_by_id(&self.pool, id).await?)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(users::get_user_by_email(&self.pool, email).await?)
    }

    async fn update_user(&self, id: Id, changes: UserChanges) -> Result<Option<User>, Error> {
        Ok(users::update_user(id, &changes, &self.pool).await?)
    }

    async fn list_recipes(
        &self,
        owner: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<RecipeDetail>, Error> {
        let rows = recipes::fetch_recipes(owner, filter, &self.pool).await?;
        let mut conn = self.pool.acquire().await?;
        Ok(recipes::load_details(rows, &mut *conn).await?)
    }

    async fn get_recipe(&self, owner: Id, id: Id) -> Result<Option<RecipeDetail>, Error> {
        let mut conn = self.pool.acquire().await?;
        match recipes::get_recipe(owner, id, &mut *conn).await? {
            Some(recipe) => Ok(Some(load_detail(recipe, &mut *conn).await?)),
            None => Ok(None),
        }
    }

    async fn create_recipe(
        &self,
        owner: Id,
        recipe: NewRecipe,
        plan: AssociationPlan,
    ) -> Result<RecipeDetail, Error> {
        let mut tr = self.pool.begin().await?;

        let recipe = recipes::create_recipe(owner, &recipe, &mut *tr).await?;
        apply_plan(owner, recipe.id, plan, &mut *tr).await?;
        let detail = load_detail(recipe, &mut *tr).await?;

        tr.commit().await?;
        Ok(detail)
    }

    async fn update_recipe(
        &self,
        owner: Id,
        id: Id,
        changes: RecipeChanges,
        plan: AssociationPlan,
    ) -> Result<Option<RecipeDetail>, Error> {
        let mut tr = self.pool.begin().await?;

        let Some(recipe) = recipes::update_recipe_info(owner, id, &changes, &mut *tr).await? else {
            return Ok(None);
        };
        apply_plan(owner, recipe.id, plan, &mut *tr).await?;
        let detail = load_detail(recipe, &mut *tr).await?;

        tr.commit().await?;
        Ok(Some(detail))
    }

    async fn delete_recipe(&self, owner: Id, id: Id) -> Result<Option<Recipe>, Error> {
        Ok(recipes::delete_recipe(owner, id, &self.pool).await?)
    }

    async fn set_recipe_image(
        &self,
        owner: Id,
        id: Id,
        image: &str,
    ) -> Result<Option<ImageReplaced>, Error> {
        let mut tr = self.pool.begin().await?;

        let Some(previous) = recipes::lock_recipe_image(owner, id, &mut *tr).await? else {
            return Ok(None);
        };
        recipes::set_recipe_image(id, image, &mut *tr).await?;

        tr.commit().await?;
        Ok(Some(ImageReplaced { previous }))
    }

    async fn list_labels(
        &self,
        kind: LabelKind,
        owner: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, Error> {
        Ok(labels::list_labels(kind, owner, assigned_only, &self.pool).await?)
    }

    async fn get_label(&self, kind: LabelKind, owner: Id, id: Id) -> Result<Option<Label>, Error> {
        Ok(labels::get_label(kind, owner, id, &self.pool).await?)
    }

    async fn get_or_create_label(
        &self,
        kind: LabelKind,
        owner: Id,
        name: &str,
    ) -> Result<(Label, bool), Error> {
        let mut conn = self.pool.acquire().await?;
        Ok(labels::get_or_create_label(kind, owner, name, &mut *conn).await?)
    }

    async fn rename_label(
        &self,
        kind: LabelKind,
        owner: Id,
        id: Id,
        name: &str,
    ) -> Result<Option<Label>, Error> {
        match labels::rename_label(kind, owner, id, name, &self.pool).await {
            Err(e) if e.is_unique_violation() => Err(duplicate_label(kind)),
            result => Ok(result?),
        }
    }

    async fn delete_label(&self, kind: LabelKind, owner: Id, id: Id) -> Result<bool, Error> {
        Ok(labels::delete_label(kind, owner, id, &self.pool).await?)
    }
}
