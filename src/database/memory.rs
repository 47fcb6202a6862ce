use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    error::Error,
    reconcile::{Association, AssociationPlan},
    schema::{
        Id, ImageReplaced, IngredientQuantity, Label, LabelKind, NewRecipe, NewUser, Recipe,
        RecipeChanges, RecipeDetail, RecipeFilter, User, UserChanges,
    },
    store::{duplicate_email, duplicate_label, Store},
};

#[derive(Debug, Clone)]
struct LabelRow {
    id: Id,
    user_id: Id,
    name: String,
}

#[derive(Debug, Clone)]
struct TagLink {
    id: Id,
    recipe_id: Id,
    tag_id: Id,
}

#[derive(Debug, Clone)]
struct QuantityRow {
    id: Id,
    recipe_id: Id,
    ingredient_id: Id,
    quantity: String,
}

#[derive(Default)]
struct Tables {
    sequence: HashMap<&'static str, Id>,
    users: BTreeMap<Id, User>,
    recipes: BTreeMap<Id, Recipe>,
    labels: HashMap<LabelKind, BTreeMap<Id, LabelRow>>,
    tag_links: Vec<TagLink>,
    quantities: Vec<QuantityRow>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> Id {
        let id = self.sequence.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn labels(&self, kind: LabelKind) -> impl Iterator<Item = &LabelRow> {
        self.labels.get(&kind).into_iter().flat_map(|rows| rows.values())
    }

    fn owned_label(&self, kind: LabelKind, owner: Id, id: Id) -> Option<&LabelRow> {
        self.labels
            .get(&kind)
            .and_then(|rows| rows.get(&id))
            .filter(|row| row.user_id == owner)
    }

    fn label_by_name(&self, kind: LabelKind, owner: Id, name: &str) -> Option<&LabelRow> {
        self.labels(kind)
            .find(|row| row.user_id == owner && row.name == name)
    }

    fn get_or_create_label(&mut self, kind: LabelKind, owner: Id, name: &str) -> (Label, bool) {
        if let Some(row) = self.label_by_name(kind, owner, name) {
            return (
                Label {
                    id: row.id,
                    name: row.name.to_owned(),
                },
                false,
            );
        }

        let id = self.next_id(kind.table());
        self.labels.entry(kind).or_default().insert(
            id,
            LabelRow {
                id,
                user_id: owner,
                name: name.to_owned(),
            },
        );
        (
            Label {
                id,
                name: name.to_owned(),
            },
            true,
        )
    }

    fn is_linked(&self, kind: LabelKind, label_id: Id) -> bool {
        match kind {
            LabelKind::Tag => self.tag_links.iter().any(|link| link.tag_id == label_id),
            LabelKind::Ingredient => self
                .quantities
                .iter()
                .any(|row| row.ingredient_id == label_id),
        }
    }

    fn apply_plan(&mut self, owner: Id, recipe_id: Id, plan: AssociationPlan) {
        if let Association::Replace(names) = plan.tags {
            self.tag_links.retain(|link| link.recipe_id != recipe_id);
            for name in names {
                let (tag, _) = self.get_or_create_label(LabelKind::Tag, owner, &name);
                let attached = self
                    .tag_links
                    .iter()
                    .any(|link| link.recipe_id == recipe_id && link.tag_id == tag.id);
                if !attached {
                    let id = self.next_id(LabelKind::Tag.link_table());
                    self.tag_links.push(TagLink {
                        id,
                        recipe_id,
                        tag_id: tag.id,
                    });
                }
            }
        }

        if let Association::Replace(links) = plan.ingredients {
            self.quantities.retain(|row| row.recipe_id != recipe_id);
            for link in links {
                let (ingredient, _) =
                    self.get_or_create_label(LabelKind::Ingredient, owner, &link.name);
                let attached = self
                    .quantities
                    .iter()
                    .any(|row| row.recipe_id == recipe_id && row.ingredient_id == ingredient.id);
                if !attached {
                    let id = self.next_id(LabelKind::Ingredient.link_table());
                    self.quantities.push(QuantityRow {
                        id,
                        recipe_id,
                        ingredient_id: ingredient.id,
                        quantity: link.quantity,
                    });
                }
            }
        }
    }

    fn label_name(&self, kind: LabelKind, id: Id) -> String {
        self.labels
            .get(&kind)
            .and_then(|rows| rows.get(&id))
            .map(|row| row.name.to_owned())
            .unwrap_or_default()
    }

    fn detail(&self, recipe: &Recipe) -> RecipeDetail {
        let mut tag_links: Vec<&TagLink> = self
            .tag_links
            .iter()
            .filter(|link| link.recipe_id == recipe.id)
            .collect();
        tag_links.sort_by_key(|link| link.id);

        let mut quantities: Vec<&QuantityRow> = self
            .quantities
            .iter()
            .filter(|row| row.recipe_id == recipe.id)
            .collect();
        quantities.sort_by_key(|row| row.id);

        RecipeDetail {
            recipe: recipe.clone(),
            tags: tag_links
                .into_iter()
                .map(|link| Label {
                    id: link.tag_id,
                    name: self.label_name(LabelKind::Tag, link.tag_id),
                })
                .collect(),
            ingredients: quantities
                .into_iter()
                .map(|row| IngredientQuantity {
                    id: row.id,
                    name: self.label_name(LabelKind::Ingredient, row.ingredient_id),
                    quantity: row.quantity.to_owned(),
                })
                .collect(),
        }
    }

    fn owned_recipe(&self, owner: Id, id: Id) -> Option<&Recipe> {
        self.recipes.get(&id).filter(|recipe| recipe.user_id == owner)
    }
}

fn matches_any(filter: &Option<Vec<Id>>, linked: impl Fn(Id) -> bool) -> bool {
    match filter {
        Some(ids) => ids.iter().any(|id| linked(*id)),
        None => true,
    }
}

/// In-process store. Every operation runs under one lock, which is what
/// makes each call atomic and serializes racing get-or-creates.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored labels of `kind` across all users.
    pub async fn label_count(&self, kind: LabelKind) -> usize {
        self.tables.lock().await.labels(kind).count()
    }

    /// Number of ingredient quantity rows across all recipes.
    pub async fn quantity_count(&self) -> usize {
        self.tables.lock().await.quantities.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, Error> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|row| row.email == user.email) {
            return Err(duplicate_email());
        }

        let id = tables.next_id("users");
        let user = User {
            id,
            email: user.email,
            name: user.name,
            password: user.password,
            is_active: true,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|user| user.email == email).cloned())
    }

    async fn update_user(&self, id: Id, changes: UserChanges) -> Result<Option<User>, Error> {
        let mut tables = self.tables.lock().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(password) = changes.password {
            user.password = password;
        }
        Ok(Some(user.clone()))
    }

    async fn list_recipes(
        &self,
        owner: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<RecipeDetail>, Error> {
        let tables = self.tables.lock().await;

        Ok(tables
            .recipes
            .values()
            .rev()
            .filter(|recipe| recipe.user_id == owner)
            .filter(|recipe| {
                matches_any(&filter.tags, |tag_id| {
                    tables
                        .tag_links
                        .iter()
                        .any(|link| link.recipe_id == recipe.id && link.tag_id == tag_id)
                })
            })
            .filter(|recipe| {
                matches_any(&filter.ingredients, |ingredient_id| {
                    tables.quantities.iter().any(|row| {
                        row.recipe_id == recipe.id && row.ingredient_id == ingredient_id
                    })
                })
            })
            .map(|recipe| tables.detail(recipe))
            .collect())
    }

    async fn get_recipe(&self, owner: Id, id: Id) -> Result<Option<RecipeDetail>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .owned_recipe(owner, id)
            .map(|recipe| tables.detail(recipe)))
    }

    async fn create_recipe(
        &self,
        owner: Id,
        recipe: NewRecipe,
        plan: AssociationPlan,
    ) -> Result<RecipeDetail, Error> {
        let mut tables = self.tables.lock().await;

        let id = tables.next_id("recipes");
        let recipe = Recipe {
            id,
            user_id: owner,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            description: recipe.description,
            link: recipe.link,
            image: None,
        };
        tables.recipes.insert(id, recipe.clone());
        tables.apply_plan(owner, id, plan);

        Ok(tables.detail(&recipe))
    }

    async fn update_recipe(
        &self,
        owner: Id,
        id: Id,
        changes: RecipeChanges,
        plan: AssociationPlan,
    ) -> Result<Option<RecipeDetail>, Error> {
        let mut tables = self.tables.lock().await;

        let Some(recipe) = tables
            .recipes
            .get_mut(&id)
            .filter(|recipe| recipe.user_id == owner)
        else {
            return Ok(None);
        };
        changes.apply(recipe);
        let recipe = recipe.clone();

        tables.apply_plan(owner, id, plan);
        Ok(Some(tables.detail(&recipe)))
    }

    async fn delete_recipe(&self, owner: Id, id: Id) -> Result<Option<Recipe>, Error> {
        let mut tables = self.tables.lock().await;
        if tables.owned_recipe(owner, id).is_none() {
            return Ok(None);
        }

        tables.tag_links.retain(|link| link.recipe_id != id);
        tables.quantities.retain(|row| row.recipe_id != id);
        Ok(tables.recipes.remove(&id))
    }

    async fn set_recipe_image(
        &self,
        owner: Id,
        id: Id,
        image: &str,
    ) -> Result<Option<ImageReplaced>, Error> {
        let mut tables = self.tables.lock().await;
        let replaced = tables
            .recipes
            .get_mut(&id)
            .filter(|recipe| recipe.user_id == owner)
            .map(|recipe| ImageReplaced {
                previous: recipe.image.replace(image.to_owned()),
            });
        Ok(replaced)
    }

    async fn list_labels(
        &self,
        kind: LabelKind,
        owner: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, Error> {
        let tables = self.tables.lock().await;

        let mut labels: Vec<Label> = tables
            .labels(kind)
            .filter(|row| row.user_id == owner)
            .filter(|row| !assigned_only || tables.is_linked(kind, row.id))
            .map(|row| Label {
                id: row.id,
                name: row.name.to_owned(),
            })
            .collect();
        labels.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(labels)
    }

    async fn get_label(&self, kind: LabelKind, owner: Id, id: Id) -> Result<Option<Label>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables.owned_label(kind, owner, id).map(|row| Label {
            id: row.id,
            name: row.name.to_owned(),
        }))
    }

    async fn get_or_create_label(
        &self,
        kind: LabelKind,
        owner: Id,
        name: &str,
    ) -> Result<(Label, bool), Error> {
        Ok(self
            .tables
            .lock()
            .await
            .get_or_create_label(kind, owner, name))
    }

    async fn rename_label(
        &self,
        kind: LabelKind,
        owner: Id,
        id: Id,
        name: &str,
    ) -> Result<Option<Label>, Error> {
        let mut tables = self.tables.lock().await;
        if tables.owned_label(kind, owner, id).is_none() {
            return Ok(None);
        }
        if tables
            .label_by_name(kind, owner, name)
            .is_some_and(|row| row.id != id)
        {
            return Err(duplicate_label(kind));
        }

        let row = tables
            .labels
            .get_mut(&kind)
            .and_then(|rows| rows.get_mut(&id));
        Ok(row.map(|row| {
            row.name = name.to_owned();
            Label {
                id: row.id,
                name: row.name.to_owned(),
            }
        }))
    }

    async fn delete_label(&self, kind: LabelKind, owner: Id, id: Id) -> Result<bool, Error> {
        let mut tables = self.tables.lock().await;
        if tables.owned_label(kind, owner, id).is_none() {
            return Ok(false);
        }

        match kind {
            LabelKind::Tag => tables.tag_links.retain(|link| link.tag_id != id),
            LabelKind::Ingredient => tables.quantities.retain(|row| row.ingredient_id != id),
        }
        Ok(tables
            .labels
            .get_mut(&kind)
            .and_then(|rows| rows.remove(&id))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::reconcile::IngredientLink;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_owned(),
            name: String::new(),
            password: "hash".to_owned(),
            is_staff: false,
            is_superuser: false,
        }
    }

    fn new_recipe(title: &str) -> NewRecipe {
        NewRecipe {
            title: title.to_owned(),
            time_minutes: 5,
            price: Decimal::new(550, 2),
            description: String::new(),
            link: String::new(),
        }
    }

    fn tag_plan(names: &[&str]) -> AssociationPlan {
        AssociationPlan {
            tags: Association::Replace(names.iter().map(|n| n.to_string()).collect()),
            ingredients: Association::Keep,
        }
    }

    fn names(labels: &[Label]) -> Vec<&str> {
        labels.iter().map(|label| label.name.as_str()).collect()
    }

    #[tokio::test]
    async fn duplicate_email_is_a_validation_error() {
        let store = MemoryStore::new();
        store.insert_user(new_user("a@example.com")).await.unwrap();

        let err = store
            .insert_user(new_user("a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn existing_tag_is_reused() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@example.com")).await.unwrap();
        let (thai, created) = store
            .get_or_create_label(LabelKind::Tag, user.id, "Thai")
            .await
            .unwrap();
        assert!(created);

        let detail = store
            .create_recipe(user.id, new_recipe("Curry"), tag_plan(&["Thai", "Dinner"]))
            .await
            .unwrap();

        assert_eq!(names(&detail.tags), vec!["Thai", "Dinner"]);
        assert_eq!(detail.tags[0].id, thai.id);
        assert_eq!(store.label_count(LabelKind::Tag).await, 2);
    }

    #[tokio::test]
    async fn labels_are_scoped_per_owner() {
        let store = MemoryStore::new();
        let a = store.insert_user(new_user("a@example.com")).await.unwrap();
        let b = store.insert_user(new_user("b@example.com")).await.unwrap();

        let (for_a, _) = store
            .get_or_create_label(LabelKind::Ingredient, a.id, "Salt")
            .await
            .unwrap();
        let (for_b, created) = store
            .get_or_create_label(LabelKind::Ingredient, b.id, "Salt")
            .await
            .unwrap();

        assert!(created);
        assert_ne!(for_a.id, for_b.id);
        assert_eq!(
            store
                .get_label(LabelKind::Ingredient, b.id, for_a.id)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn keep_plan_leaves_links_alone() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@example.com")).await.unwrap();
        let detail = store
            .create_recipe(user.id, new_recipe("Curry"), tag_plan(&["Thai"]))
            .await
            .unwrap();

        let updated = store
            .update_recipe(
                user.id,
                detail.recipe.id,
                RecipeChanges {
                    title: Some("Green curry".to_owned()),
                    ..RecipeChanges::default()
                },
                AssociationPlan::keep(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.recipe.title, "Green curry");
        assert_eq!(names(&updated.tags), vec!["Thai"]);
    }

    #[tokio::test]
    async fn deleting_recipe_keeps_ingredients() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@example.com")).await.unwrap();
        let plan = AssociationPlan {
            tags: Association::Keep,
            ingredients: Association::Replace(vec![IngredientLink {
                name: "Flour".to_owned(),
                quantity: "200 g".to_owned(),
            }]),
        };
        let detail = store
            .create_recipe(user.id, new_recipe("Roti"), plan)
            .await
            .unwrap();
        assert_eq!(store.quantity_count().await, 1);

        store.delete_recipe(user.id, detail.recipe.id).await.unwrap();

        assert_eq!(store.quantity_count().await, 0);
        assert_eq!(store.label_count(LabelKind::Ingredient).await, 1);
    }

    #[tokio::test]
    async fn rename_to_taken_name_fails() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@example.com")).await.unwrap();
        store
            .get_or_create_label(LabelKind::Tag, user.id, "Vegan")
            .await
            .unwrap();
        let (other, _) = store
            .get_or_create_label(LabelKind::Tag, user.id, "Dessert")
            .await
            .unwrap();

        let err = store
            .rename_label(LabelKind::Tag, user.id, other.id, "Vegan")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let renamed = store
            .rename_label(LabelKind::Tag, user.id, other.id, "Dessert")
            .await
            .unwrap();
        assert_eq!(renamed.map(|label| label.name), Some("Dessert".to_owned()));
    }

    #[tokio::test]
    async fn assigned_only_hides_unlinked_labels() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@example.com")).await.unwrap();
        store
            .get_or_create_label(LabelKind::Tag, user.id, "Unused")
            .await
            .unwrap();
        store
            .create_recipe(user.id, new_recipe("One"), tag_plan(&["Used"]))
            .await
            .unwrap();
        store
            .create_recipe(user.id, new_recipe("Two"), tag_plan(&["Used"]))
            .await
            .unwrap();

        let all = store
            .list_labels(LabelKind::Tag, user.id, false)
            .await
            .unwrap();
        let assigned = store
            .list_labels(LabelKind::Tag, user.id, true)
            .await
            .unwrap();

        assert_eq!(names(&all), vec!["Used", "Unused"]);
        assert_eq!(names(&assigned), vec!["Used"]);
    }

    #[tokio::test]
    async fn recipe_filter_matches_any_label() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@example.com")).await.unwrap();
        let thai = store
            .create_recipe(user.id, new_recipe("Curry"), tag_plan(&["Thai"]))
            .await
            .unwrap();
        store
            .create_recipe(user.id, new_recipe("Toast"), tag_plan(&["Breakfast"]))
            .await
            .unwrap();

        let filter = RecipeFilter {
            tags: Some(vec![thai.tags[0].id]),
            ingredients: None,
        };
        let found = store.list_recipes(user.id, &filter).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].recipe.title, "Curry");
    }
}
