//! Recipe draft validation.
//!
//! Drafts arrive straight from request payloads. Validation turns them into a
//! [`NormalizedRecipe`] that can be written as-is, or reports the first rule
//! the draft breaks. Checks run in a fixed order so the reported error is
//! deterministic: ingredient list presence, tag list presence, tag
//! uniqueness, then every ingredient entry in payload order, then the scalar
//! fields.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    constants::RECIPE_NAME_MAX_LENGTH,
    schema::{Ingredient, Uuid},
    validation::ValidationError,
};

/// Read access to the ingredient reference data.
pub trait IngredientLookup {
    fn find_ingredient(&self, id: Uuid) -> Option<&Ingredient>;
}

impl IngredientLookup for HashMap<Uuid, Ingredient> {
    fn find_ingredient(&self, id: Uuid) -> Option<&Ingredient> {
        self.get(&id)
    }
}

impl IngredientLookup for [Ingredient] {
    fn find_ingredient(&self, id: Uuid) -> Option<&Ingredient> {
        self.iter().find(|ingredient| ingredient.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientEntry {
    pub id: Option<Uuid>,
    pub amount: Option<i32>,
}

impl IngredientEntry {
    pub fn new(id: Uuid, amount: i32) -> Self {
        Self {
            id: Some(id),
            amount: Some(amount),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecipeDraft {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientEntry>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
}

impl RecipeDraft {
    pub fn ingredient_ids(&self) -> Vec<Uuid> {
        self.ingredients.iter().filter_map(|entry| entry.id).collect()
    }
}

impl From<&NormalizedRecipe> for RecipeDraft {
    fn from(recipe: &NormalizedRecipe) -> Self {
        Self {
            name: Some(recipe.name.to_owned()),
            text: Some(recipe.text.to_owned()),
            cooking_time: Some(recipe.cooking_time),
            image: Some(recipe.image.to_owned()),
            ingredients: recipe
                .ingredients
                .iter()
                .map(|line| IngredientEntry::new(line.ingredient.id, line.amount))
                .collect(),
            tags: recipe.tags.to_owned(),
        }
    }
}

/// Partial update of an existing recipe. Absent fields keep their value; a
/// present ingredient or tag list replaces the whole previous list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub ingredients: Option<Vec<IngredientEntry>>,
    pub tags: Option<Vec<Uuid>>,
}

/// Line sets a patch replaces. Sets it leaves out are never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplacedSets {
    pub ingredients: bool,
    pub tags: bool,
}

impl RecipePatch {
    pub fn ingredient_ids(&self) -> Vec<Uuid> {
        self.ingredients
            .iter()
            .flatten()
            .filter_map(|entry| entry.id)
            .collect()
    }

    pub fn replaced_sets(&self) -> ReplacedSets {
        ReplacedSets {
            ingredients: self.ingredients.is_some(),
            tags: self.tags.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeLine {
    pub ingredient: Ingredient,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub ingredients: Vec<RecipeLine>,
    pub tags: Vec<Uuid>,
}

pub fn validate_recipe_draft<L>(
    draft: RecipeDraft,
    lookup: &L,
) -> Result<NormalizedRecipe, ValidationError>
where
    L: IngredientLookup + ?Sized,
{
    if draft.ingredients.is_empty() {
        return Err(ValidationError::EmptyIngredients);
    }
    check_tags(&draft.tags)?;

    let ingredients = normalize_ingredients(&draft.ingredients, lookup)?;

    let name = check_name(required_text(draft.name, "name")?)?;
    let text = required_text(draft.text, "text")?;
    let image = required_text(draft.image, "image")?;
    let cooking_time = draft
        .cooking_time
        .ok_or(ValidationError::MissingField("cooking_time"))?;

    Ok(NormalizedRecipe {
        name,
        text,
        cooking_time: check_cooking_time(cooking_time)?,
        image,
        ingredients,
        tags: draft.tags,
    })
}

pub fn validate_recipe_update<L>(
    existing: &NormalizedRecipe,
    patch: RecipePatch,
    lookup: &L,
) -> Result<NormalizedRecipe, ValidationError>
where
    L: IngredientLookup + ?Sized,
{
    if patch.ingredients.as_ref().is_some_and(|entries| entries.is_empty()) {
        return Err(ValidationError::EmptyIngredients);
    }
    if let Some(tags) = &patch.tags {
        check_tags(tags)?;
    }

    let ingredients = match &patch.ingredients {
        Some(entries) => normalize_ingredients(entries, lookup)?,
        None => existing.ingredients.to_owned(),
    };

    let name = match patch.name {
        Some(name) => check_name(required_text(Some(name), "name")?)?,
        None => existing.name.to_owned(),
    };
    let text = match patch.text {
        Some(text) => required_text(Some(text), "text")?,
        None => existing.text.to_owned(),
    };
    let image = match patch.image {
        Some(image) => required_text(Some(image), "image")?,
        None => existing.image.to_owned(),
    };
    let cooking_time = match patch.cooking_time {
        Some(cooking_time) => check_cooking_time(cooking_time)?,
        None => existing.cooking_time,
    };

    Ok(NormalizedRecipe {
        name,
        text,
        cooking_time,
        image,
        ingredients,
        tags: patch.tags.unwrap_or_else(|| existing.tags.to_owned()),
    })
}

fn check_tags(tags: &[Uuid]) -> Result<(), ValidationError> {
    if tags.is_empty() {
        return Err(ValidationError::EmptyTags);
    }

    let unique: HashSet<&Uuid> = tags.iter().collect();
    if unique.len() != tags.len() {
        return Err(ValidationError::DuplicateTag);
    }

    Ok(())
}

fn normalize_ingredients<L>(
    entries: &[IngredientEntry],
    lookup: &L,
) -> Result<Vec<RecipeLine>, ValidationError>
where
    L: IngredientLookup + ?Sized,
{
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(entries.len());
    let mut lines = Vec::with_capacity(entries.len());

    for entry in entries {
        let (id, amount) = match (entry.id, entry.amount) {
            (Some(id), Some(amount)) => (id, amount),
            (None, _) => return Err(ValidationError::MissingField("id")),
            (Some(_), None) => return Err(ValidationError::MissingField("amount")),
        };

        if !seen.insert(id) {
            return Err(ValidationError::DuplicateIngredient(id));
        }
        if amount < 1 {
            return Err(ValidationError::InvalidAmount(id));
        }

        let ingredient = lookup
            .find_ingredient(id)
            .ok_or(ValidationError::IngredientNotFound(id))?;

        lines.push(RecipeLine {
            ingredient: ingredient.to_owned(),
            amount,
        });
    }

    Ok(lines)
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn check_name(name: String) -> Result<String, ValidationError> {
    if name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        return Err(ValidationError::TooLong("name", RECIPE_NAME_MAX_LENGTH));
    }
    Ok(name)
}

fn check_cooking_time(cooking_time: i32) -> Result<i32, ValidationError> {
    if cooking_time < 1 {
        return Err(ValidationError::InvalidCookingTime);
    }
    Ok(cooking_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(id: Uuid, name: &str, unit: &str) -> Ingredient {
        Ingredient {
            id,
            name: name.to_owned(),
            measurement_unit: unit.to_owned(),
        }
    }

    fn pantry() -> HashMap<Uuid, Ingredient> {
        [
            ingredient(10, "Salt", "g"),
            ingredient(11, "Egg", "pcs"),
            ingredient(12, "Milk", "ml"),
        ]
        .into_iter()
        .map(|ingredient| (ingredient.id, ingredient))
        .collect()
    }

    fn draft(ingredients: Vec<IngredientEntry>, tags: Vec<Uuid>) -> RecipeDraft {
        RecipeDraft {
            name: Some("Omelette".to_owned()),
            text: Some("Whisk and fry.".to_owned()),
            cooking_time: Some(10),
            image: Some("recipes/images/omelette.png".to_owned()),
            ingredients,
            tags,
        }
    }

    fn omelette() -> NormalizedRecipe {
        validate_recipe_draft(
            draft(
                vec![IngredientEntry::new(11, 3), IngredientEntry::new(12, 50)],
                vec![1, 2],
            ),
            &pantry(),
        )
        .expect("valid draft")
    }

    #[test]
    fn normalizes_a_valid_draft() {
        let recipe = omelette();

        assert_eq!(recipe.name, "Omelette");
        assert_eq!(recipe.cooking_time, 10);
        assert_eq!(recipe.tags, vec![1, 2]);
        assert_eq!(
            recipe
                .ingredients
                .iter()
                .map(|line| (line.ingredient.name.as_str(), line.amount))
                .collect::<Vec<_>>(),
            vec![("Egg", 3), ("Milk", 50)]
        );
    }

    #[test]
    fn empty_ingredients_win_over_everything_else() {
        let mut payload = draft(vec![], vec![]);
        payload.name = None;
        payload.cooking_time = Some(0);

        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::EmptyIngredients)
        );
    }

    #[test]
    fn empty_tags_are_rejected() {
        let payload = draft(vec![IngredientEntry::new(10, 1)], vec![]);

        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::EmptyTags)
        );
    }

    #[test]
    fn repeated_tags_are_rejected_even_with_valid_ingredients() {
        let payload = draft(vec![IngredientEntry::new(10, 1)], vec![1, 2, 1]);

        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::DuplicateTag)
        );
    }

    #[test]
    fn tags_are_checked_before_ingredient_entries() {
        let payload = draft(vec![IngredientEntry::new(99, 0)], vec![3, 3]);

        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::DuplicateTag)
        );
    }

    #[test]
    fn missing_entry_fields_are_reported() {
        let payload = draft(
            vec![IngredientEntry {
                id: Some(10),
                amount: None,
            }],
            vec![1],
        );
        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::MissingField("amount"))
        );

        let payload = draft(
            vec![IngredientEntry {
                id: None,
                amount: Some(2),
            }],
            vec![1],
        );
        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::MissingField("id"))
        );
    }

    #[test]
    fn duplicate_is_reported_before_the_amount_of_the_repeat() {
        let payload = draft(
            vec![IngredientEntry::new(10, 2), IngredientEntry::new(10, 3)],
            vec![1, 2],
        );

        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::DuplicateIngredient(10))
        );

        let payload = draft(
            vec![IngredientEntry::new(10, 2), IngredientEntry::new(10, 0)],
            vec![1, 2],
        );
        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::DuplicateIngredient(10))
        );
    }

    #[test]
    fn amount_below_one_names_the_failing_entry() {
        let payload = draft(
            vec![
                IngredientEntry::new(10, 5),
                IngredientEntry::new(11, 1),
                IngredientEntry::new(12, 0),
            ],
            vec![1],
        );

        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::InvalidAmount(12))
        );
    }

    #[test]
    fn invalid_amount_outranks_unknown_ingredient() {
        let payload = draft(vec![IngredientEntry::new(404, -1)], vec![1]);

        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::InvalidAmount(404))
        );
    }

    #[test]
    fn unknown_ingredients_are_rejected() {
        let payload = draft(
            vec![IngredientEntry::new(10, 1), IngredientEntry::new(404, 1)],
            vec![1],
        );

        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::IngredientNotFound(404))
        );
    }

    #[test]
    fn scalar_fields_are_checked_after_ingredients() {
        let mut payload = draft(vec![IngredientEntry::new(10, 1)], vec![1]);
        payload.text = Some("   ".to_owned());
        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::MissingField("text"))
        );

        let mut payload = draft(vec![IngredientEntry::new(10, 1)], vec![1]);
        payload.image = None;
        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::MissingField("image"))
        );

        let mut payload = draft(vec![IngredientEntry::new(10, 1)], vec![1]);
        payload.name = Some("x".repeat(RECIPE_NAME_MAX_LENGTH + 1));
        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::TooLong("name", RECIPE_NAME_MAX_LENGTH))
        );

        let mut payload = draft(vec![IngredientEntry::new(10, 1)], vec![1]);
        payload.cooking_time = Some(0);
        assert_eq!(
            validate_recipe_draft(payload, &pantry()),
            Err(ValidationError::InvalidCookingTime)
        );
    }

    #[test]
    fn revalidating_a_normalized_recipe_is_a_no_op() {
        let recipe = omelette();

        let again = validate_recipe_draft(RecipeDraft::from(&recipe), &pantry());

        assert_eq!(again, Ok(recipe));
    }

    #[test]
    fn slices_work_as_lookups() {
        let pantry = vec![ingredient(10, "Salt", "g")];
        let payload = draft(vec![IngredientEntry::new(10, 4)], vec![1]);

        let recipe = validate_recipe_draft(payload, pantry.as_slice()).expect("valid draft");

        assert_eq!(recipe.ingredients[0].ingredient.name, "Salt");
    }

    #[test]
    fn empty_patch_keeps_everything() {
        let existing = omelette();

        let updated = validate_recipe_update(&existing, RecipePatch::default(), &pantry());

        assert_eq!(updated, Ok(existing));
    }

    #[test]
    fn patch_replaces_whole_sets() {
        let existing = omelette();
        let patch = RecipePatch {
            ingredients: Some(vec![IngredientEntry::new(10, 7)]),
            tags: Some(vec![3]),
            ..Default::default()
        };

        let updated = validate_recipe_update(&existing, patch, &pantry()).expect("valid patch");

        assert_eq!(updated.tags, vec![3]);
        assert_eq!(updated.ingredients.len(), 1);
        assert_eq!(updated.ingredients[0].ingredient.id, 10);
        assert_eq!(updated.ingredients[0].amount, 7);
        assert_eq!(updated.name, existing.name);
    }

    #[test]
    fn patch_scalars_default_to_previous_values() {
        let existing = omelette();
        let patch = RecipePatch {
            name: Some("Fluffy omelette".to_owned()),
            ..Default::default()
        };

        let updated = validate_recipe_update(&existing, patch, &pantry()).expect("valid patch");

        assert_eq!(updated.name, "Fluffy omelette");
        assert_eq!(updated.text, existing.text);
        assert_eq!(updated.cooking_time, existing.cooking_time);
        assert_eq!(updated.ingredients, existing.ingredients);
        assert_eq!(updated.tags, existing.tags);
    }

    #[test]
    fn patches_replace_only_the_sets_they_carry() {
        let tags_only: RecipePatch =
            serde_json::from_str(r#"{"tags": [3], "name": "Tea"}"#).expect("valid json");
        let ingredients_only: RecipePatch =
            serde_json::from_str(r#"{"ingredients": [{"id": 10, "amount": 1}]}"#)
                .expect("valid json");

        assert_eq!(
            tags_only.replaced_sets(),
            ReplacedSets {
                ingredients: false,
                tags: true
            }
        );
        assert_eq!(
            ingredients_only.replaced_sets(),
            ReplacedSets {
                ingredients: true,
                tags: false
            }
        );
        assert_eq!(RecipePatch::default().replaced_sets(), ReplacedSets::default());
    }

    #[test]
    fn patch_sets_follow_draft_rules() {
        let existing = omelette();

        let patch = RecipePatch {
            ingredients: Some(vec![]),
            tags: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(
            validate_recipe_update(&existing, patch, &pantry()),
            Err(ValidationError::EmptyIngredients)
        );

        let patch = RecipePatch {
            tags: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(
            validate_recipe_update(&existing, patch, &pantry()),
            Err(ValidationError::EmptyTags)
        );

        let patch = RecipePatch {
            ingredients: Some(vec![IngredientEntry::new(11, 1), IngredientEntry::new(11, 2)]),
            ..Default::default()
        };
        assert_eq!(
            validate_recipe_update(&existing, patch, &pantry()),
            Err(ValidationError::DuplicateIngredient(11))
        );

        let patch = RecipePatch {
            cooking_time: Some(-5),
            ..Default::default()
        };
        assert_eq!(
            validate_recipe_update(&existing, patch, &pantry()),
            Err(ValidationError::InvalidCookingTime)
        );
    }

    #[test]
    fn drafts_deserialize_from_payloads() {
        let payload = r#"{
            "name": "Tea",
            "text": "Boil water.",
            "cooking_time": 5,
            "image": "recipes/images/tea.png",
            "tags": [1],
            "ingredients": [{"id": 12, "amount": 200}, {"id": 10}]
        }"#;

        let draft: RecipeDraft = serde_json::from_str(payload).expect("valid json");

        assert_eq!(draft.ingredient_ids(), vec![12, 10]);
        assert_eq!(
            validate_recipe_draft(draft, &pantry()),
            Err(ValidationError::MissingField("amount"))
        );
    }
}
