use std::collections::HashSet;

use serde::Deserialize;

use crate::{
    constants::{MAX_COOKING_TIME, MAX_RECIPE_NAME_LENGTH, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT},
    error::ValidationError,
    media::{decode_data_uri, DecodedImage},
    schema::Id,
};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IngredientAmount {
    pub ingredient_id: Id,
    pub amount: i32,
}

/// Payload of a recipe create request. Every field is required.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmount>,
}

/// Payload of a recipe update. Fields left as `None` keep their stored value;
/// supplied `tags` / `ingredients` replace the whole association set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
}

impl RecipeDraft {
    /// Runs the whole validation pipeline in request order: image payload,
    /// name, cooking time, tags, ingredients. Nothing is persisted before
    /// this returns `Ok`.
    pub fn validate(&self) -> Result<DecodedImage, ValidationError> {
        let image = decode_data_uri(&self.image)?;
        validate_name(&self.name)?;
        validate_cooking_time(self.cooking_time)?;
        validate_tags(&self.tags)?;
        validate_ingredients(&self.ingredients)?;
        Ok(image)
    }
}

impl RecipePatch {
    /// Same rules as the create pipeline, applied only to supplied fields.
    pub fn validate(&self) -> Result<Option<DecodedImage>, ValidationError> {
        let image = match &self.image {
            Some(payload) => Some(decode_data_uri(payload)?),
            None => None,
        };
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(cooking_time) = self.cooking_time {
            validate_cooking_time(cooking_time)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        if let Some(ingredients) = &self.ingredients {
            validate_ingredients(ingredients)?;
        }
        Ok(image)
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() || name.chars().count() > MAX_RECIPE_NAME_LENGTH {
        return Err(ValidationError::InvalidName);
    }
    Ok(())
}

pub fn validate_cooking_time(cooking_time: i32) -> Result<(), ValidationError> {
    if !(MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&cooking_time) {
        return Err(ValidationError::InvalidCookingTime);
    }
    Ok(())
}

pub fn validate_tags(tags: &[Id]) -> Result<(), ValidationError> {
    if tags.is_empty() {
        return Err(ValidationError::MissingTags);
    }
    let mut seen = HashSet::new();
    if !tags.iter().all(|id| seen.insert(id)) {
        return Err(ValidationError::DuplicateTags);
    }
    Ok(())
}

pub fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), ValidationError> {
    if ingredients.is_empty() {
        return Err(ValidationError::MissingIngredients);
    }
    let mut seen = HashSet::new();
    if !ingredients.iter().all(|line| seen.insert(line.ingredient_id)) {
        return Err(ValidationError::DuplicateIngredients);
    }
    if ingredients
        .iter()
        .any(|line| line.amount < MIN_INGREDIENT_AMOUNT)
    {
        return Err(ValidationError::InvalidAmount);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RecipeDraft {
        RecipeDraft {
            name: String::from("Pancakes"),
            text: String::from("Mix and fry."),
            cooking_time: 20,
            image: String::from("data:image/png;base64,ZGF0YQ=="),
            tags: vec![1, 2],
            ingredients: vec![
                IngredientAmount {
                    ingredient_id: 1,
                    amount: 200,
                },
                IngredientAmount {
                    ingredient_id: 2,
                    amount: 100,
                },
            ],
        }
    }

    #[test]
    fn accepts_well_formed_draft() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn image_is_checked_before_anything_else() {
        let mut draft = draft();
        draft.image = String::from("not-a-data-uri");
        draft.cooking_time = 0;
        draft.tags.clear();
        assert_eq!(
            draft.validate(),
            Err(ValidationError::InvalidImageEncoding)
        );
    }

    #[test]
    fn rejects_blank_and_overlong_names() {
        let mut draft = draft();
        draft.name = String::from("   ");
        assert_eq!(draft.validate(), Err(ValidationError::InvalidName));
        draft.name = "x".repeat(257);
        assert_eq!(draft.validate(), Err(ValidationError::InvalidName));
        draft.name = "x".repeat(256);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn rejects_cooking_time_outside_bounds() {
        let mut draft = draft();
        draft.cooking_time = 0;
        assert_eq!(draft.validate(), Err(ValidationError::InvalidCookingTime));
        draft.cooking_time = 32001;
        assert_eq!(draft.validate(), Err(ValidationError::InvalidCookingTime));
        draft.cooking_time = 32000;
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn rejects_missing_and_duplicate_tags() {
        let mut draft = draft();
        draft.tags.clear();
        assert_eq!(draft.validate(), Err(ValidationError::MissingTags));
        draft.tags = vec![3, 3];
        assert_eq!(draft.validate(), Err(ValidationError::DuplicateTags));
    }

    #[test]
    fn rejects_missing_and_duplicate_ingredients() {
        let mut draft = draft();
        draft.ingredients.clear();
        assert_eq!(draft.validate(), Err(ValidationError::MissingIngredients));
        draft.ingredients = vec![
            IngredientAmount {
                ingredient_id: 7,
                amount: 1,
            },
            IngredientAmount {
                ingredient_id: 7,
                amount: 2,
            },
        ];
        assert_eq!(
            draft.validate(),
            Err(ValidationError::DuplicateIngredients)
        );
    }

    #[test]
    fn rejects_non_positive_amount() {
        let mut draft = draft();
        draft.ingredients[1].amount = 0;
        assert_eq!(draft.validate(), Err(ValidationError::InvalidAmount));
    }

    #[test]
    fn empty_patch_is_valid() {
        assert!(RecipePatch::default().validate().is_ok());
    }

    #[test]
    fn patch_validates_only_supplied_fields() {
        let patch = RecipePatch {
            cooking_time: Some(15),
            ..RecipePatch::default()
        };
        assert!(patch.validate().is_ok());

        let patch = RecipePatch {
            ingredients: Some(vec![]),
            ..RecipePatch::default()
        };
        assert_eq!(
            patch.validate(),
            Err(ValidationError::MissingIngredients)
        );
    }
}
