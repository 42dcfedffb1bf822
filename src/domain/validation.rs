use thiserror::Error;

use crate::schema::{CartKind, Uuid};

/// Caller-facing violations of the recipe, cart and subscription rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Recipe must contain at least one ingredient")]
    EmptyIngredients,

    #[error("Recipe must contain at least one tag")]
    EmptyTags,

    #[error("Tags must not repeat")]
    DuplicateTag,

    #[error("Field `{0}` is required")]
    MissingField(&'static str),

    #[error("Ingredient {0} is listed twice")]
    DuplicateIngredient(Uuid),

    #[error("Amount of ingredient {0} must be at least 1")]
    InvalidAmount(Uuid),

    #[error("Ingredient {0} not found")]
    IngredientNotFound(Uuid),

    #[error("Tag {0} not found")]
    TagNotFound(Uuid),

    #[error("Field `{0}` must be at most {1} characters long")]
    TooLong(&'static str, usize),

    #[error("Cooking time must be at least 1 minute")]
    InvalidCookingTime,

    #[error("Shopping list is empty")]
    EmptyCart,

    #[error("Recipe is already in {0}")]
    AlreadyInCart(CartKind),

    #[error("Recipe is not in {0}")]
    NotInCart(CartKind),

    #[error("You can't subscribe to yourself")]
    SelfSubscription,

    #[error("You are already subscribed to this user")]
    AlreadySubscribed,

    #[error("You are not subscribed to this user")]
    NotSubscribed,
}

impl ValidationError {
    /// Payload field the violation is reported under.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyIngredients
            | ValidationError::DuplicateIngredient(_)
            | ValidationError::InvalidAmount(_)
            | ValidationError::IngredientNotFound(_) => "ingredients",
            ValidationError::MissingField("id") | ValidationError::MissingField("amount") => {
                "ingredients"
            }
            ValidationError::MissingField(field) | ValidationError::TooLong(field, _) => *field,
            ValidationError::EmptyTags
            | ValidationError::DuplicateTag
            | ValidationError::TagNotFound(_) => "tags",
            ValidationError::InvalidCookingTime => "cooking_time",
            ValidationError::EmptyCart
            | ValidationError::AlreadyInCart(_)
            | ValidationError::NotInCart(_) => "error",
            ValidationError::SelfSubscription | ValidationError::AlreadySubscribed => {
                "non_field_errors"
            }
            ValidationError::NotSubscribed => "detail",
        }
    }
}
