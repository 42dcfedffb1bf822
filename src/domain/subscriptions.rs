use std::collections::HashSet;

use crate::{schema::Uuid, validation::ValidationError};

/// Existing `(user, author)` subscription pairs.
pub trait SubscriptionLookup {
    fn is_subscribed(&self, user: Uuid, author: Uuid) -> bool;
}

impl SubscriptionLookup for HashSet<(Uuid, Uuid)> {
    fn is_subscribed(&self, user: Uuid, author: Uuid) -> bool {
        self.contains(&(user, author))
    }
}

impl SubscriptionLookup for [(Uuid, Uuid)] {
    fn is_subscribed(&self, user: Uuid, author: Uuid) -> bool {
        self.contains(&(user, author))
    }
}

pub fn check_not_self(user: Uuid, target: Uuid) -> Result<(), ValidationError> {
    if user == target {
        return Err(ValidationError::SelfSubscription);
    }
    Ok(())
}

pub fn check_subscription<L>(user: Uuid, target: Uuid, existing: &L) -> Result<(), ValidationError>
where
    L: SubscriptionLookup + ?Sized,
{
    check_not_self(user, target)?;
    if existing.is_subscribed(user, target) {
        return Err(ValidationError::AlreadySubscribed);
    }
    Ok(())
}

pub fn check_unsubscribe<L>(user: Uuid, target: Uuid, existing: &L) -> Result<(), ValidationError>
where
    L: SubscriptionLookup + ?Sized,
{
    if !existing.is_subscribed(user, target) {
        return Err(ValidationError::NotSubscribed);
    }
    Ok(())
}
