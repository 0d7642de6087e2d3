//! Allowed-list filter: the subset of the catalog a profile may use.

use thiserror::Error;

use crate::catalog::Catalog;
use crate::model::{Exercise, ExerciseId, UserProfile};

/// Errors from [`filter`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error(
        "no exercises satisfy the profile constraints ({catalog_size} in catalog); \
         add equipment or remove blacklist entries"
    )]
    EmptyAllowedList { catalog_size: usize },
}

/// Catalog exercises usable under one profile, in catalog order.
///
/// Keeps a reference to the source catalog so callers can still resolve
/// exercises that were filtered out.
#[derive(Debug, Clone)]
pub struct AllowedList<'a> {
    catalog: &'a Catalog,
    exercises: Vec<&'a Exercise>,
}

impl<'a> AllowedList<'a> {
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn exercises(&self) -> &[&'a Exercise] {
        &self.exercises
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Exercise> + '_ {
        self.exercises.iter().copied()
    }

    /// Look up an exercise only if it is allowed.
    pub fn get(&self, id: &ExerciseId) -> Option<&'a Exercise> {
        self.exercises.iter().copied().find(|e| &e.id == id)
    }

    pub fn contains(&self, id: &ExerciseId) -> bool {
        self.get(id).is_some()
    }

    /// Position of an allowed exercise in allowed-list order.
    pub fn position(&self, id: &ExerciseId) -> Option<usize> {
        self.exercises.iter().position(|e| &e.id == id)
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}

/// Whether `exercise` satisfies the profile's equipment and blacklist rules.
pub fn is_allowed(exercise: &Exercise, profile: &UserProfile) -> bool {
    exercise.fits_equipment(profile.equipment_available())
        && !profile.blacklisted_exercises().contains(&exercise.id)
        && exercise
            .primary_muscles
            .is_disjoint(profile.blacklisted_muscles())
}

/// Derive the allowed list for `profile`.
///
/// Returns [`FilterError::EmptyAllowedList`] when nothing survives.
pub fn filter<'a>(
    catalog: &'a Catalog,
    profile: &UserProfile,
) -> Result<AllowedList<'a>, FilterError> {
    let exercises: Vec<&Exercise> = catalog.iter().filter(|e| is_allowed(e, profile)).collect();

    tracing::debug!(
        kept = exercises.len(),
        dropped = catalog.len() - exercises.len(),
        "filtered catalog"
    );

    if exercises.is_empty() {
        return Err(FilterError::EmptyAllowedList {
            catalog_size: catalog.len(),
        });
    }

    Ok(AllowedList { catalog, exercises })
}
