//! Exercise catalog: loading, validation, and lookup.
//!
//! A [`Catalog`] is built once per process and shared read-only (usually
//! behind an `Arc`) by every pipeline run. Catalogs can be read from JSON
//! (an array of exercise records), from TOML (`[[exercises]]` tables), or
//! taken from the built-in library compiled into the binary.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use crate::model::{Exercise, ExerciseId};

/// Errors raised while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog contains no exercises")]
    Empty,

    #[error("duplicate exercise id in catalog: {0}")]
    DuplicateId(ExerciseId),

    #[error("catalog JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("catalog TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Container for deserializing a TOML catalog.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    exercises: Vec<Exercise>,
}

/// The embedded exercise library.
static BUILTIN_CATALOG_TOML: &str = include_str!("builtin.toml");

/// An immutable, insertion-ordered collection of exercises.
#[derive(Debug, Clone)]
pub struct Catalog {
    exercises: Vec<Exercise>,
    index: HashMap<ExerciseId, usize>,
}

impl Catalog {
    /// Build a catalog from records, rejecting empty input and duplicate ids.
    pub fn new(exercises: Vec<Exercise>) -> Result<Self, CatalogError> {
        if exercises.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut index = HashMap::with_capacity(exercises.len());
        for (position, exercise) in exercises.iter().enumerate() {
            if index.insert(exercise.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateId(exercise.id.clone()));
            }
        }
        Ok(Self { exercises, index })
    }

    /// Parse a JSON array of exercise records.
    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let exercises: Vec<Exercise> = serde_json::from_str(content)?;
        Self::new(exercises)
    }

    /// Parse a TOML document of `[[exercises]]` tables.
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::new(file.exercises)
    }

    /// Load a catalog file, choosing the parser from the extension
    /// (`.toml`, otherwise JSON).
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
        .with_context(|| format!("invalid catalog {}", path.display()))?;
        tracing::debug!(path = %path.display(), exercises = catalog.len(), "loaded catalog");
        Ok(catalog)
    }

    /// The built-in catalog.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed. The file is compiled into
    /// the binary and covered by tests, so this cannot happen at runtime.
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_CATALOG_TOML).expect("embedded builtin.toml is invalid")
    }

    pub fn get(&self, id: &ExerciseId) -> Option<&Exercise> {
        self.index.get(id).map(|&i| &self.exercises[i])
    }

    pub fn contains(&self, id: &ExerciseId) -> bool {
        self.index.contains_key(id)
    }

    /// Exercises in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Exercise> {
        self.exercises.iter()
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Equipment, MovementFunction};

    #[test]
    fn builtin_catalog_loads() {
        let catalog = Catalog::builtin();
        assert!(catalog.len() >= 30, "expected a full library, got {}", catalog.len());
    }

    #[test]
    fn builtin_catalog_covers_every_function_and_equipment() {
        let catalog = Catalog::builtin();
        for function in [
            MovementFunction::Push,
            MovementFunction::Pull,
            MovementFunction::Legs,
            MovementFunction::Core,
            MovementFunction::FullBody,
        ] {
            assert!(
                catalog.iter().any(|e| e.function == function),
                "no exercise with function {function}"
            );
        }
        for equipment in Equipment::ALL {
            assert!(
                catalog.iter().any(|e| e.equipment.contains(&equipment)),
                "no exercise using {equipment}"
            );
        }
    }

    #[test]
    fn lookup_by_id() {
        let catalog = Catalog::builtin();
        let first = catalog.iter().next().unwrap().clone();
        assert_eq!(catalog.get(&first.id), Some(&first));
        assert!(catalog.get(&ExerciseId::new("nope")).is_none());
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(matches!(Catalog::new(vec![]), Err(CatalogError::Empty)));
        assert!(matches!(Catalog::from_json_str("[]"), Err(CatalogError::Empty)));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let json = r#"[
            {"id": "a", "name": "A", "primary_muscles": ["chest"], "function": "push",
             "equipment": ["bodyweight"], "type": "compound"},
            {"id": "a", "name": "A again", "primary_muscles": ["chest"], "function": "push",
             "equipment": ["bodyweight"], "type": "compound"}
        ]"#;
        let err = Catalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(ref id) if id.as_str() == "a"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Catalog::from_json_str("{not json"),
            Err(CatalogError::Json(_))
        ));
    }

    #[test]
    fn loads_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("catalog.json");
        std::fs::write(
            &json,
            r#"[{"id": "a", "name": "A", "primary_muscles": ["abs"], "function": "core", "type": "isolation"}]"#,
        )
        .unwrap();
        assert_eq!(Catalog::from_path(&json).unwrap().len(), 1);

        let toml = dir.path().join("catalog.toml");
        std::fs::write(&toml, BUILTIN_CATALOG_TOML).unwrap();
        assert_eq!(Catalog::from_path(&toml).unwrap().len(), Catalog::builtin().len());

        let err = Catalog::from_path(&dir.path().join("missing.json")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read catalog"));
    }

    #[test]
    fn preserves_insertion_order() {
        let json = r#"[
            {"id": "z", "name": "Z", "primary_muscles": [], "function": "core", "type": "other"},
            {"id": "a", "name": "A", "primary_muscles": [], "function": "core", "type": "other"}
        ]"#;
        let catalog = Catalog::from_json_str(json).unwrap();
        let ids: Vec<&str> = catalog.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }
}
