//! Maps validation types to their criteria ids and validators.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{
    DataCompletenessValidator, EstimatedAreaValidator, PlantStartDateValidator,
    PolygonSizeValidator, SelfIntersectionValidator, SpikesValidator, Validator,
};
use crate::db::repository::FullRepository;
use crate::error::{EngineError, EngineResult};
use crate::models::{CriteriaId, ValidationType};

/// Parse caller-supplied type names, rejecting unknown ones.
pub fn parse_validation_types<S: AsRef<str>>(names: &[S]) -> EngineResult<Vec<ValidationType>> {
    names
        .iter()
        .map(|n| {
            n.as_ref()
                .parse::<ValidationType>()
                .map_err(|_| EngineError::unknown_type(n.as_ref()))
        })
        .collect()
}

/// Lookup table of the checks the engine can run.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct CriteriaRegistry {
    validators: BTreeMap<ValidationType, Arc<dyn Validator>>,
}

impl CriteriaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every implemented check bound to `repository`.
    pub fn with_default_validators(repository: Arc<dyn FullRepository>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SelfIntersectionValidator::new(repository.clone())));
        registry.register(Arc::new(SpikesValidator::new(repository.clone())));
        registry.register(Arc::new(PolygonSizeValidator::new(repository.clone())));
        registry.register(Arc::new(DataCompletenessValidator::new(repository.clone())));
        registry.register(Arc::new(PlantStartDateValidator::new(repository.clone())));
        registry.register(Arc::new(EstimatedAreaValidator::new(repository)));
        registry
    }

    /// Register a validator under its own type, returning any it replaced.
    pub fn register(&mut self, validator: Arc<dyn Validator>) -> Option<Arc<dyn Validator>> {
        self.validators.insert(validator.validation_type(), validator)
    }

    /// Criteria id and validator for `validation_type`.
    pub fn resolve(
        &self,
        validation_type: ValidationType,
    ) -> EngineResult<(CriteriaId, Arc<dyn Validator>)> {
        self.validators
            .get(&validation_type)
            .map(|v| (validation_type.criteria_id(), v.clone()))
            .ok_or_else(|| EngineError::unknown_type(validation_type))
    }

    /// Registered types in criteria id order.
    pub fn registered_types(&self) -> Vec<ValidationType> {
        let mut types: Vec<_> = self.validators.keys().copied().collect();
        types.sort_by_key(|t| t.criteria_id());
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalRepository;

    fn registry() -> CriteriaRegistry {
        CriteriaRegistry::with_default_validators(Arc::new(LocalRepository::new()))
    }

    #[test]
    fn test_default_registry_covers_implemented_checks() {
        assert_eq!(
            registry().registered_types(),
            vec![
                ValidationType::SelfIntersection,
                ValidationType::PolygonSize,
                ValidationType::Spikes,
                ValidationType::EstimatedArea,
                ValidationType::DataCompleteness,
                ValidationType::PlantStartDate,
            ]
        );
    }

    #[test]
    fn test_resolve_returns_stable_criteria_id() {
        let (id, validator) = registry().resolve(ValidationType::Spikes).unwrap();
        assert_eq!(id, CriteriaId::new(8));
        assert_eq!(validator.validation_type(), ValidationType::Spikes);
    }

    #[test]
    fn test_reserved_type_without_validator_is_unknown() {
        let err = registry().resolve(ValidationType::DuplicateGeometry).err().unwrap();
        assert!(matches!(err, EngineError::UnknownValidationType(ref t) if t == "DUPLICATE_GEOMETRY"));
    }

    #[test]
    fn test_parse_rejects_unknown_names() {
        assert_eq!(
            parse_validation_types(&["SPIKES", "polygon_size"]).unwrap(),
            vec![ValidationType::Spikes, ValidationType::PolygonSize]
        );
        let err = parse_validation_types(&["SPIKES", "NOT_A_CHECK"]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownValidationType(ref t) if t == "NOT_A_CHECK"));
    }
}
