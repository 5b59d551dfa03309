use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{
    BalancedShaper, ConfigurableShaper, NamedWeights, RewardShaper, SafetyShaper, SpeedShaper,
};
use crate::error::RewardError;

/// Free-form shaper parameters, as they appear in JSON configuration.
pub type ShaperParams = Map<String, Value>;

/// Builds a shaper for a registered name from its parameters.
pub type ShaperFactory = fn(&str, &ShaperParams) -> Result<Box<dyn RewardShaper>, RewardError>;

/// Name-to-factory map for reward shapers.
#[derive(Debug, Clone, Default)]
pub struct ShaperRegistry {
    factories: BTreeMap<String, ShaperFactory>,
}

impl ShaperRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `balanced`, `speed`, and `safety`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, factory) in [
            ("balanced", build::<BalancedShaper> as ShaperFactory),
            ("speed", build::<SpeedShaper>),
            ("safety", build::<SafetyShaper>),
        ] {
            registry.factories.insert(name.to_string(), factory);
        }
        registry
    }

    /// Register a shaper type under `name`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::InvalidName` for empty or whitespace-containing names.
    pub fn register<S: ConfigurableShaper>(&mut self, name: &str) -> Result<(), RewardError> {
        self.register_factory(name, build::<S>)
    }

    /// Register a hand-written factory under `name`.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::InvalidName` for empty or whitespace-containing names.
    pub fn register_factory(&mut self, name: &str, factory: ShaperFactory) -> Result<(), RewardError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(RewardError::InvalidName(name.to_string()));
        }
        if self.factories.insert(name.to_string(), factory).is_some() {
            debug!("reward shaper '{name}' re-registered");
        }
        Ok(())
    }

    /// Build the shaper registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::UnknownShaper` for unregistered names, or the
    /// factory's error for bad parameters.
    pub fn create(&self, name: &str, params: &ShaperParams) -> Result<Box<dyn RewardShaper>, RewardError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RewardError::UnknownShaper {
                name: name.to_string(),
                available: self.names(),
            })?;
        factory(name, params)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

fn build<S: ConfigurableShaper>(
    name: &str,
    params: &ShaperParams,
) -> Result<Box<dyn RewardShaper>, RewardError> {
    let weights: S::Weights = serde_json::from_value(Value::Object(params.clone())).map_err(|source| {
        RewardError::InvalidParams {
            name: name.to_string(),
            source,
        }
    })?;
    if let Some((field, _)) = weights
        .named_weights()
        .into_iter()
        .find(|(_, value)| !value.is_finite())
    {
        return Err(RewardError::NonFiniteWeight {
            name: name.to_string(),
            field,
        });
    }
    Ok(Box::new(S::from_weights(weights)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::Transition;
    use serde::Deserialize;
    use serde_json::json;
    use smallvec::SmallVec;

    fn params(value: Value) -> ShaperParams {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[derive(Debug, Default)]
    struct Constant {
        value: f64,
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ConstantWeights {
        #[serde(default)]
        value: f64,
    }

    impl NamedWeights for ConstantWeights {
        fn named_weights(&self) -> SmallVec<[(&'static str, f64); 12]> {
            SmallVec::from_iter([("value", self.value)])
        }
    }

    impl RewardShaper for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn compute_reward(&mut self, _transition: &Transition) -> f64 {
            self.value
        }

        fn reset(&mut self) {}
    }

    impl ConfigurableShaper for Constant {
        type Weights = ConstantWeights;

        fn from_weights(weights: Self::Weights) -> Self {
            Self { value: weights.value }
        }
    }

    #[test]
    fn builtins_are_listed_in_order() {
        let registry = ShaperRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["balanced", "safety", "speed"]);
    }

    #[test]
    fn unknown_shaper_is_an_explicit_error() {
        let registry = ShaperRegistry::with_builtins();
        let err = registry.create("turbo", &ShaperParams::new()).unwrap_err();
        match err {
            RewardError::UnknownShaper { name, available } => {
                assert_eq!(name, "turbo");
                assert_eq!(available.len(), 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn params_override_defaults() {
        let registry = ShaperRegistry::with_builtins();
        let mut shaper = registry
            .create("speed", &params(json!({"speed_reward_factor": 1.0})))
            .unwrap();
        assert_eq!(shaper.name(), "speed");
        let reward = shaper.compute_reward(&Transition {
            velocity: 3.0,
            ..Transition::default()
        });
        assert!((reward - 3.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_params_are_rejected() {
        let registry = ShaperRegistry::with_builtins();
        let err = registry
            .create("balanced", &params(json!({"speed_bonus": 1.0})))
            .unwrap_err();
        assert!(matches!(err, RewardError::InvalidParams { ref name, .. } if name == "balanced"));
    }

    #[test]
    fn nested_exploit_params_are_accepted() {
        let registry = ShaperRegistry::with_builtins();
        let mut shaper = registry
            .create("safety", &params(json!({"exploits": {"stagnation_penalty": -5.0}})))
            .unwrap();
        let reward = shaper.compute_reward(&Transition {
            stagnated: true,
            ..Transition::default()
        });
        assert!((reward - (2.0 - 5.0)).abs() < 1e-12);
    }

    #[test]
    fn custom_shapers_register_by_type() {
        let mut registry = ShaperRegistry::with_builtins();
        registry.register::<Constant>("constant").unwrap();
        assert!(registry.contains("constant"));
        let mut shaper = registry
            .create("constant", &params(json!({"value": 4.0})))
            .unwrap();
        assert!((shaper.compute_reward(&Transition::default()) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut registry = ShaperRegistry::new();
        assert!(matches!(
            registry.register::<Constant>(""),
            Err(RewardError::InvalidName(_))
        ));
        assert!(matches!(
            registry.register::<Constant>("two words"),
            Err(RewardError::InvalidName(_))
        ));
        assert!(registry.names().is_empty());
    }

    #[test]
    fn plain_factories_can_be_registered() {
        fn zero(_: &str, _: &ShaperParams) -> Result<Box<dyn RewardShaper>, RewardError> {
            Ok(Box::new(Constant::default()))
        }
        let mut registry = ShaperRegistry::new();
        registry.register_factory("zero", zero).unwrap();
        let mut shaper = registry.create("zero", &ShaperParams::new()).unwrap();
        assert!(shaper.compute_reward(&Transition::default()).abs() < f64::EPSILON);
    }
}
