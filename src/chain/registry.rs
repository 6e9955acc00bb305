use std::{collections::BTreeMap, path::Path};

use crate::{
    chain::{Chain, ChainStep, Preset},
    filter::Renderable,
    foundation::error::{ChainError, ChainResult},
};

/// Factory turning step parameters into a chain step.
pub type StepFactory<R> = Box<dyn Fn(&serde_json::Value) -> ChainResult<Box<dyn ChainStep<R>>>>;

/// Explicit mapping from stable step ids to factories, populated at startup.
pub struct FilterRegistry<R: Renderable> {
    factories: BTreeMap<String, StepFactory<R>>,
}

impl<R: Renderable> Default for FilterRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Renderable> FilterRegistry<R> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register `factory` under `id`. Ids are unique.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> ChainResult<()>
    where
        F: Fn(&serde_json::Value) -> ChainResult<Box<dyn ChainStep<R>>> + 'static,
    {
        let id = id.into();
        if self.factories.contains_key(&id) {
            return Err(ChainError::validation(format!(
                "step id '{id}' is already registered"
            )));
        }
        self.factories.insert(id, Box::new(factory));
        Ok(())
    }

    /// `true` when `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate the step registered under `id`.
    pub fn create(
        &self,
        id: &str,
        params: &serde_json::Value,
    ) -> ChainResult<Box<dyn ChainStep<R>>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| ChainError::validation(format!("unknown step '{id}'")))?;
        factory(params)
    }

    /// Resolve every step of `config` into a named preset.
    pub fn build_preset(&self, config: &ChainConfig) -> ChainResult<Preset<R>> {
        let mut chain = Chain::new();
        for step in &config.steps {
            chain.push_boxed(self.create(&step.filter, &step.params)?);
        }
        Ok(Preset::new(config.name.clone(), chain))
    }
}

/// Declarative chain description.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChainConfig {
    /// Preset name shown in diagnostics.
    #[serde(default)]
    pub name: String,
    /// Steps in application order.
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// One entry of a [`ChainConfig`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StepConfig {
    /// Registered step id.
    pub filter: String,
    /// Parameters handed to the step factory.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ChainConfig {
    /// Parse a JSON chain description.
    pub fn from_json(text: &str) -> ChainResult<Self> {
        serde_json::from_str(text).map_err(|e| ChainError::serde(e.to_string()))
    }

    /// Read and parse a JSON chain description.
    pub fn from_path(path: &Path) -> ChainResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Deserialize step parameters into `P`, reporting which step rejected them.
pub fn parse_params<P>(step: &str, params: &serde_json::Value) -> ChainResult<P>
where
    P: serde::de::DeserializeOwned,
{
    let params = if params.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(params)
        .map_err(|e| ChainError::validation(format!("invalid parameters for '{step}': {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/chain/registry.rs"]
mod tests;
