//! Coupled networks assembled from JSON documents.
//!
//! A [`ComponentCatalog`] maps component type names to constructors. A
//! [`ModelDocument`] lists named components and the couplings between them:
//!
//! ```json
//! {
//!   "modelTypeName": "traffic",
//!   "ports": {"start": 0, "stop": 1, "report": 2},
//!   "inputConsumer": "generator",
//!   "outputProducer": "observer",
//!   "models": {
//!     "generator": {"modelTypeName": "generator", "properties": {"genr_period": 2.0}},
//!     "observer": {"modelTypeName": "observer"}
//!   },
//!   "couplings": [
//!     {"from": {"model": "generator", "port": 2}, "to": {"model": "observer", "port": 0}}
//!   ]
//! }
//! ```
//!
//! A component entry with its own `models` is a nested network built from the
//! same catalog. Every network goes through [`CoupledBuilder`], so documents
//! are held to the same coupling rules as networks built in code.

use crate::{
    atomic::{Atomic, ModelError, PortIndex, Time},
    coupled::{CoupledBuilder, CoupledModel, CouplingError},
    port::{PortError, PortTable},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::{collections::BTreeMap, sync::Arc};

/// One end of a coupling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub model: String,
    pub port: PortIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: Endpoint,
    pub to: Endpoint,
}

/// A component or network description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDocument {
    /// For a top-level document, the catalog the components come from. For a
    /// component, its type within that catalog.
    pub model_type_name: String,
    /// External port names of the network.
    #[serde(default)]
    pub ports: BTreeMap<String, PortIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_consumer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_max: Option<Time>,
    /// Parameters. At the top level they become the instance's parameter
    /// document; on a component they are handed to its constructor.
    #[serde(default)]
    pub properties: Map<String, Json>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelDocument>,
    #[serde(default)]
    pub couplings: Vec<Edge>,
}

impl ModelDocument {
    pub fn from_json(document: &str) -> Result<Self, DigraphError> {
        serde_json::from_str(document).map_err(DigraphError::Malformed)
    }

    /// Whether this entry describes a network rather than a single component.
    pub fn is_network(&self) -> bool {
        !self.models.is_empty()
    }

    pub fn port_table(&self) -> Result<PortTable, PortError> {
        PortTable::from_pairs(self.ports.iter().map(|(name, &index)| (name.as_str(), index)))
    }

    /// The parameter document of an instance built from this description.
    pub fn parameters(&self) -> Json {
        let mut parameters = self.properties.clone();
        if let Some(time_max) = self.time_max {
            parameters.insert("timeMax".into(), time_max.into());
        }
        Json::Object(parameters)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigraphError {
    #[error("Malformed network document: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("No component type is named <{0}>")]
    UnknownType(String),
    #[error("Could not construct component <{0}>: {1}")]
    Component(String, #[source] ModelError),
    #[error("{0}")]
    Coupling(#[from] CouplingError),
}

/// Builds one component from the properties of its entry.
pub type ComponentConstructor<V> =
    Arc<dyn Fn(&Map<String, Json>) -> Result<Box<dyn Atomic<Value = V>>, ModelError> + Send + Sync>;

/// Named component constructors sharing one value type.
pub struct ComponentCatalog<V: Clone + Send + 'static> {
    constructors: BTreeMap<String, ComponentConstructor<V>>,
}

impl<V: Clone + Send + 'static> ComponentCatalog<V> {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Adds a component type, replacing any type of the same name.
    pub fn with<M, F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        M: Atomic<Value = V>,
        F: Fn(&Map<String, Json>) -> Result<M, ModelError> + Send + Sync + 'static,
    {
        let constructor: ComponentConstructor<V> = Arc::new(
            move |properties: &Map<String, Json>| -> Result<Box<dyn Atomic<Value = V>>, ModelError> {
                Ok(Box::new(constructor(properties)?))
            },
        );
        self.constructors.insert(name.into(), constructor);
        self
    }

    /// Component type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Builds the network `document` describes.
    pub fn build(&self, document: &ModelDocument) -> Result<CoupledModel<V>, DigraphError> {
        let mut builder = CoupledBuilder::new();
        for (name, component) in &document.models {
            builder = if component.is_network() {
                tracing::debug!("Adding network <{}>", name);
                builder.coupled(name.clone(), self.build(component)?)
            } else {
                tracing::debug!("Adding component <{}> of type <{}>", name, component.model_type_name);
                let constructor = self
                    .constructors
                    .get(&component.model_type_name)
                    .ok_or_else(|| DigraphError::UnknownType(component.model_type_name.clone()))?;
                let model = constructor(&component.properties)
                    .map_err(|e| DigraphError::Component(name.clone(), e))?;
                builder.boxed(name.clone(), model)
            };
        }
        for edge in &document.couplings {
            builder = builder.couple(
                edge.from.model.clone(),
                edge.from.port,
                edge.to.model.clone(),
                edge.to.port,
            );
        }
        if let Some(producer) = &document.output_producer {
            builder = builder.output_producer(producer.clone());
        }
        if let Some(consumer) = &document.input_consumer {
            builder = builder.input_consumer(consumer.clone());
        }
        Ok(builder.build()?)
    }
}

impl<V: Clone + Send + 'static> Default for ComponentCatalog<V> {
    fn default() -> Self {
        Self::new()
    }
}
