//! Descriptive records for registered models and their parameter documents.

use crate::{
    atomic::{PortIndex, Time},
    port::{PortError, PortTable},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

/// Everything the registry knows about a model besides how to build it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub display_name: String,
    pub description: String,
    /// External port names and the native indices they map to.
    pub ports: BTreeMap<String, PortIndex>,
    /// The component whose output is the model's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_producer: Option<String>,
    /// The component that receives the model's input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_consumer: Option<String>,
    /// Default parameters handed to every new instance.
    #[serde(default)]
    pub properties: Map<String, Json>,
}

impl ModelMetadata {
    pub fn new(display_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, name: impl Into<String>, index: PortIndex) -> Self {
        self.ports.insert(name.into(), index);
        self
    }

    pub fn with_output_producer(mut self, name: impl Into<String>) -> Self {
        self.output_producer = Some(name.into());
        self
    }

    pub fn with_input_consumer(mut self, name: impl Into<String>) -> Self {
        self.input_consumer = Some(name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builds the port table, failing if two names share an index.
    pub fn port_table(&self) -> Result<PortTable, PortError> {
        PortTable::from_pairs(self.ports.iter().map(|(name, &index)| (name.as_str(), index)))
    }

    /// The metadata as a parameter document for `model_name`, suitable as a
    /// template for parameter files.
    pub fn parameter_template(&self, model_name: &str) -> Json {
        let mut document = match serde_json::to_value(self) {
            Ok(Json::Object(map)) => map,
            _ => Map::new(),
        };
        document.insert("modelName".into(), model_name.into());
        Json::Object(document)
    }
}

/// A parameter document naming the model to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_max: Option<Time>,
    /// Every other key, kept for the model's initialization hook.
    #[serde(flatten)]
    pub properties: Map<String, Json>,
}

impl ModelParameters {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            time_max: None,
            properties: Map::new(),
        }
    }

    /// The full document, with `defaults` filled in wherever this one is
    /// silent.
    pub fn merged_with(&self, defaults: &Map<String, Json>) -> Json {
        let mut document = defaults.clone();
        document.extend(self.properties.clone());
        document.insert("modelName".into(), self.model_name.clone().into());
        if let Some(time_max) = self.time_max {
            document.insert("timeMax".into(), time_max.into());
        }
        Json::Object(document)
    }
}
