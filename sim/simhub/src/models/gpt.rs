//! The generator, processor and transducer network.
//!
//! ```text
//!            +-----------+  out    in  +-----------+
//!  start --> |           | ----------> |           |
//!  stop  --> | generator |             | processor |
//!            +-----------+             +-----------+
//!                  | out                     | out
//!                  v arrival      departure  v
//!                +-------------------------------+
//!                |            observer           | --> report
//!                +-------------------------------+
//! ```

use super::{Generator, Interval, Observer, Processor, Traffic};
use serde_json::{Map, Value as Json};
use simhub_core::{ComponentCatalog, CoupledModel, InitContext, ModelError, ModelMetadata, Registry, Time};

/// The name the model is registered under.
pub const NAME: &str = "gpt";

/// The name the component catalog is registered under.
pub const CATALOG: &str = "traffic";

pub const DEFAULT_PERIOD: Time = 1.0;
pub const DEFAULT_SERVICE_TIME: Time = 0.5;

pub fn metadata() -> ModelMetadata {
    ModelMetadata::new(
        "GPT",
        "A generator feeding a single-server processor, with an observer reporting every arrival and departure",
    )
    .with_port("start", Generator::START)
    .with_port("stop", Generator::STOP)
    .with_port("report", Observer::REPORT)
    .with_input_consumer("generator")
    .with_output_producer("observer")
    .with_property(Generator::PERIOD, DEFAULT_PERIOD)
    .with_property(Processor::SERVICE_TIME, DEFAULT_SERVICE_TIME)
}

/// Wires up a fresh network. Producer and consumer come from `metadata`.
pub fn build(metadata: &ModelMetadata) -> Result<CoupledModel<Traffic>, ModelError> {
    let network = CoupledModel::builder()
        .atomic("generator", Generator::new(DEFAULT_PERIOD))
        .atomic("processor", Processor::new(DEFAULT_SERVICE_TIME))
        .atomic("observer", Observer::new())
        .couple("generator", Generator::OUT, "processor", Processor::IN)
        .couple("generator", Generator::OUT, "observer", Observer::ARRIVAL)
        .couple("processor", Processor::OUT, "observer", Observer::DEPARTURE)
        .roles(metadata)
        .build()?;
    Ok(network)
}

/// Mean of the interval `key` names in a component's properties.
fn mean(properties: &Map<String, Json>, key: &str, default: Time) -> Result<Time, ModelError> {
    let properties = Json::Object(properties.clone());
    match Interval::from_context(&InitContext::new(Some(&properties)), key, default, 0)? {
        Interval::Fixed(mean) | Interval::Exponential { mean, .. } => Ok(mean),
    }
}

/// The GPT components, for networks described in JSON.
pub fn catalog() -> ComponentCatalog<Traffic> {
    ComponentCatalog::new()
        .with("generator", |properties: &Map<String, Json>| {
            Ok(Generator::new(mean(properties, Generator::PERIOD, DEFAULT_PERIOD)?))
        })
        .with("processor", |properties: &Map<String, Json>| {
            Ok(Processor::new(mean(
                properties,
                Processor::SERVICE_TIME,
                DEFAULT_SERVICE_TIME,
            )?))
        })
        .with("observer", |_: &Map<String, Json>| Ok(Observer::new()))
}

pub fn register(registry: &Registry) {
    registry.add_model(NAME, metadata(), build);
    registry.add_catalog(CATALOG, catalog());
}
