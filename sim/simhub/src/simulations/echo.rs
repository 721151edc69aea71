use crate::{models, session::SessionError};
use serde_json::json;
use simhub_core::{Event, Registry};

/// Runs a single Echo model by hand.
///
/// The Echo model is created and started, receives `{"x": 1}` on its `in`
/// port, and is asked for its output, which should be the same document on
/// its `out` port. Returns that output.
pub async fn echo() -> Result<Vec<Event>, SessionError> {
    let registry = Registry::new();
    models::register_all(&registry);

    let model = registry.create(models::echo::NAME)?;
    let simulator = registry.create_sim(&model)?;
    simulator.start()?;
    simulator.compute_next_state(0.0, &[Event::from_value("in", &json!({"x": 1}))])?;
    let output = simulator.compute_next_output()?;

    registry.shutdown();
    Ok(output)
}
