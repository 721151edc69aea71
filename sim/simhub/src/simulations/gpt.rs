use crate::{
    models,
    session::{run_sessions, SessionError, SessionReport, SessionRequest},
};
use simhub_core::Registry;
use std::sync::Arc;

async fn run(request: SessionRequest) -> Result<SessionReport, SessionError> {
    let registry = Registry::new();
    models::register_all(&registry);
    let registry = Arc::new(registry);

    let mut results = run_sessions(registry.clone(), vec![request]).await;
    registry.shutdown();
    results.pop().unwrap_or(Err(SessionError::Lost))
}

/// Runs the GPT network for 5 time units with fixed intervals.
///
/// The generator emits a job every time unit and the processor takes half a
/// time unit per job, so the observer reports an arrival at every whole time
/// and a departure half a unit later.
pub async fn gpt() -> Result<SessionReport, SessionError> {
    run(SessionRequest::parameters(include_str!("../../params/gpt.json"))).await
}

/// Runs the GPT network for 20 time units with seeded exponential intervals.
pub async fn gpt_seeded() -> Result<SessionReport, SessionError> {
    run(SessionRequest::parameters(include_str!("../../params/gpt_seeded.json"))).await
}

/// Runs the GPT network described in JSON, with the same intervals and bound
/// as [`gpt`].
pub async fn gpt_network() -> Result<SessionReport, SessionError> {
    run(SessionRequest::network(include_str!("../../params/gpt_network.json"))).await
}
