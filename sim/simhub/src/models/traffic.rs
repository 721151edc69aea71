use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use simhub_core::Time;

/// A unit of work flowing from the generator through the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    /// When the generator emitted the job.
    pub created: Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Arrival,
    Departure,
}

/// Something the observer saw happen to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub event: Phase,
    pub job: Job,
    pub time: Time,
}

/// Everything that travels on a port of the GPT network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Traffic {
    Job(Job),
    Observation(Observation),
    /// Start and stop signals, whose payload is ignored.
    Control(Json),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payloads_pick_the_right_variant() -> anyhow::Result<()> {
        let job: Traffic = serde_json::from_value(json!({"id": 3, "created": 1.5}))?;
        assert_eq!(job, Traffic::Job(Job { id: 3, created: 1.5 }));

        let seen: Traffic = serde_json::from_value(
            json!({"event": "departure", "job": {"id": 3, "created": 1.5}, "time": 2.0}),
        )?;
        assert!(matches!(seen, Traffic::Observation(Observation { event: Phase::Departure, .. })));

        let control: Traffic = serde_json::from_value(json!(null))?;
        assert_eq!(control, Traffic::Control(Json::Null));
        Ok(())
    }
}
