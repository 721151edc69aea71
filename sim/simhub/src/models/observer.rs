use super::{Observation, Phase, Traffic};
use simhub_core::{Atomic, PortIndex, PortValue, Time, INFINITY};

/// Watches jobs arrive and depart, and reports each sighting as soon as it
/// happens.
#[derive(Debug, Default, Clone)]
pub struct Observer {
    /// Time of the last transition
    time: Time,
    /// Sightings not yet reported
    pending: Vec<Observation>,
    arrivals: u64,
    departures: u64,
}

impl Observer {
    pub const ARRIVAL: PortIndex = 0;
    pub const DEPARTURE: PortIndex = 1;
    pub const REPORT: PortIndex = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs that arrived but have not departed.
    pub fn in_flight(&self) -> u64 {
        self.arrivals.saturating_sub(self.departures)
    }
}

impl Atomic for Observer {
    type Value = Traffic;

    fn time_advance(&self) -> Time {
        if self.pending.is_empty() {
            INFINITY
        } else {
            0.0
        }
    }

    fn internal_transition(&mut self) {
        self.pending.clear();
    }

    fn external_transition(&mut self, elapsed: Time, inputs: &[PortValue<Traffic>]) {
        self.time += elapsed;
        for input in inputs {
            let Traffic::Job(job) = &input.value else {
                continue;
            };
            let event = match input.port {
                Self::ARRIVAL => {
                    self.arrivals += 1;
                    Phase::Arrival
                }
                Self::DEPARTURE => {
                    self.departures += 1;
                    Phase::Departure
                }
                _ => continue,
            };
            self.pending.push(Observation {
                event,
                job: job.clone(),
                time: self.time,
            });
        }
    }

    /// Only what was reported at this instant is cleared. Sightings made at
    /// the same instant are reported next.
    fn confluent_transition(&mut self, inputs: &[PortValue<Traffic>]) {
        let reported = self.pending.len();
        self.external_transition(0.0, inputs);
        self.pending = self.pending.split_off(reported);
    }

    fn output(&self) -> Vec<PortValue<Traffic>> {
        self.pending
            .iter()
            .map(|seen| PortValue::new(Self::REPORT, Traffic::Observation(seen.clone())))
            .collect()
    }

    fn input_ports(&self) -> Vec<PortIndex> {
        vec![Self::ARRIVAL, Self::DEPARTURE]
    }

    fn output_ports(&self) -> Vec<PortIndex> {
        vec![Self::REPORT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Job;

    fn job(id: u64) -> Traffic {
        Traffic::Job(Job { id, created: 0.0 })
    }

    fn times(observer: &Observer) -> Vec<(Phase, Time)> {
        observer
            .output()
            .into_iter()
            .filter_map(|output| match output.value {
                Traffic::Observation(seen) => Some((seen.event, seen.time)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn reports_each_sighting_once() {
        let mut observer = Observer::new();
        assert_eq!(observer.time_advance(), INFINITY);

        observer.external_transition(1.0, &[PortValue::new(Observer::ARRIVAL, job(1))]);
        assert_eq!(observer.time_advance(), 0.0);
        assert_eq!(times(&observer), vec![(Phase::Arrival, 1.0)]);
        assert_eq!(observer.in_flight(), 1);

        observer.internal_transition();
        assert!(observer.output().is_empty());

        observer.external_transition(0.5, &[PortValue::new(Observer::DEPARTURE, job(1))]);
        assert_eq!(times(&observer), vec![(Phase::Departure, 1.5)]);
        assert_eq!(observer.in_flight(), 0);
    }

    #[test]
    fn simultaneous_sightings_are_kept() {
        let mut observer = Observer::new();
        observer.external_transition(1.0, &[PortValue::new(Observer::ARRIVAL, job(1))]);
        observer.confluent_transition(&[PortValue::new(Observer::DEPARTURE, job(1))]);
        assert_eq!(times(&observer), vec![(Phase::Departure, 1.0)]);
    }
}
