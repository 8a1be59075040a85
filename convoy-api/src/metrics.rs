use convoy_core::TripResult;
use prometheus::{opts, IntCounter, IntCounterVec, Registry, TextEncoder};

/// Booking counters, scraped from `/metrics`.
pub struct Metrics {
    registry: Registry,
    admissions: IntCounterVec,
    trips_created: IntCounter,
    edits: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let admissions = IntCounterVec::new(
            opts!("convoy_admissions_total", "Join attempts by outcome"),
            &["outcome"],
        )?;
        let trips_created = IntCounter::new("convoy_trips_created_total", "Trips published by drivers")?;
        let edits = IntCounterVec::new(
            opts!("convoy_trip_edits_total", "Trip edits by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(admissions.clone()))?;
        registry.register(Box::new(trips_created.clone()))?;
        registry.register(Box::new(edits.clone()))?;

        Ok(Self { registry, admissions, trips_created, edits })
    }

    pub fn record_admission<T>(&self, result: &TripResult<T>) {
        let outcome = outcome(result);
        self.admissions.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn record_edit<T>(&self, result: &TripResult<T>) {
        let outcome = outcome(result);
        self.edits.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn record_trip_created(&self) {
        self.trips_created.inc();
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

fn outcome<T>(result: &TripResult<T>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(err) => err.kind().to_lowercase(),
    }
}
