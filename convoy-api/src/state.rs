use std::sync::Arc;

use convoy_shared::TripEvent;
use convoy_store::app_config::RateLimitConfig;
use convoy_store::RedisClient;
use convoy_trips::TripService;
use tokio::sync::broadcast;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub trips: Arc<TripService>,
    /// Rate limiting is off when no Redis is configured.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub events: broadcast::Sender<TripEvent>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(trips: Arc<TripService>, auth: AuthConfig) -> Result<Self, prometheus::Error> {
        let (events, _) = broadcast::channel(100);
        Ok(Self {
            trips,
            redis: None,
            rate_limit: RateLimitConfig::default(),
            events,
            metrics: Arc::new(Metrics::new()?),
            auth,
        })
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, rate_limit: RateLimitConfig) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }

    /// Fan an event out to stream subscribers. Nobody listening is fine.
    pub fn publish(&self, event: TripEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("No stream subscribers");
        }
    }
}
