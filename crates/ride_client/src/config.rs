//! Client configuration: defaults, builder-style overrides and environment
//! variables.

use std::time::Duration;

use ride_core::arrival::DEFAULT_ARRIVAL_THRESHOLD_M;
use ride_core::pricing::FareTable;

use crate::error::ConfigError;

pub const ENV_USER_ID: &str = "RIDE_USER_ID";
pub const ENV_CUSTOMER_ID: &str = "RIDE_CUSTOMER_ID";
pub const ENV_ARRIVAL_THRESHOLD_M: &str = "RIDE_ARRIVAL_THRESHOLD_M";
pub const ENV_NO_DRIVER_TIMEOUT_SECS: &str = "RIDE_NO_DRIVER_TIMEOUT_SECS";
pub const ENV_ACCEPTANCE_POLL_SECS: &str = "RIDE_ACCEPTANCE_POLL_SECS";
pub const ENV_ARRIVAL_RECHECK_SECS: &str = "RIDE_ARRIVAL_RECHECK_SECS";
pub const ENV_LOCATION_BROADCAST_SECS: &str = "RIDE_LOCATION_BROADCAST_SECS";
pub const ENV_PRICE_BACKEND_URL: &str = "RIDE_PRICE_BACKEND_URL";

/// Where quotes come from. Flat rate is authoritative unless a backend is
/// configured.
#[derive(Debug, Clone, PartialEq)]
pub enum PricingStrategy {
    FlatRate(FareTable),
    Remote { url: String },
}

impl Default for PricingStrategy {
    fn default() -> Self {
        PricingStrategy::FlatRate(FareTable::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub user_id: Option<String>,
    pub customer_id: Option<String>,
    pub user_name: Option<String>,
    pub user_mobile: Option<String>,
    pub arrival_threshold_m: f64,
    pub acceptance_poll: Duration,
    pub no_driver_timeout: Duration,
    pub arrival_recheck: Duration,
    pub location_broadcast: Duration,
    /// How long to wait for `bookRide` and `getRideStatus` acknowledgements.
    pub ack_timeout: Duration,
    pub pricing: PricingStrategy,
    pub price_cache_capacity: usize,
    pub inbox_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            customer_id: None,
            user_name: None,
            user_mobile: None,
            arrival_threshold_m: DEFAULT_ARRIVAL_THRESHOLD_M,
            acceptance_poll: Duration::from_secs(3),
            no_driver_timeout: Duration::from_secs(60),
            arrival_recheck: Duration::from_secs(2),
            location_broadcast: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(10),
            pricing: PricingStrategy::default(),
            price_cache_capacity: 256,
            inbox_capacity: 256,
        }
    }
}

impl ClientConfig {
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_profile(mut self, name: impl Into<String>, mobile: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self.user_mobile = Some(mobile.into());
        self
    }

    pub fn with_arrival_threshold_m(mut self, metres: f64) -> Self {
        self.arrival_threshold_m = metres;
        self
    }

    pub fn with_acceptance_poll(mut self, every: Duration) -> Self {
        self.acceptance_poll = every;
        self
    }

    pub fn with_no_driver_timeout(mut self, after: Duration) -> Self {
        self.no_driver_timeout = after;
        self
    }

    pub fn with_arrival_recheck(mut self, every: Duration) -> Self {
        self.arrival_recheck = every;
        self
    }

    pub fn with_location_broadcast(mut self, every: Duration) -> Self {
        self.location_broadcast = every;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingStrategy) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_price_cache_capacity(mut self, entries: usize) -> Self {
        self.price_cache_capacity = entries;
        self
    }

    pub fn with_inbox_capacity(mut self, messages: usize) -> Self {
        self.inbox_capacity = messages;
        self
    }

    /// Defaults overridden by any `RIDE_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(user_id) = non_empty(lookup(ENV_USER_ID)) {
            config.user_id = Some(user_id);
        }
        if let Some(customer_id) = non_empty(lookup(ENV_CUSTOMER_ID)) {
            config.customer_id = Some(customer_id);
        }
        if let Some(value) = lookup(ENV_ARRIVAL_THRESHOLD_M) {
            config.arrival_threshold_m = positive(ENV_ARRIVAL_THRESHOLD_M, &value)?;
        }
        if let Some(value) = lookup(ENV_NO_DRIVER_TIMEOUT_SECS) {
            config.no_driver_timeout = seconds(ENV_NO_DRIVER_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_ACCEPTANCE_POLL_SECS) {
            config.acceptance_poll = seconds(ENV_ACCEPTANCE_POLL_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_ARRIVAL_RECHECK_SECS) {
            config.arrival_recheck = seconds(ENV_ARRIVAL_RECHECK_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_LOCATION_BROADCAST_SECS) {
            config.location_broadcast = seconds(ENV_LOCATION_BROADCAST_SECS, &value)?;
        }
        if let Some(url) = non_empty(lookup(ENV_PRICE_BACKEND_URL)) {
            config.pricing = PricingStrategy::Remote { url };
        }
        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn positive(name: &'static str, value: &str) -> Result<f64, ConfigError> {
    let parsed = value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        })?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(ConfigError::NotPositive {
            name,
            value: parsed,
        });
    }
    Ok(parsed)
}

fn seconds(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    positive(name, value).map(Duration::from_secs_f64)
}
