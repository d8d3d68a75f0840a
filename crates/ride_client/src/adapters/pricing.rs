//! Fare quoting strategies.
//!
//! Flat rate prices locally from [`FareTable`]; remote asks a pricing backend
//! and caches its answers. Which one is authoritative is chosen by
//! [`PricingStrategy`].

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;
use ride_core::geo::Coordinate;
use ride_core::pricing::FareTable;
use ride_core::session::VehicleClass;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ClientConfig, PricingStrategy};
use crate::error::PricingError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub vehicle_class: VehicleClass,
    pub distance_km: Option<f64>,
    pub pickup: Coordinate,
    pub dropoff: Coordinate,
    pub stop: Option<Coordinate>,
    pub return_trip: bool,
}

#[async_trait]
pub trait PriceEstimator: Send + Sync + 'static {
    async fn estimate(&self, request: &QuoteRequest) -> Result<f64, PricingError>;
}

#[derive(Debug, Clone, Default)]
pub struct FlatRateEstimator {
    table: FareTable,
}

impl FlatRateEstimator {
    pub fn new(table: FareTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl PriceEstimator for FlatRateEstimator {
    async fn estimate(&self, request: &QuoteRequest) -> Result<f64, PricingError> {
        self.table
            .estimate(request.vehicle_class, request.distance_km, request.return_trip)
            .ok_or(PricingError::MissingDistance)
    }
}

/// Response body of the pricing backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceResponse {
    pub success: bool,
    pub price: Option<f64>,
    pub message: Option<String>,
}

#[async_trait]
pub trait PriceBackend: Send + Sync + 'static {
    async fn quote(&self, request: &QuoteRequest) -> Result<PriceResponse, PricingError>;
}

/// Posts the quote request as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpPriceBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpPriceBackend {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl PriceBackend for HttpPriceBackend {
    async fn quote(&self, request: &QuoteRequest) -> Result<PriceResponse, PricingError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<PriceResponse>().await?)
    }
}

/// Cache key: coordinates at ~1 m and distance at 10 m resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct QuoteKey {
    vehicle_class: VehicleClass,
    distance_dam: i64,
    pickup: (i64, i64),
    dropoff: (i64, i64),
    stop: Option<(i64, i64)>,
    return_trip: bool,
}

fn grid(point: Coordinate) -> (i64, i64) {
    (
        (point.latitude * 1e5).round() as i64,
        (point.longitude * 1e5).round() as i64,
    )
}

impl QuoteKey {
    fn new(request: &QuoteRequest, distance_km: f64) -> Self {
        Self {
            vehicle_class: request.vehicle_class,
            distance_dam: (distance_km * 100.0).round() as i64,
            pickup: grid(request.pickup),
            dropoff: grid(request.dropoff),
            stop: request.stop.map(grid),
            return_trip: request.return_trip,
        }
    }
}

pub struct RemotePriceEstimator<B> {
    backend: B,
    cache: Mutex<LruCache<QuoteKey, f64>>,
}

impl<B: PriceBackend> RemotePriceEstimator<B> {
    pub fn new(backend: B, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cached(&self, key: &QuoteKey) -> Option<f64> {
        self.cache.lock().ok()?.get(key).copied()
    }

    fn remember(&self, key: QuoteKey, price: f64) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, price);
        }
    }
}

#[async_trait]
impl<B: PriceBackend> PriceEstimator for RemotePriceEstimator<B> {
    async fn estimate(&self, request: &QuoteRequest) -> Result<f64, PricingError> {
        let distance_km = request
            .distance_km
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or(PricingError::MissingDistance)?;
        let key = QuoteKey::new(request, distance_km);
        if let Some(price) = self.cached(&key) {
            debug!(vehicle_class = request.vehicle_class.as_str(), price, "quote cache hit");
            return Ok(price);
        }

        let response = self.backend.quote(request).await?;
        if !response.success {
            return Err(PricingError::Declined(
                response
                    .message
                    .unwrap_or_else(|| "price unavailable".to_string()),
            ));
        }
        let price = response
            .price
            .filter(|price| price.is_finite() && *price > 0.0)
            .ok_or(PricingError::InvalidPrice)?;
        self.remember(key, price);
        Ok(price)
    }
}

/// The estimator selected by `config.pricing`.
pub fn build_estimator(config: &ClientConfig) -> Arc<dyn PriceEstimator> {
    match &config.pricing {
        PricingStrategy::FlatRate(table) => Arc::new(FlatRateEstimator::new(*table)),
        PricingStrategy::Remote { url } => Arc::new(RemotePriceEstimator::new(
            HttpPriceBackend::new(url.clone()),
            config.price_cache_capacity,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: AtomicUsize,
        response: PriceResponse,
    }

    #[async_trait]
    impl PriceBackend for CountingBackend {
        async fn quote(&self, _request: &QuoteRequest) -> Result<PriceResponse, PricingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn request(distance_km: Option<f64>) -> QuoteRequest {
        QuoteRequest {
            vehicle_class: VehicleClass::Taxi,
            distance_km,
            pickup: Coordinate::new(11.33, 77.71),
            dropoff: Coordinate::new(11.02, 77.01),
            stop: None,
            return_trip: false,
        }
    }

    #[tokio::test]
    async fn flat_rate_requires_a_distance() {
        let estimator = FlatRateEstimator::default();
        assert_eq!(estimator.estimate(&request(Some(10.0))).await.expect("price"), 200.0);
        assert!(matches!(
            estimator.estimate(&request(None)).await,
            Err(PricingError::MissingDistance)
        ));
    }

    #[tokio::test]
    async fn remote_quotes_are_cached() {
        let estimator = RemotePriceEstimator::new(
            CountingBackend {
                calls: AtomicUsize::new(0),
                response: PriceResponse {
                    success: true,
                    price: Some(312.0),
                    message: None,
                },
            },
            8,
        );
        for _ in 0..3 {
            assert_eq!(estimator.estimate(&request(Some(12.3))).await.expect("price"), 312.0);
        }
        assert_eq!(estimator.backend.calls.load(Ordering::SeqCst), 1);

        let mut round_trip = request(Some(12.3));
        round_trip.return_trip = true;
        estimator.estimate(&round_trip).await.expect("price");
        assert_eq!(estimator.backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn declined_and_invalid_prices_are_errors() {
        let declined = RemotePriceEstimator::new(
            CountingBackend {
                calls: AtomicUsize::new(0),
                response: PriceResponse {
                    success: false,
                    price: None,
                    message: Some("outside service area".to_string()),
                },
            },
            8,
        );
        assert!(matches!(
            declined.estimate(&request(Some(3.0))).await,
            Err(PricingError::Declined(message)) if message == "outside service area"
        ));

        let invalid = RemotePriceEstimator::new(
            CountingBackend {
                calls: AtomicUsize::new(0),
                response: PriceResponse {
                    success: true,
                    price: Some(-4.0),
                    message: None,
                },
            },
            8,
        );
        assert!(matches!(
            invalid.estimate(&request(Some(3.0))).await,
            Err(PricingError::InvalidPrice)
        ));
    }
}
