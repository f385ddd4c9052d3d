//! Dealership records and the remote service that serves them.

use std::ops::Range;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where to fetch one dealership's data from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealershipInfo {
    pub id: String,
    pub endpoint: String,
}

impl DealershipInfo {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Figures reported by one dealership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealershipData {
    pub dealership_identifier: String,
    pub total_sales: u64,
    /// Cars still in stock.
    pub available_stock: u32,
}

/// Fetches a dealership's data from its endpoint. Blocking.
pub trait DealershipService: Send + Sync {
    /// # Errors
    ///
    /// `InvalidArgument` for a blank id or endpoint; any other error means the
    /// fetch failed and may be retried.
    fn get_dealership_data(&self, id: &str, endpoint: &str) -> Result<DealershipData>;
}

pub(crate) fn validate_request(id: &str, endpoint: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "dealership identifier must not be empty or whitespace".to_string(),
        ));
    }
    if endpoint.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "dealership endpoint must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Stand-in for the remote service: random latency, random failures,
/// random figures.
#[derive(Debug, Clone)]
pub struct SimulatedDealershipService {
    /// Latency range in milliseconds.
    pub latency_ms: Range<u64>,
    /// Probability in `[0, 1]` that a call fails.
    pub failure_rate: f64,
}

impl Default for SimulatedDealershipService {
    fn default() -> Self {
        Self {
            latency_ms: 100..2000,
            failure_rate: 0.25,
        }
    }
}

impl DealershipService for SimulatedDealershipService {
    fn get_dealership_data(&self, id: &str, endpoint: &str) -> Result<DealershipData> {
        validate_request(id, endpoint)?;

        let mut rng = rand::thread_rng();
        if !self.latency_ms.is_empty() {
            std::thread::sleep(Duration::from_millis(
                rng.gen_range(self.latency_ms.clone()),
            ));
        }

        if rng.gen_bool(self.failure_rate.clamp(0.0, 1.0)) {
            return Err(Error::WorkFailure(format!(
                "failed to connect to service: {endpoint}"
            )));
        }

        Ok(DealershipData {
            dealership_identifier: id.to_string(),
            total_sales: rng.gen_range(125_000..15_000_000),
            available_stock: rng.gen_range(0..50),
        })
    }
}
