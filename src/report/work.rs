//! The unit of work fanned out per dealership.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::dealership::{DealershipData, DealershipInfo, DealershipService};
use crate::error::Result;
use crate::model::Work;

/// Fetches one dealership's data; the result is readable once it succeeds.
///
/// The item may be enqueued again after succeeding. Each success replaces the
/// stored figures, and a failed attempt keeps the last good ones.
pub struct FetchDealershipWork {
    info: DealershipInfo,
    service: Arc<dyn DealershipService>,
    data: RwLock<Option<DealershipData>>,
}

impl FetchDealershipWork {
    pub fn new(info: DealershipInfo, service: Arc<dyn DealershipService>) -> Self {
        Self {
            info,
            service,
            data: RwLock::new(None),
        }
    }

    pub fn info(&self) -> &DealershipInfo {
        &self.info
    }

    /// Figures from the latest successful `process` call, if any.
    pub fn data(&self) -> Option<DealershipData> {
        self.data.read().clone()
    }
}

impl Work for FetchDealershipWork {
    fn process(&self) -> Result<()> {
        let data = self
            .service
            .get_dealership_data(&self.info.id, &self.info.endpoint)?;
        *self.data.write() = Some(data);
        Ok(())
    }
}

impl fmt::Display for FetchDealershipWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch dealership {} ({})", self.info.id, self.info.endpoint)
    }
}
