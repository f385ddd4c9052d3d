//! Report aggregation over a worker queue.
//!
//! Protocol with the queue: enqueue one fetch per dealership, wait until the
//! backlog and processing sets are empty, requeue whatever failed, and repeat
//! until nothing failed or the round limit is hit.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::dealership::{DealershipData, DealershipService, validate_request};
use super::source::DealershipSource;
use super::work::FetchDealershipWork;
use crate::config::{DEFAULT_MAX_ROUNDS, DEFAULT_WORKERS};
use crate::engine::WorkerQueue;
use crate::error::{Error, Result};
use crate::model::WorkRef;
use crate::telemetry::metrics;

/// How the aggregator waits for a round to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainMode {
    /// Block on the queue's idle signal.
    #[default]
    Block,
    /// Poll `status()` every `interval` until drained.
    Poll { interval: Duration },
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub worker_count: usize,
    /// `None` retries until every fetch has succeeded.
    pub max_rounds: Option<u32>,
    pub drain: DrainMode,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKERS,
            max_rounds: Some(DEFAULT_MAX_ROUNDS),
            drain: DrainMode::Block,
        }
    }
}

pub struct ReportsService {
    source: Arc<dyn DealershipSource>,
    service: Arc<dyn DealershipService>,
    config: ReportConfig,
}

impl ReportsService {
    pub fn new(
        source: Arc<dyn DealershipSource>,
        service: Arc<dyn DealershipService>,
        config: ReportConfig,
    ) -> Self {
        Self {
            source,
            service,
            config,
        }
    }

    /// Dealerships ordered by total sales, best first.
    pub fn top_performing_dealerships(&self, limit: Option<usize>) -> Result<Vec<DealershipData>> {
        let mut data = self.collect("top_performing")?;
        data.sort_by(|a, b| {
            b.total_sales
                .cmp(&a.total_sales)
                .then_with(|| a.dealership_identifier.cmp(&b.dealership_identifier))
        });
        if let Some(limit) = limit {
            data.truncate(limit);
        }
        Ok(data)
    }

    /// Dealerships with at most `threshold` cars in stock, lowest first.
    pub fn low_stock_dealerships(&self, threshold: u32) -> Result<Vec<DealershipData>> {
        let mut data = self.collect("low_stock")?;
        data.retain(|d| d.available_stock <= threshold);
        data.sort_by(|a, b| {
            a.available_stock
                .cmp(&b.available_stock)
                .then_with(|| a.dealership_identifier.cmp(&b.dealership_identifier))
        });
        Ok(data)
    }

    /// Fetch every dealership's data through a fresh worker queue.
    ///
    /// Dealerships still failing after the last round are left out.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if any dealership has a blank id or endpoint,
    /// `InvalidConfiguration` for a bad worker count or a zero round limit.
    pub fn collect(&self, report: &'static str) -> Result<Vec<DealershipData>> {
        if self.config.max_rounds == Some(0) {
            return Err(Error::InvalidConfiguration(
                "max rounds must be at least 1".to_string(),
            ));
        }

        let dealerships = self.source.load()?;
        // Bad entries would fail every round; reject them before any fetch.
        for info in &dealerships {
            validate_request(&info.id, &info.endpoint)?;
        }
        if dealerships.is_empty() {
            info!(report, "no dealerships to report on");
            return Ok(Vec::new());
        }

        let queue = WorkerQueue::new(self.config.worker_count)?;

        let results = Arc::new(Mutex::new(Vec::with_capacity(dealerships.len())));
        let sink = Arc::clone(&results);
        queue.on_succeeded(move |event| {
            let fetched = event
                .work
                .downcast_ref::<FetchDealershipWork>()
                .and_then(FetchDealershipWork::data);
            if let Some(data) = fetched {
                sink.lock().push(data);
            }
        });
        queue.on_failed(|event| {
            let dealership = event
                .work
                .downcast_ref::<FetchDealershipWork>()
                .map(|work| work.info().id.as_str())
                .unwrap_or_default();
            warn!(
                worker = %event.worker,
                dealership,
                message = %event.message,
                "dealership fetch failed"
            );
        });

        info!(report, dealerships = dealerships.len(), "report started");
        for info in dealerships {
            let work = FetchDealershipWork::new(info, Arc::clone(&self.service));
            queue.enqueue(WorkRef::new(work))?;
        }

        self.drain_with_retries(&queue, report);
        queue.shutdown();

        let data = std::mem::take(&mut *results.lock());
        info!(report, collected = data.len(), "report finished");
        Ok(data)
    }

    fn drain_with_retries(&self, queue: &WorkerQueue, report: &'static str) {
        let mut round = 1;
        loop {
            self.wait_for_drain(queue);
            metrics::report_rounds().add(1, &[KeyValue::new("report", report)]);

            let status = queue.status();
            debug!(report, round, counts = %status.counts(), "round drained");
            if status.failed.is_empty() {
                debug!(report, rounds = round, "all dealerships fetched");
                return;
            }
            if self.config.max_rounds.is_some_and(|max| round >= max) {
                warn!(
                    report,
                    rounds = round,
                    failed = status.failed.len(),
                    "giving up on failed dealerships"
                );
                queue.clear_errors();
                return;
            }

            debug!(report, round, failed = status.failed.len(), "requeueing failed dealerships");
            queue.re_add_failed(&status.failed);
            round += 1;
        }
    }

    fn wait_for_drain(&self, queue: &WorkerQueue) {
        match self.config.drain {
            DrainMode::Block => {
                queue.wait_idle(None);
            }
            DrainMode::Poll { interval } => {
                while !queue.status().is_drained() {
                    std::thread::sleep(interval);
                }
            }
        }
    }
}
