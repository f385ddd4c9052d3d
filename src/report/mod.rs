//! Dealership reporting: fans one fetch per dealership out over a
//! [`WorkerQueue`](crate::engine::WorkerQueue), retries failures, and ranks
//! the collected results.

pub mod dealership;
pub mod service;
pub mod source;
pub mod work;

pub use dealership::{DealershipData, DealershipInfo, DealershipService, SimulatedDealershipService};
pub use service::{DrainMode, ReportConfig, ReportsService};
pub use source::{DealershipSource, FileDealershipSource, MAX_DEALERSHIPS, StaticDealershipSource};
pub use work::FetchDealershipWork;
