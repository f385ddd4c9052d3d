//! Integration tests for the dealership report aggregator.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bgqueue::error::{Error, Result};
use bgqueue::model::Work;
use bgqueue::report::*;
use parking_lot::Mutex;

/// Deterministic service: each id fails a configured number of times first.
/// Sales are `id * 1000`, stock is `id % 7`.
#[derive(Default)]
struct ScriptedService {
    failures_left: Mutex<HashMap<String, u32>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedService {
    fn failing(plan: &[(&str, u32)]) -> Self {
        Self {
            failures_left: Mutex::new(
                plan.iter()
                    .map(|(id, n)| (id.to_string(), *n))
                    .collect(),
            ),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls(&self, id: &str) -> u32 {
        self.calls.lock().get(id).copied().unwrap_or(0)
    }
}

impl DealershipService for ScriptedService {
    fn get_dealership_data(&self, id: &str, endpoint: &str) -> Result<DealershipData> {
        *self.calls.lock().entry(id.to_string()).or_default() += 1;

        if let Some(left) = self.failures_left.lock().get_mut(id) {
            if *left > 0 {
                *left -= 1;
                return Err(Error::WorkFailure(format!("{endpoint} unavailable")));
            }
        }

        let n: u64 = id.parse().expect("numeric id");
        Ok(DealershipData {
            dealership_identifier: id.to_string(),
            total_sales: n * 1000,
            available_stock: (n % 7) as u32,
        })
    }
}

fn dealerships(n: usize) -> StaticDealershipSource {
    StaticDealershipSource(
        (1..=n)
            .map(|i| DealershipInfo::new(i.to_string(), format!("http://dealer{i}.test")))
            .collect(),
    )
}

fn reports(
    source: StaticDealershipSource,
    service: Arc<ScriptedService>,
    config: ReportConfig,
) -> ReportsService {
    ReportsService::new(Arc::new(source), service, config)
}

fn config(workers: usize) -> ReportConfig {
    ReportConfig {
        worker_count: workers,
        ..ReportConfig::default()
    }
}

fn ids(data: &[DealershipData]) -> Vec<&str> {
    data.iter().map(|d| d.dealership_identifier.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Collection and retries
// ---------------------------------------------------------------------------

#[test]
fn collects_every_dealership_after_retrying_failures() {
    let service = Arc::new(ScriptedService::failing(&[("2", 1), ("5", 3)]));
    let reports = reports(dealerships(8), Arc::clone(&service), config(3));

    let mut data = reports.collect("test").unwrap();
    data.sort_by_key(|d| d.total_sales);

    assert_eq!(ids(&data), vec!["1", "2", "3", "4", "5", "6", "7", "8"]);
    assert_eq!(service.calls("2"), 2);
    assert_eq!(service.calls("5"), 4);
    assert_eq!(service.calls("1"), 1);
}

#[test]
fn polling_drain_collects_the_same_results() {
    let service = Arc::new(ScriptedService::failing(&[("3", 2)]));
    let reports = reports(
        dealerships(5),
        service,
        ReportConfig {
            worker_count: 2,
            max_rounds: None,
            drain: DrainMode::Poll {
                interval: Duration::from_millis(1),
            },
        },
    );

    let data = reports.collect("test").unwrap();
    assert_eq!(data.len(), 5);
}

#[test]
fn gives_up_after_max_rounds() {
    let service = Arc::new(ScriptedService::failing(&[("4", u32::MAX)]));
    let reports = reports(
        dealerships(4),
        Arc::clone(&service),
        ReportConfig {
            worker_count: 2,
            max_rounds: Some(3),
            drain: DrainMode::Block,
        },
    );

    let data = reports.collect("test").unwrap();
    assert_eq!(data.len(), 3);
    assert!(!ids(&data).contains(&"4"));
    assert_eq!(service.calls("4"), 3);
}

#[test]
fn empty_dealership_list_yields_empty_report() {
    let reports = reports(
        StaticDealershipSource::default(),
        Arc::new(ScriptedService::default()),
        config(2),
    );
    assert!(reports.top_performing_dealerships(None).unwrap().is_empty());
}

#[test]
fn invalid_worker_count_is_reported() {
    let reports = reports(dealerships(2), Arc::new(ScriptedService::default()), config(0));
    let result = reports.collect("test");
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[test]
fn zero_max_rounds_is_rejected() {
    let reports = reports(
        dealerships(2),
        Arc::new(ScriptedService::default()),
        ReportConfig {
            max_rounds: Some(0),
            ..config(2)
        },
    );
    assert!(matches!(
        reports.collect("test"),
        Err(Error::InvalidConfiguration(_))
    ));
}

#[test]
fn blank_dealership_is_rejected_before_any_fetch() {
    let service = Arc::new(ScriptedService::default());
    let source = StaticDealershipSource(vec![
        DealershipInfo::new("  ", "http://blank.test"),
        DealershipInfo::new("1", "http://dealer1.test"),
    ]);
    let reports = reports(
        source,
        Arc::clone(&service),
        ReportConfig {
            max_rounds: None,
            ..config(2)
        },
    );

    assert!(matches!(
        reports.collect("test"),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(service.calls("1"), 0);
    assert_eq!(service.calls("  "), 0);
}

#[test]
fn blank_endpoint_is_rejected() {
    let reports = reports(
        StaticDealershipSource(vec![DealershipInfo::new("1", " ")]),
        Arc::new(ScriptedService::default()),
        config(1),
    );
    assert!(matches!(
        reports.collect("test"),
        Err(Error::InvalidArgument(_))
    ));
}

// ---------------------------------------------------------------------------
// Rankings
// ---------------------------------------------------------------------------

#[test]
fn top_performing_is_sorted_by_sales_and_limited() {
    let reports = reports(dealerships(10), Arc::new(ScriptedService::default()), config(4));

    let top = reports.top_performing_dealerships(Some(3)).unwrap();
    assert_eq!(ids(&top), vec!["10", "9", "8"]);
}

#[test]
fn low_stock_filters_by_threshold_lowest_first() {
    let reports = reports(dealerships(10), Arc::new(ScriptedService::default()), config(4));

    // stock = id % 7: 1,2,3,4,5,6,0,1,2,3
    let low = reports.low_stock_dealerships(1).unwrap();
    assert_eq!(ids(&low), vec!["7", "1", "8"]);
    assert!(low.iter().all(|d| d.available_stock <= 1));
}

// ---------------------------------------------------------------------------
// Work and service
// ---------------------------------------------------------------------------

#[test]
fn fetch_work_exposes_data_only_after_success() {
    let service = Arc::new(ScriptedService::failing(&[("9", 1)]));
    let work = FetchDealershipWork::new(DealershipInfo::new("9", "http://nine.test"), service);

    assert!(work.process().is_err());
    assert!(work.data().is_none());

    work.process().unwrap();
    assert_eq!(work.data().unwrap().total_sales, 9000);
    assert_eq!(work.info().id, "9");
    assert_eq!(work.to_string(), "fetch dealership 9 (http://nine.test)");
}

/// Reports one more sale on every call.
#[derive(Default)]
struct GrowingService {
    calls: Mutex<u64>,
}

impl DealershipService for GrowingService {
    fn get_dealership_data(&self, id: &str, _endpoint: &str) -> Result<DealershipData> {
        let mut calls = self.calls.lock();
        *calls += 1;
        Ok(DealershipData {
            dealership_identifier: id.to_string(),
            total_sales: *calls,
            available_stock: 1,
        })
    }
}

#[test]
fn repeated_fetch_keeps_the_latest_figures() {
    let work = FetchDealershipWork::new(
        DealershipInfo::new("7", "http://seven.test"),
        Arc::new(GrowingService::default()),
    );

    work.process().unwrap();
    assert_eq!(work.data().unwrap().total_sales, 1);
    work.process().unwrap();
    assert_eq!(work.data().unwrap().total_sales, 2);
}

#[test]
fn failed_refetch_keeps_the_last_good_figures() {
    let service = Arc::new(ScriptedService::default());
    let work = FetchDealershipWork::new(
        DealershipInfo::new("3", "http://three.test"),
        Arc::clone(&service) as Arc<dyn DealershipService>,
    );

    work.process().unwrap();
    *service.failures_left.lock().entry("3".to_string()).or_default() = 1;
    assert!(work.process().is_err());
    assert_eq!(work.data().unwrap().total_sales, 3000);
}

#[test]
fn simulated_service_rejects_blank_arguments() {
    let service = SimulatedDealershipService {
        latency_ms: 0..0,
        failure_rate: 0.0,
    };
    assert!(matches!(
        service.get_dealership_data("  ", "http://x.test"),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        service.get_dealership_data("1", ""),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn simulated_service_respects_failure_rate_and_ranges() {
    let reliable = SimulatedDealershipService {
        latency_ms: 0..0,
        failure_rate: 0.0,
    };
    for _ in 0..20 {
        let data = reliable.get_dealership_data("d1", "http://d1.test").unwrap();
        assert_eq!(data.dealership_identifier, "d1");
        assert!((125_000..15_000_000).contains(&data.total_sales));
        assert!(data.available_stock < 50);
    }

    let broken = SimulatedDealershipService {
        latency_ms: 0..0,
        failure_rate: 1.0,
    };
    assert!(matches!(
        broken.get_dealership_data("d1", "http://d1.test"),
        Err(Error::WorkFailure(_))
    ));
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[test]
fn file_source_skips_blanks_and_comments() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# id,endpoint").unwrap();
    writeln!(file, "a1, http://a1.test").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "b2,http://b2.test").unwrap();

    let loaded = FileDealershipSource::new(file.path()).load().unwrap();
    assert_eq!(
        loaded,
        vec![
            DealershipInfo::new("a1", "http://a1.test"),
            DealershipInfo::new("b2", "http://b2.test"),
        ]
    );
}

#[test]
fn file_source_rejects_malformed_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "a1,http://a1.test").unwrap();
    writeln!(file, "no-endpoint-here").unwrap();

    let err = FileDealershipSource::new(file.path()).load().unwrap_err();
    match err {
        Error::InvalidArgument(msg) => assert!(msg.contains("line 2"), "{msg}"),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

#[test]
fn file_source_caps_the_list() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..(MAX_DEALERSHIPS + 20) {
        writeln!(file, "d{i},http://d{i}.test").unwrap();
    }

    let loaded = FileDealershipSource::new(file.path()).load().unwrap();
    assert_eq!(loaded.len(), MAX_DEALERSHIPS);
}

#[test]
fn missing_file_is_an_io_error() {
    let result = FileDealershipSource::new("/definitely/not/here.txt").load();
    assert!(matches!(result, Err(Error::Io(_))));
}
