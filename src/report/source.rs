//! Where the list of dealerships comes from.

use std::path::PathBuf;

use tracing::{debug, warn};

use super::dealership::DealershipInfo;
use crate::error::{Error, Result};

/// Upper bound on dealerships per report; extra entries are dropped.
pub const MAX_DEALERSHIPS: usize = 100;

pub trait DealershipSource: Send + Sync {
    fn load(&self) -> Result<Vec<DealershipInfo>>;
}

/// An in-memory list, mostly for tests and synthetic runs.
#[derive(Debug, Clone, Default)]
pub struct StaticDealershipSource(pub Vec<DealershipInfo>);

impl DealershipSource for StaticDealershipSource {
    fn load(&self) -> Result<Vec<DealershipInfo>> {
        Ok(self.0.iter().take(MAX_DEALERSHIPS).cloned().collect())
    }
}

/// A text file with one `id,endpoint` per line.
///
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct FileDealershipSource {
    pub path: PathBuf,
}

impl FileDealershipSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DealershipSource for FileDealershipSource {
    fn load(&self) -> Result<Vec<DealershipInfo>> {
        let content = std::fs::read_to_string(&self.path)?;
        let dealerships = parse_dealerships(&content)?;
        debug!(
            path = %self.path.display(),
            count = dealerships.len(),
            "dealership list loaded"
        );
        Ok(dealerships)
    }
}

pub(crate) fn parse_dealerships(content: &str) -> Result<Vec<DealershipInfo>> {
    let mut dealerships = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if dealerships.len() == MAX_DEALERSHIPS {
            warn!(max = MAX_DEALERSHIPS, "dealership list truncated");
            break;
        }

        let line_no = index + 1;
        let Some((id, endpoint)) = line.split_once(',') else {
            return Err(Error::InvalidArgument(format!(
                "line {line_no}: expected `id,endpoint`, got {line:?}"
            )));
        };
        let (id, endpoint) = (id.trim(), endpoint.trim());
        if id.is_empty() || endpoint.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "line {line_no}: id and endpoint must both be present"
            )));
        }
        dealerships.push(DealershipInfo::new(id, endpoint));
    }

    Ok(dealerships)
}
