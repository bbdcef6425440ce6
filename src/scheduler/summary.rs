//! Observability snapshot of a running scheduler.

use serde::Serialize;

use crate::module::ModuleSummary;
use crate::scheduler::args::{DataArgs, RequestArgs};

/// Point-in-time view of the scheduler: status, configuration, per-module
/// counters, and the size of the seen-URL set.
#[derive(Debug, Clone, Serialize)]
pub struct SchedSummary {
    pub status: String,
    pub request_args: RequestArgs,
    pub data_args: DataArgs,
    pub downloaders: Vec<ModuleSummary>,
    pub analyzers: Vec<ModuleSummary>,
    pub pipelines: Vec<ModuleSummary>,
    pub seen_url_count: usize,
}

impl SchedSummary {
    /// Pretty-printed JSON rendering.
    pub fn to_json_string_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for SchedSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_json_string_pretty() {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "SchedSummary(status: {})", self.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_as_json() {
        let summary = SchedSummary {
            status: "started".into(),
            request_args: RequestArgs::new(vec!["a.test".into()], 2),
            data_args: DataArgs::default(),
            downloaders: Vec::new(),
            analyzers: Vec::new(),
            pipelines: Vec::new(),
            seen_url_count: 3,
        };
        let rendered = summary.to_string();
        assert!(rendered.contains("\"status\": \"started\""));
        assert!(rendered.contains("\"seen_url_count\": 3"));
    }
}
