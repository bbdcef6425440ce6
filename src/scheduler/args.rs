//! Scheduler configuration.
//!
//! Three argument bundles configure a crawl: [`RequestArgs`] scopes the
//! traversal, [`DataArgs`] sizes the four buffer pools, and [`ModuleArgs`]
//! supplies the component instances. Each bundle self-checks via `check()`
//! before the scheduler accepts it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::module::{Analyzer, Downloader, Pipeline};

/// Traversal scope: which domains to stay on and how deep to go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestArgs {
    /// Primary domains requests may target; requests to other domains are
    /// silently dropped. A seed passed to `start` contributes its own
    /// domain, so the list may be empty.
    pub accepted_domains: Vec<String>,
    /// Maximum crawl depth; seeds are depth 0.
    pub max_depth: u32,
}

impl RequestArgs {
    pub fn new(accepted_domains: Vec<String>, max_depth: u32) -> Self {
        RequestArgs {
            accepted_domains,
            max_depth,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.accepted_domains.iter().any(|d| d.trim().is_empty()) {
            return Err(Error::illegal_parameter(
                "accepted domain entries must be non-empty",
            ));
        }
        Ok(())
    }
}

/// Capacities and growth bounds for the four buffer pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataArgs {
    pub req_buffer_cap: u32,
    pub req_max_buffer_number: u32,
    pub resp_buffer_cap: u32,
    pub resp_max_buffer_number: u32,
    pub item_buffer_cap: u32,
    pub item_max_buffer_number: u32,
    pub error_buffer_cap: u32,
    pub error_max_buffer_number: u32,
}

impl Default for DataArgs {
    fn default() -> Self {
        DataArgs {
            req_buffer_cap: 50,
            req_max_buffer_number: 1000,
            resp_buffer_cap: 50,
            resp_max_buffer_number: 10,
            item_buffer_cap: 50,
            item_max_buffer_number: 100,
            error_buffer_cap: 50,
            error_max_buffer_number: 1,
        }
    }
}

impl DataArgs {
    pub fn check(&self) -> Result<()> {
        let fields = [
            (self.req_buffer_cap, "request buffer capacity"),
            (self.req_max_buffer_number, "max request buffer number"),
            (self.resp_buffer_cap, "response buffer capacity"),
            (self.resp_max_buffer_number, "max response buffer number"),
            (self.item_buffer_cap, "item buffer capacity"),
            (self.item_max_buffer_number, "max item buffer number"),
            (self.error_buffer_cap, "error buffer capacity"),
            (self.error_max_buffer_number, "max error buffer number"),
        ];
        for (value, name) in fields {
            if value == 0 {
                return Err(Error::illegal_parameter(format!("{name} must be >= 1")));
            }
        }
        Ok(())
    }
}

/// The component instances to register for a crawl.
pub struct ModuleArgs {
    pub downloaders: Vec<Arc<dyn Downloader>>,
    pub analyzers: Vec<Arc<dyn Analyzer>>,
    pub pipelines: Vec<Arc<dyn Pipeline>>,
}

impl ModuleArgs {
    pub fn check(&self) -> Result<()> {
        if self.downloaders.is_empty() {
            return Err(Error::illegal_parameter("empty downloader list"));
        }
        if self.analyzers.is_empty() {
            return Err(Error::illegal_parameter("empty analyzer list"));
        }
        if self.pipelines.is_empty() {
            return Err(Error::illegal_parameter("empty pipeline list"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ModuleArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleArgs")
            .field("downloaders", &self.downloaders.len())
            .field("analyzers", &self.analyzers.len())
            .field("pipelines", &self.pipelines.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_args_accept_empty_domain_list() {
        assert!(RequestArgs::new(Vec::new(), 0).check().is_ok());
    }

    #[test]
    fn request_args_reject_blank_entries() {
        let args = RequestArgs::new(vec!["a.test".into(), "  ".into()], 1);
        assert!(args.check().is_err());
    }

    #[test]
    fn data_args_require_every_field() {
        assert!(DataArgs::default().check().is_ok());
        let mut args = DataArgs::default();
        args.error_max_buffer_number = 0;
        let err = args.check().unwrap_err();
        assert!(matches!(err, Error::IllegalParameter(_)));
    }

    #[test]
    fn module_args_require_every_kind() {
        let args = ModuleArgs {
            downloaders: Vec::new(),
            analyzers: Vec::new(),
            pipelines: Vec::new(),
        };
        assert!(args.check().is_err());
    }

    #[test]
    fn data_args_serde_round_trip() {
        let args = DataArgs::default();
        let json = serde_json::to_string(&args).unwrap();
        let back: DataArgs = serde_json::from_str(&json).unwrap();
        assert_eq!(args, back);
    }
}
