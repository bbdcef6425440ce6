//! # Module System
//!
//! Defines the plugin surface of the engine: the [`Module`] base trait and
//! the three component contracts — [`Downloader`], [`Analyzer`],
//! [`Pipeline`] — plus their identifiers, shared counters, and the
//! registrar that performs load-aware selection among registered instances.
//!
//! ## Key Components
//!
//! - **Mid**: typed, round-trippable component IDs (`D7|127.0.0.1:80`)
//! - **ModuleBase**: shared counters (`called`/`accepted`/`completed`/
//!   `in_flight`) and the score used for selection
//! - **Registrar**: type-bucketed registry returning the least-loaded
//!   module of a kind
//! - **Concrete modules**: [`HttpDownloader`](downloader::HttpDownloader),
//!   [`ParserAnalyzer`](analyzer::ParserAnalyzer),
//!   [`ProcessorPipeline`](pipeline::ProcessorPipeline)
//!
//! Implementations of the three contracts must be safe for concurrent
//! invocation; the scheduler calls them from multiple tasks.

pub mod analyzer;
pub mod base;
pub mod data;
pub mod downloader;
pub mod mid;
pub mod pipeline;
pub mod registrar;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};

pub use base::{default_score, CalculateScore, Counts, InFlightGuard, ModuleBase};
pub use data::{DataItem, FieldValue, Item, ReplayableResponse, Request, Response};
pub use mid::{default_sn_gen, Mid, SerialGen};

/// The three kinds of pluggable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleType {
    Downloader,
    Analyzer,
    Pipeline,
}

impl ModuleType {
    /// The one-letter tag used in [`Mid`]s.
    pub fn letter(self) -> char {
        match self {
            ModuleType::Downloader => 'D',
            ModuleType::Analyzer => 'A',
            ModuleType::Pipeline => 'P',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'D' => Some(ModuleType::Downloader),
            'A' => Some(ModuleType::Analyzer),
            'P' => Some(ModuleType::Pipeline),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModuleType::Downloader => "downloader",
            ModuleType::Analyzer => "analyzer",
            ModuleType::Pipeline => "pipeline",
        };
        f.write_str(s)
    }
}

/// Per-module observability snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModuleSummary {
    pub id: String,
    pub called: u64,
    pub accepted: u64,
    pub completed: u64,
    pub in_flight: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Base contract shared by all components. Implementations must be safe
/// for concurrent invocation.
pub trait Module: Send + Sync {
    /// The component's ID.
    fn id(&self) -> &Mid;

    /// The component's network address as a string, empty when unset.
    fn addr(&self) -> String;

    /// The current load score; lower is preferred by the registrar.
    fn score(&self) -> u64;

    fn set_score(&self, score: u64);

    fn score_calculator(&self) -> CalculateScore;

    /// Snapshot of all four counters.
    fn counts(&self) -> Counts;

    fn summary(&self) -> ModuleSummary;

    fn called_count(&self) -> u64 {
        self.counts().called
    }

    /// Calls that passed parameter validation; components reject calls
    /// with unusable arguments.
    fn accepted_count(&self) -> u64 {
        self.counts().accepted
    }

    fn completed_count(&self) -> u64 {
        self.counts().completed
    }

    fn in_flight_count(&self) -> u64 {
        self.counts().in_flight
    }
}

/// Fetches content for requests.
#[async_trait]
pub trait Downloader: Module {
    /// Downloads `req` and returns the response at the same depth.
    async fn download(&self, req: Request) -> Result<Response>;
}

/// A pure function applied to a replayable response; returns follow-up
/// data and any parse errors.
pub type ParseResponse =
    Box<dyn Fn(&ReplayableResponse, u32) -> (Vec<DataItem>, Vec<Error>) + Send + Sync>;

/// Splits responses into derived requests and items by running an ordered
/// list of response parsers over the same body.
#[async_trait]
pub trait Analyzer: Module {
    /// Analyzes `resp`, returning all parser outputs and all parser
    /// errors. Derived requests are restamped to `resp.depth() + 1`.
    async fn analyze(&self, resp: Response) -> (Vec<DataItem>, Vec<Error>);
}

/// A single item-processing step. `Ok(Some(item))` replaces the current
/// item for the next processor; `Ok(None)` keeps it unchanged.
pub type ProcessItem = Box<dyn Fn(&Item) -> Result<Option<Item>> + Send + Sync>;

/// Sends items through an ordered list of processors.
#[async_trait]
pub trait Pipeline: Module {
    /// Threads `item` through the processors in order and returns the
    /// accumulated errors; empty means full success.
    async fn send(&self, item: Item) -> Vec<Error>;

    /// Whether processing stops at the first failing processor.
    fn fail_fast(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_round_trip() {
        for mtype in [
            ModuleType::Downloader,
            ModuleType::Analyzer,
            ModuleType::Pipeline,
        ] {
            assert_eq!(ModuleType::from_letter(mtype.letter()), Some(mtype));
        }
        assert_eq!(ModuleType::from_letter('Z'), None);
    }

    #[test]
    fn summary_serializes_without_empty_extra() {
        let summary = ModuleSummary {
            id: "D1".into(),
            called: 2,
            accepted: 1,
            completed: 1,
            in_flight: 0,
            extra: None,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("extra"));
        assert!(json.contains("\"id\":\"D1\""));
    }
}
