//! A "prelude" for users of the `webcrawler` crate.
//!
//! Re-exports the types needed to configure and drive a crawl.
//!
//! # Example
//!
//! ```
//! use webcrawler::prelude::*;
//! ```

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::module::{
    Analyzer, DataItem, Downloader, FieldValue, Item, Mid, Module, ModuleType, ParseResponse,
    Pipeline, ProcessItem, ReplayableResponse, Request, Response,
};
pub use crate::scheduler::{
    DataArgs, ModuleArgs, RequestArgs, SchedSummary, Scheduler, Status,
};
pub use crate::async_trait;
