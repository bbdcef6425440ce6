//! # webcrawler
//!
//! A generic web-crawling engine built around a pluggable three-stage
//! pipeline — downloader, analyzer, pipeline — coordinated by a central
//! [`Scheduler`] that supplies admission control, depth-bounded traversal,
//! deduplication, and backpressure through elastic buffer pools.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use webcrawler::prelude::*;
//! use webcrawler::module::analyzer::ParserAnalyzer;
//! use webcrawler::module::downloader::HttpDownloader;
//! use webcrawler::module::pipeline::ProcessorPipeline;
//!
//! #[tokio::main]
//! async fn main() -> webcrawler::Result<()> {
//!     let downloader = HttpDownloader::new(
//!         Mid::generate(ModuleType::Downloader, None),
//!         reqwest::Client::new(),
//!         None,
//!     );
//!     let analyzer = ParserAnalyzer::new(
//!         Mid::generate(ModuleType::Analyzer, None),
//!         vec![my_link_parser()],
//!         None,
//!     )?;
//!     let pipeline = ProcessorPipeline::new(
//!         Mid::generate(ModuleType::Pipeline, None),
//!         vec![my_item_writer()],
//!         None,
//!     )?;
//!
//!     let scheduler = Scheduler::new();
//!     scheduler.init(
//!         RequestArgs::new(vec![], 3),
//!         DataArgs::default(),
//!         ModuleArgs {
//!             downloaders: vec![Arc::new(downloader)],
//!             analyzers: vec![Arc::new(analyzer)],
//!             pipelines: vec![Arc::new(pipeline)],
//!         },
//!     )?;
//!     let errors = scheduler.error_chan()?;
//!     scheduler.start(Some(Request::new("https://example.com".parse()?, 0)))?;
//!     while let Ok(err) = errors.recv().await {
//!         eprintln!("{err}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod cmap;
pub mod domain;
pub mod error;
pub mod module;
pub mod pool;
pub mod prelude;
pub mod reader;
pub mod scheduler;

pub use buffer::Buffer;
pub use cmap::CMap;
pub use error::{Error, ErrorKind, Result};
pub use module::{
    Analyzer, DataItem, Downloader, Item, Mid, Module, ModuleType, Pipeline, Request, Response,
};
pub use pool::Pool;
pub use reader::MultiReader;
pub use scheduler::{DataArgs, ModuleArgs, RequestArgs, SchedSummary, Scheduler, Status};

pub use async_trait::async_trait;
pub use tokio;
