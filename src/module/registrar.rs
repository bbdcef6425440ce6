//! Component registry with load-aware selection.
//!
//! The [`Registrar`] files modules into one bucket per [`ModuleType`] and
//! hands out the least-loaded instance of a kind. Before each selection,
//! every candidate's score is refreshed through its own calculator, so
//! selection tracks live counter state. A single reader-writer lock guards
//! the buckets: selection takes the read lock (the hot path), registration
//! happens only during scheduler initialization.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::module::mid::Mid;
use crate::module::{Analyzer, Downloader, Module, ModuleSummary, ModuleType, Pipeline};

#[derive(Default)]
struct Buckets {
    downloaders: HashMap<Mid, Arc<dyn Downloader>>,
    analyzers: HashMap<Mid, Arc<dyn Analyzer>>,
    pipelines: HashMap<Mid, Arc<dyn Pipeline>>,
}

impl Buckets {
    fn contains(&self, mid: &Mid) -> bool {
        self.downloaders.contains_key(mid)
            || self.analyzers.contains_key(mid)
            || self.pipelines.contains_key(mid)
    }
}

/// Registry of downloaders, analyzers, and pipelines.
#[derive(Default)]
pub struct Registrar {
    buckets: RwLock<Buckets>,
}

impl Registrar {
    pub fn new() -> Self {
        Registrar::default()
    }

    pub fn register_downloader(&self, module: Arc<dyn Downloader>) -> Result<()> {
        let mut buckets = self.buckets.write();
        check_registration(&buckets, module.id(), ModuleType::Downloader)?;
        buckets.downloaders.insert(module.id().clone(), module);
        Ok(())
    }

    pub fn register_analyzer(&self, module: Arc<dyn Analyzer>) -> Result<()> {
        let mut buckets = self.buckets.write();
        check_registration(&buckets, module.id(), ModuleType::Analyzer)?;
        buckets.analyzers.insert(module.id().clone(), module);
        Ok(())
    }

    pub fn register_pipeline(&self, module: Arc<dyn Pipeline>) -> Result<()> {
        let mut buckets = self.buckets.write();
        check_registration(&buckets, module.id(), ModuleType::Pipeline)?;
        buckets.pipelines.insert(module.id().clone(), module);
        Ok(())
    }

    /// Removes the module with the given ID. Returns whether anything was
    /// removed.
    pub fn unregister(&self, mid: &Mid) -> bool {
        let mut buckets = self.buckets.write();
        match mid.module_type() {
            ModuleType::Downloader => buckets.downloaders.remove(mid).is_some(),
            ModuleType::Analyzer => buckets.analyzers.remove(mid).is_some(),
            ModuleType::Pipeline => buckets.pipelines.remove(mid).is_some(),
        }
    }

    /// The registered downloader with the minimum refreshed score.
    pub fn get_downloader(&self) -> Result<Arc<dyn Downloader>> {
        select_min_score(&self.buckets.read().downloaders, ModuleType::Downloader)
    }

    /// The registered analyzer with the minimum refreshed score.
    pub fn get_analyzer(&self) -> Result<Arc<dyn Analyzer>> {
        select_min_score(&self.buckets.read().analyzers, ModuleType::Analyzer)
    }

    /// The registered pipeline with the minimum refreshed score.
    pub fn get_pipeline(&self) -> Result<Arc<dyn Pipeline>> {
        select_min_score(&self.buckets.read().pipelines, ModuleType::Pipeline)
    }

    /// All modules of one type.
    pub fn get_all_by_type(&self, mtype: ModuleType) -> Vec<Arc<dyn Module>> {
        let buckets = self.buckets.read();
        match mtype {
            ModuleType::Downloader => buckets
                .downloaders
                .values()
                .map(|m| Arc::clone(m) as Arc<dyn Module>)
                .collect(),
            ModuleType::Analyzer => buckets
                .analyzers
                .values()
                .map(|m| Arc::clone(m) as Arc<dyn Module>)
                .collect(),
            ModuleType::Pipeline => buckets
                .pipelines
                .values()
                .map(|m| Arc::clone(m) as Arc<dyn Module>)
                .collect(),
        }
    }

    /// All registered modules across types.
    pub fn get_all(&self) -> Vec<Arc<dyn Module>> {
        let buckets = self.buckets.read();
        buckets
            .downloaders
            .values()
            .map(|m| Arc::clone(m) as Arc<dyn Module>)
            .chain(
                buckets
                    .analyzers
                    .values()
                    .map(|m| Arc::clone(m) as Arc<dyn Module>),
            )
            .chain(
                buckets
                    .pipelines
                    .values()
                    .map(|m| Arc::clone(m) as Arc<dyn Module>),
            )
            .collect()
    }

    /// Observability snapshots for all modules of one type, sorted by ID.
    pub fn summaries(&self, mtype: ModuleType) -> Vec<ModuleSummary> {
        let mut summaries: Vec<ModuleSummary> = self
            .get_all_by_type(mtype)
            .iter()
            .map(|m| m.summary())
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Registered module counts per type: (downloaders, analyzers,
    /// pipelines).
    pub fn module_counts(&self) -> (usize, usize, usize) {
        let buckets = self.buckets.read();
        (
            buckets.downloaders.len(),
            buckets.analyzers.len(),
            buckets.pipelines.len(),
        )
    }

    /// Removes every registration.
    pub fn clear(&self) {
        let mut buckets = self.buckets.write();
        buckets.downloaders.clear();
        buckets.analyzers.clear();
        buckets.pipelines.clear();
    }
}

fn check_registration(buckets: &Buckets, mid: &Mid, expected: ModuleType) -> Result<()> {
    if mid.module_type() != expected {
        return Err(Error::illegal_parameter(format!(
            "module type mismatch: ID {mid} is not a {expected}"
        )));
    }
    if buckets.contains(mid) {
        return Err(Error::illegal_parameter(format!(
            "module ID is already registered: {mid}"
        )));
    }
    Ok(())
}

/// Refreshes every candidate's score through its calculator and returns
/// the minimum; ties are broken arbitrarily.
fn select_min_score<M: Module + ?Sized>(
    bucket: &HashMap<Mid, Arc<M>>,
    mtype: ModuleType,
) -> Result<Arc<M>> {
    let mut best: Option<&Arc<M>> = None;
    let mut min_score = u64::MAX;
    for module in bucket.values() {
        let score = (module.score_calculator())(module.counts());
        module.set_score(score);
        if score < min_score || best.is_none() {
            min_score = score;
            best = Some(module);
        }
    }
    best.cloned()
        .ok_or_else(|| Error::NotFound(format!("no {mtype} module registered")))
}
