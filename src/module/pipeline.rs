//! Item pipeline driving an ordered list of processors.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::module::base::{CalculateScore, Counts, ModuleBase};
use crate::module::data::Item;
use crate::module::mid::Mid;
use crate::module::{Module, ModuleSummary, Pipeline, ProcessItem};

/// A [`Pipeline`] that threads items through its processors in order.
///
/// A processor returning `Ok(Some(item))` replaces the current item for
/// the next step; `Ok(None)` passes the current item through unchanged. On
/// an error the pipeline records it and, when fail-fast is set, skips the
/// remaining processors.
pub struct ProcessorPipeline {
    base: ModuleBase,
    processors: Vec<ProcessItem>,
    fail_fast: AtomicBool,
}

impl std::fmt::Debug for ProcessorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorPipeline")
            .field("base", &self.base)
            .field("processors", &self.processors.len())
            .field("fail_fast", &self.fail_fast)
            .finish()
    }
}

impl ProcessorPipeline {
    /// Creates a pipeline over a non-empty processor list. Fail-fast
    /// starts disabled.
    pub fn new(
        mid: Mid,
        processors: Vec<ProcessItem>,
        calculator: Option<CalculateScore>,
    ) -> Result<Self> {
        if processors.is_empty() {
            return Err(Error::illegal_parameter("empty item processor list"));
        }
        Ok(ProcessorPipeline {
            base: ModuleBase::new(mid, calculator),
            processors,
            fail_fast: AtomicBool::new(false),
        })
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    pub fn set_fail_fast(&self, fail_fast: bool) {
        self.fail_fast.store(fail_fast, Ordering::Release);
    }
}

impl Module for ProcessorPipeline {
    fn id(&self) -> &Mid {
        self.base.mid()
    }

    fn addr(&self) -> String {
        self.base.addr()
    }

    fn score(&self) -> u64 {
        self.base.score()
    }

    fn set_score(&self, score: u64) {
        self.base.set_score(score)
    }

    fn score_calculator(&self) -> CalculateScore {
        self.base.score_calculator()
    }

    fn counts(&self) -> Counts {
        self.base.counts()
    }

    fn summary(&self) -> ModuleSummary {
        let mut summary = self.base.summary();
        summary.extra = Some(json!({
            "fail_fast": self.fail_fast(),
            "processor_number": self.processors.len(),
        }));
        summary
    }
}

#[async_trait]
impl Pipeline for ProcessorPipeline {
    async fn send(&self, item: Item) -> Vec<Error> {
        let _in_flight = self.base.in_flight_guard();
        self.base.incr_called();
        self.base.incr_accepted();
        debug!(fields = item.len(), "processing item");

        let mut errors = Vec::new();
        let mut current = item;
        for processor in &self.processors {
            match processor(&current) {
                Ok(Some(next)) => current = next,
                Ok(None) => {}
                Err(err) => {
                    errors.push(err);
                    if self.fail_fast() {
                        break;
                    }
                }
            }
        }
        if errors.is_empty() {
            self.base.incr_completed();
        }
        errors
    }

    fn fail_fast(&self) -> bool {
        self.fail_fast.load(Ordering::Acquire)
    }
}
