//! # Scheduler
//!
//! The scheduler coordinates the whole crawl: it owns the four buffer
//! pools (requests, responses, items, errors), admits requests through a
//! filter chain, and runs one worker loop per pipeline stage — download,
//! analyze, pick — each draining its pool and dispatching to the
//! least-loaded registered module of the matching kind.
//!
//! ## Lifecycle
//!
//! `Uninitialized → init → Initialized → start → Started → stop → Stopped`,
//! with transitional states guarding each edge; a stopped scheduler must
//! be re-initialized before it can start again. Transition legality lives
//! in [`status`], and a failed transition reverts to the prior state.
//!
//! ## Example
//!
//! ```rust,ignore
//! use webcrawler::prelude::*;
//!
//! let scheduler = Scheduler::new();
//! scheduler.init(request_args, data_args, module_args)?;
//! let errors = scheduler.error_chan()?;
//! scheduler.start(Some(Request::new(seed_url, 0)))?;
//! while let Ok(err) = errors.recv().await {
//!     eprintln!("{err}");
//! }
//! ```

pub mod args;
pub mod status;
pub mod summary;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use kanal::AsyncReceiver;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::cmap::CMap;
use crate::domain::primary_domain;
use crate::error::{Error, ErrorKind, Result};
use crate::module::registrar::Registrar;
use crate::module::{DataItem, Item, Mid, ModuleType, Request, Response};
use crate::pool::Pool;

pub use args::{DataArgs, ModuleArgs, RequestArgs};
pub use status::Status;
pub use summary::SchedSummary;

type PoolCell<T> = RwLock<Option<Arc<Pool<T>>>>;

struct Inner {
    max_depth: AtomicU32,
    accepted_domains: CMap<()>,
    url_map: CMap<()>,
    registrar: Registrar,
    req_pool: PoolCell<Request>,
    resp_pool: PoolCell<Response>,
    item_pool: PoolCell<Item>,
    error_pool: PoolCell<Error>,
    cancel: RwLock<CancellationToken>,
    status: RwLock<Status>,
    args: RwLock<Option<(RequestArgs, DataArgs)>>,
}

/// The crawl coordinator. A `Scheduler` is a cheap handle over shared
/// state: clone it freely to hand it to other tasks. Drive the lifecycle
/// with [`init`](Scheduler::init), [`start`](Scheduler::start), and
/// [`stop`](Scheduler::stop).
///
/// Methods that spawn work (`start`, `send_request`, `error_chan`) must be
/// called from within a Tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            inner: Arc::new(Inner {
                max_depth: AtomicU32::new(0),
                accepted_domains: CMap::new(1).expect("concurrency 1 is valid"),
                url_map: CMap::new(num_cpus::get().clamp(1, 16))
                    .expect("clamped concurrency is valid"),
                registrar: Registrar::new(),
                req_pool: RwLock::new(None),
                resp_pool: RwLock::new(None),
                item_pool: RwLock::new(None),
                error_pool: RwLock::new(None),
                cancel: RwLock::new(CancellationToken::new()),
                status: RwLock::new(Status::Uninitialized),
                args: RwLock::new(None),
            }),
        }
    }

    /// Prepares the scheduler for a crawl: validates the arguments,
    /// rebuilds the registrar, domain and URL sets, and the four buffer
    /// pools, resets cancellation, and registers all modules. A
    /// registration refusal is fatal and reverts the status.
    pub fn init(
        &self,
        request_args: RequestArgs,
        data_args: DataArgs,
        module_args: ModuleArgs,
    ) -> Result<()> {
        info!("initializing scheduler");
        let old = self.check_and_set_status(Status::Initializing)?;
        let result = self.init_inner(request_args, data_args, module_args);
        self.finish_transition(old, Status::Initialized, result)
    }

    fn init_inner(
        &self,
        request_args: RequestArgs,
        data_args: DataArgs,
        module_args: ModuleArgs,
    ) -> Result<()> {
        request_args.check()?;
        data_args.check()?;
        module_args.check()?;

        let inner = &self.inner;
        inner.registrar.clear();
        inner
            .max_depth
            .store(request_args.max_depth, Ordering::Release);
        debug!(max_depth = request_args.max_depth, "crawl depth bound set");

        inner.accepted_domains.clear();
        for domain in &request_args.accepted_domains {
            let pd = primary_domain(domain)?;
            inner.accepted_domains.put(pd, ());
        }
        debug!(domains = ?request_args.accepted_domains, "accepted domains set");
        inner.url_map.clear();

        replace_pool(
            &inner.req_pool,
            data_args.req_buffer_cap,
            data_args.req_max_buffer_number,
        )?;
        replace_pool(
            &inner.resp_pool,
            data_args.resp_buffer_cap,
            data_args.resp_max_buffer_number,
        )?;
        replace_pool(
            &inner.item_pool,
            data_args.item_buffer_cap,
            data_args.item_max_buffer_number,
        )?;
        replace_pool(
            &inner.error_pool,
            data_args.error_buffer_cap,
            data_args.error_max_buffer_number,
        )?;

        *inner.cancel.write() = CancellationToken::new();
        *inner.args.write() = Some((request_args, data_args));

        self.register_modules(module_args)?;
        info!("scheduler initialized");
        Ok(())
    }

    fn register_modules(&self, module_args: ModuleArgs) -> Result<()> {
        let (d, a, p) = (
            module_args.downloaders.len(),
            module_args.analyzers.len(),
            module_args.pipelines.len(),
        );
        for downloader in module_args.downloaders {
            self.inner
                .registrar
                .register_downloader(downloader)
                .map_err(|e| Error::scheduler(format!("could not register downloader: {e}")))?;
        }
        for analyzer in module_args.analyzers {
            self.inner
                .registrar
                .register_analyzer(analyzer)
                .map_err(|e| Error::scheduler(format!("could not register analyzer: {e}")))?;
        }
        for pipeline in module_args.pipelines {
            self.inner
                .registrar
                .register_pipeline(pipeline)
                .map_err(|e| Error::scheduler(format!("could not register pipeline: {e}")))?;
        }
        info!(
            downloaders = d,
            analyzers = a,
            pipelines = p,
            "modules registered"
        );
        Ok(())
    }

    /// Starts the crawl. When `first_req` is given, its primary domain is
    /// added to the accepted set and the request itself is admitted at
    /// depth 0 before the worker loops spawn. Further seeds may be
    /// admitted at any time through [`send_request`](Scheduler::send_request).
    pub fn start(&self, first_req: Option<Request>) -> Result<()> {
        info!("starting scheduler");
        let old = self.check_and_set_status(Status::Starting)?;
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.start_inner(first_req)
        }));
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let msg = panic_text(panic.as_ref());
                error!("fatal scheduler error: {msg}");
                Err(Error::scheduler(format!("fatal scheduler error: {msg}")))
            }
        };
        self.finish_transition(old, Status::Started, result)
    }

    fn start_inner(&self, first_req: Option<Request>) -> Result<()> {
        if let Some(req) = first_req {
            let host = req.url().host_str().ok_or_else(|| {
                Error::illegal_parameter(format!("seed URL has no host: {}", req.url()))
            })?;
            let pd = primary_domain(host)?;
            info!(domain = %pd, "accepting seed domain");
            self.inner.accepted_domains.put(pd, ());
            self.send_request(req.at_depth(0));
        }
        self.ensure_pools_open()?;
        self.spawn_download_loop();
        self.spawn_analyze_loop();
        self.spawn_pick_loop();
        info!("scheduler started");
        Ok(())
    }

    /// Fires cancellation and closes every pool. Worker loops terminate on
    /// their next cancellation observation or pool-closed error.
    pub fn stop(&self) -> Result<()> {
        info!("stopping scheduler");
        let old = self.check_and_set_status(Status::Stopping)?;
        let result = self.stop_inner();
        self.finish_transition(old, Status::Stopped, result)
    }

    fn stop_inner(&self) -> Result<()> {
        self.inner.cancel.read().cancel();
        if let Some(pool) = self.req_pool() {
            pool.close();
        }
        if let Some(pool) = self.resp_pool() {
            pool.close();
        }
        if let Some(pool) = self.item_pool() {
            pool.close();
        }
        if let Some(pool) = self.error_pool() {
            pool.close();
        }
        info!("scheduler stopped");
        Ok(())
    }

    pub fn status(&self) -> Status {
        *self.inner.status.read()
    }

    /// Admits a request into the crawl. Requests are silently dropped
    /// (with a warning) when the scheme is not HTTP(S), the URL was seen
    /// before, the host's primary domain is not accepted, or the depth
    /// exceeds the bound. Returns whether the request was admitted.
    pub fn send_request(&self, req: Request) -> bool {
        if self.cancelled() {
            return false;
        }
        let url = req.url();
        let scheme = url.scheme();
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            warn!(%url, scheme, "ignoring request: unsupported scheme");
            return false;
        }
        if self.inner.url_map.contains_key(url.as_str()) {
            warn!(%url, "ignoring request: duplicate URL");
            return false;
        }
        let Some(host) = url.host_str() else {
            warn!(%url, "ignoring request: URL has no host");
            return false;
        };
        let pd = match primary_domain(host) {
            Ok(pd) => pd,
            Err(_) => {
                warn!(%url, host, "ignoring request: invalid host");
                return false;
            }
        };
        if !self.inner.accepted_domains.contains_key(&pd) {
            warn!(%url, domain = %pd, "ignoring request: domain not accepted");
            return false;
        }
        if req.depth() > self.inner.max_depth.load(Ordering::Acquire) {
            warn!(%url, depth = req.depth(), "ignoring request: depth exceeds limit");
            return false;
        }
        let Some(pool) = self.req_pool() else {
            return false;
        };
        // Inserting into the seen set before the enqueue makes the
        // insertion the dedup commit point: two racing admissions of the
        // same URL cannot both pass.
        if self.inner.url_map.put(url.as_str().to_string(), ()).is_some() {
            return false;
        }
        tokio::spawn(async move {
            if pool.put(req).await.is_err() {
                warn!("request buffer pool closed, dropping request");
            }
        });
        true
    }

    /// A stream of every operational error raised by the scheduler and its
    /// modules. The stream closes on cancellation or when the error pool
    /// closes; the caller is expected to drain it.
    pub fn error_chan(&self) -> Result<AsyncReceiver<Error>> {
        let pool = self
            .error_pool()
            .ok_or_else(|| Error::scheduler("error buffer pool is not initialized"))?;
        let cancel = self.cancel_token();
        let (tx, rx) = kanal::bounded_async(pool.buffer_cap() as usize);
        tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                match pool.get().await {
                    Ok(err) => {
                        if cancel.is_cancelled() || tx.send(err).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        warn!("error buffer pool closed, closing error stream");
                        break;
                    }
                }
            }
            // Dropping the sender closes the stream.
        });
        Ok(rx)
    }

    /// True iff no registered module has in-flight work and the request,
    /// response, and item pools are empty. The error pool is deliberately
    /// excluded, and closed pools count as empty.
    pub fn idle(&self) -> bool {
        for module in self.inner.registrar.get_all() {
            if module.counts().in_flight > 0 {
                return false;
            }
        }
        !(pool_busy(&self.inner.req_pool)
            || pool_busy(&self.inner.resp_pool)
            || pool_busy(&self.inner.item_pool))
    }

    /// Observability snapshot. Fails before the first `init`.
    pub fn summary(&self) -> Result<SchedSummary> {
        let (request_args, data_args) = self
            .inner
            .args
            .read()
            .clone()
            .ok_or_else(|| Error::scheduler("scheduler is not initialized"))?;
        Ok(SchedSummary {
            status: self.status().name().to_string(),
            request_args,
            data_args,
            downloaders: self.inner.registrar.summaries(ModuleType::Downloader),
            analyzers: self.inner.registrar.summaries(ModuleType::Analyzer),
            pipelines: self.inner.registrar.summaries(ModuleType::Pipeline),
            seen_url_count: self.inner.url_map.len(),
        })
    }

    fn check_and_set_status(&self, wanted: Status) -> Result<Status> {
        let mut current = self.inner.status.write();
        status::check_status(*current, wanted)?;
        let old = *current;
        *current = wanted;
        Ok(old)
    }

    /// Commits `on_success` or reverts to `old`, passing the result
    /// through.
    fn finish_transition(&self, old: Status, on_success: Status, result: Result<()>) -> Result<()> {
        let mut current = self.inner.status.write();
        match result {
            Ok(()) => {
                *current = on_success;
                Ok(())
            }
            Err(err) => {
                *current = old;
                Err(err)
            }
        }
    }

    fn ensure_pools_open(&self) -> Result<()> {
        reopen_if_closed(&self.inner.req_pool, "request")?;
        reopen_if_closed(&self.inner.resp_pool, "response")?;
        reopen_if_closed(&self.inner.item_pool, "item")?;
        reopen_if_closed(&self.inner.error_pool, "error")?;
        Ok(())
    }

    fn spawn_download_loop(&self) {
        let Some(pool) = self.req_pool() else { return };
        let cancel = self.cancel_token();
        let sched = self.clone();
        tokio::spawn(async move {
            trace!("download loop started");
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let req = match pool.get().await {
                    Ok(req) => req,
                    Err(_) => {
                        warn!("request buffer pool closed, download loop exiting");
                        break;
                    }
                };
                if cancel.is_cancelled() {
                    break;
                }
                sched.download_one(req).await;
            }
            trace!("download loop finished");
        });
    }

    async fn download_one(&self, req: Request) {
        let downloader = match self.inner.registrar.get_downloader() {
            Ok(downloader) => downloader,
            Err(err) => {
                self.send_error(
                    None,
                    Error::scheduler(format!("could not get a downloader: {err}")),
                );
                self.send_request(req);
                return;
            }
        };
        let mid = downloader.id().clone();
        match downloader.download(req).await {
            Ok(resp) => {
                self.send_resp(resp);
            }
            Err(err) => {
                self.send_error(Some(&mid), err);
            }
        }
    }

    fn spawn_analyze_loop(&self) {
        let Some(pool) = self.resp_pool() else { return };
        let cancel = self.cancel_token();
        let sched = self.clone();
        tokio::spawn(async move {
            trace!("analyze loop started");
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let resp = match pool.get().await {
                    Ok(resp) => resp,
                    Err(_) => {
                        warn!("response buffer pool closed, analyze loop exiting");
                        break;
                    }
                };
                if cancel.is_cancelled() {
                    break;
                }
                sched.analyze_one(resp).await;
            }
            trace!("analyze loop finished");
        });
    }

    async fn analyze_one(&self, resp: Response) {
        let analyzer = match self.inner.registrar.get_analyzer() {
            Ok(analyzer) => analyzer,
            Err(err) => {
                self.send_error(
                    None,
                    Error::scheduler(format!("could not get an analyzer: {err}")),
                );
                self.send_resp(resp);
                return;
            }
        };
        let mid = analyzer.id().clone();
        let (data, errors) = analyzer.analyze(resp).await;
        for datum in data {
            match datum {
                DataItem::Request(req) => {
                    self.send_request(req);
                }
                DataItem::Item(item) => {
                    self.send_item(item);
                }
            }
        }
        for err in errors {
            self.send_error(Some(&mid), err);
        }
    }

    fn spawn_pick_loop(&self) {
        let Some(pool) = self.item_pool() else { return };
        let cancel = self.cancel_token();
        let sched = self.clone();
        tokio::spawn(async move {
            trace!("pick loop started");
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let item = match pool.get().await {
                    Ok(item) => item,
                    Err(_) => {
                        warn!("item buffer pool closed, pick loop exiting");
                        break;
                    }
                };
                if cancel.is_cancelled() {
                    break;
                }
                sched.pick_one(item).await;
            }
            trace!("pick loop finished");
        });
    }

    async fn pick_one(&self, item: Item) {
        let pipeline = match self.inner.registrar.get_pipeline() {
            Ok(pipeline) => pipeline,
            Err(err) => {
                self.send_error(
                    None,
                    Error::scheduler(format!("could not get a pipeline: {err}")),
                );
                self.send_item(item);
                return;
            }
        };
        let mid = pipeline.id().clone();
        for err in pipeline.send(item).await {
            self.send_error(Some(&mid), err);
        }
    }

    fn send_resp(&self, resp: Response) -> bool {
        let Some(pool) = self.resp_pool() else {
            return false;
        };
        if pool.closed() {
            return false;
        }
        tokio::spawn(async move {
            if pool.put(resp).await.is_err() {
                warn!("response buffer pool closed, dropping response");
            }
        });
        true
    }

    fn send_item(&self, item: Item) -> bool {
        let Some(pool) = self.item_pool() else {
            return false;
        };
        if pool.closed() {
            return false;
        }
        tokio::spawn(async move {
            if pool.put(item).await.is_err() {
                warn!("item buffer pool closed, dropping item");
            }
        });
        true
    }

    /// Routes an error to the error pool, tagging untagged errors with the
    /// kind derived from `mid` (or Scheduler when no module is involved).
    fn send_error(&self, mid: Option<&Mid>, err: Error) -> bool {
        let kind = mid
            .map(|m| ErrorKind::from(m.module_type()))
            .unwrap_or(ErrorKind::Scheduler);
        let tagged = err.tagged(kind);
        let Some(pool) = self.error_pool() else {
            return false;
        };
        if pool.closed() {
            return false;
        }
        tokio::spawn(async move {
            if pool.put(tagged).await.is_err() {
                warn!("error buffer pool closed, dropping error");
            }
        });
        true
    }

    fn req_pool(&self) -> Option<Arc<Pool<Request>>> {
        self.inner.req_pool.read().clone()
    }

    fn resp_pool(&self) -> Option<Arc<Pool<Response>>> {
        self.inner.resp_pool.read().clone()
    }

    fn item_pool(&self) -> Option<Arc<Pool<Item>>> {
        self.inner.item_pool.read().clone()
    }

    fn error_pool(&self) -> Option<Arc<Pool<Error>>> {
        self.inner.error_pool.read().clone()
    }

    fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.read().clone()
    }

    fn cancelled(&self) -> bool {
        self.inner.cancel.read().is_cancelled()
    }
}

/// Closes any previous pool in `cell` and installs a fresh one.
fn replace_pool<T: Send + 'static>(cell: &PoolCell<T>, cap: u32, max: u32) -> Result<()> {
    let mut slot = cell.write();
    if let Some(old) = slot.take() {
        if !old.closed() {
            old.close();
        }
    }
    *slot = Some(Arc::new(Pool::new(cap, max)?));
    Ok(())
}

/// Recreates a closed pool with its original parameters; a missing pool is
/// a scheduler error.
fn reopen_if_closed<T: Send + 'static>(cell: &PoolCell<T>, name: &str) -> Result<()> {
    let mut slot = cell.write();
    match slot.as_ref() {
        None => Err(Error::scheduler(format!(
            "{name} buffer pool is not initialized"
        ))),
        Some(pool) if pool.closed() => {
            let (cap, max) = (pool.buffer_cap(), pool.max_buffer_number());
            *slot = Some(Arc::new(Pool::new(cap, max)?));
            Ok(())
        }
        Some(_) => Ok(()),
    }
}

fn pool_busy<T: Send + 'static>(cell: &PoolCell<T>) -> bool {
    cell.read()
        .as_ref()
        .map(|p| !p.closed() && p.total() > 0)
        .unwrap_or(false)
}

fn panic_text(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
