use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use crossbeam::sync::WaitGroup;

use qv_chunk::{Chunk, RowRef, Schema};
use qv_expr::CnfFilter;

use crate::joiner::make_joiner;
use crate::{
    Executor, HashContext, HashRowContainer, JoinError, JoinResult, JoinType, Joiner,
};

// ---

/// Construction-time configuration of a [`HashJoinExec`].
///
/// The defaults cover the tuning knobs only; `join_type` and the key lists
/// always come from the planner:
///
/// ```
/// # use qv_hash_join::{HashJoinConfig, JoinType};
/// let config = HashJoinConfig {
///     join_type: JoinType::Inner,
///     probe_keys: vec![0],
///     build_keys: vec![0],
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct HashJoinConfig {
    pub join_type: JoinType,

    /// Key column indices on the probe (left) side, pairwise equal in length
    /// with `build_keys`.
    pub probe_keys: Vec<usize>,

    /// Key column indices on the build (right) side.
    pub build_keys: Vec<usize>,

    /// Residual filter applied to every probe chunk before hashing; rows it
    /// rejects count as unmatched.
    pub probe_filter: Option<CnfFilter>,

    /// Number of join workers.
    pub concurrency: usize,

    /// Planner's cardinality estimate for the build side; zero means unknown.
    pub build_rows_hint: usize,

    /// Rows reserved up front in freshly allocated chunks.
    pub initial_chunk_capacity: usize,

    /// Rows at which a chunk counts as full and gets shipped.
    pub max_chunk_capacity: usize,
}

impl Default for HashJoinConfig {
    fn default() -> Self {
        Self {
            join_type: JoinType::Inner,
            probe_keys: Vec::new(),
            build_keys: Vec::new(),
            probe_filter: None,
            concurrency: 4,
            build_rows_hint: 0,
            initial_chunk_capacity: 64,
            max_chunk_capacity: 1024,
        }
    }
}

// ---

/// What travels on the shared result channel: a filled output chunk tagged
/// with its producer (so the caller can hand the empty chunk back), or the
/// first fatal error of a task.
struct WorkerResult {
    worker_id: usize,
    res: JoinResult<Chunk>,
}

/// An empty probe-side chunk plus the worker it is pinned to.
///
/// Exactly one of these exists per worker; the pinning never changes, which
/// gives every worker a dedicated, steady chunk supply.
struct ProbeResource {
    chunk: Chunk,
    worker_id: usize,
}

/// The fetcher reports errors on the shared result channel like any worker,
/// but never ships chunks, so it needs no real pool slot.
const FETCHER_TASK_ID: usize = usize::MAX;

// ---

/// Parallel hash join over two child executors.
///
/// Joins the *probe* child (left) against the *build* child (right) by
/// equality on the configured key columns. For `Inner` and `LeftOuter` the
/// output rows are probe columns followed by build columns; for `LeftSemi`
/// and `LeftAnti` the output schema is the probe schema.
///
/// The operator is lazy: `open` only opens the children. The first `next`
/// call drains the build side into a [`HashRowContainer`], then spawns the
/// probe pipeline (one fetcher, `concurrency` workers, one supervisor).
/// Every later `next` receives one chunk from the shared result channel and
/// swaps its columns into the caller's chunk.
pub struct HashJoinExec {
    config: HashJoinConfig,
    output_schema: Schema,

    build_child: Box<dyn Executor>,
    /// Moved into the fetcher task when the pipeline starts; the fetcher
    /// closes it on exit.
    probe_child: Option<Box<dyn Executor>>,

    /// Dropping the sender is the shutdown broadcast.
    shutdown_tx: Option<Sender<()>>,
    shutdown_rx: Option<Receiver<()>>,

    pipeline: Option<Pipeline>,
    prepared: bool,
    closed: bool,
}

struct Pipeline {
    result_rx: Receiver<WorkerResult>,
    /// Per-worker pools through which emptied result chunks flow back.
    result_pool_txs: Vec<Sender<Chunk>>,
    handles: Vec<std::thread::JoinHandle<()>>,
}

impl HashJoinExec {
    /// `probe_child` is the left input: its columns lead the output rows.
    pub fn new(
        probe_child: Box<dyn Executor>,
        build_child: Box<dyn Executor>,
        config: HashJoinConfig,
    ) -> Self {
        let output_schema = if config.join_type.emits_build_columns() {
            probe_child.schema().concat(build_child.schema())
        } else {
            probe_child.schema().clone()
        };

        Self {
            config,
            output_schema,
            build_child,
            probe_child: Some(probe_child),
            shutdown_tx: None,
            shutdown_rx: None,
            pipeline: None,
            prepared: false,
            closed: false,
        }
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.output_schema
    }

    /// Validates the configuration and opens both children. No task is
    /// spawned and no row is read until the first [`Self::next`].
    pub fn open(&mut self) -> JoinResult<()> {
        self.validate_config()?;

        let (shutdown_tx, shutdown_rx) = channel::bounded(0);
        self.shutdown_tx = Some(shutdown_tx);
        self.shutdown_rx = Some(shutdown_rx);
        self.prepared = false;
        self.closed = false;

        self.build_child.open()?;
        if let Some(probe_child) = &mut self.probe_child {
            probe_child.open()?;
        }
        Ok(())
    }

    /// Fills `out` (which must have this operator's output schema) with the
    /// next batch of joined rows. An empty `out` signals end-of-input.
    pub fn next(&mut self, out: &mut Chunk) -> JoinResult<()> {
        out.clear();
        if self.closed {
            return Ok(());
        }
        if self.shutdown_rx.is_none() {
            return Err(JoinError::NotOpen);
        }

        if !self.prepared {
            let container = self.build_phase()?;
            self.start_pipeline(container)?;
            self.prepared = true;
        }

        let Some(pipeline) = &self.pipeline else {
            return Ok(());
        };
        match pipeline.result_rx.recv() {
            // Disconnected: the supervisor saw every task exit.
            Err(channel::RecvError) => Ok(()),

            Ok(WorkerResult {
                worker_id,
                res: Ok(mut chunk),
            }) => {
                out.swap_columns(&mut chunk).map_err(JoinError::Joiner)?;
                chunk.clear();
                // Hand the emptied chunk back to its worker, which may
                // already have wound down.
                let _ = pipeline.result_pool_txs[worker_id].try_send(chunk);
                Ok(())
            }

            Ok(WorkerResult { res: Err(err), .. }) => Err(err),
        }
    }

    /// Tears the pipeline down and closes both children.
    ///
    /// Safe to call at any point of the lifecycle, including with workers
    /// mid-flight: the shutdown broadcast unblocks every channel operation.
    /// Calling it twice is a no-op.
    pub fn close(&mut self) -> JoinResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // The broadcast: every blocking channel op in every task also waits
        // on this.
        self.shutdown_tx = None;
        self.shutdown_rx = None;

        if let Some(pipeline) = self.pipeline.take() {
            // Drain the shared result channel until every producer has let
            // go of it; this is also what unblocks workers mid-send.
            while pipeline.result_rx.recv().is_ok() {}

            drop(pipeline.result_pool_txs);
            for handle in pipeline.handles {
                // Task panics were already converted to error results.
                handle.join().ok();
            }
        }
        self.prepared = false;

        let mut first_err: Option<JoinError> = None;
        if let Some(mut probe_child) = self.probe_child.take() {
            if let Err(err) = probe_child.close() {
                first_err = Some(err.into());
            }
        }
        if let Err(err) = self.build_child.close() {
            first_err.get_or_insert(err.into());
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn validate_config(&self) -> JoinResult<()> {
        let config = &self.config;

        if config.concurrency == 0 {
            return Err(JoinError::InvalidConcurrency);
        }
        if config.initial_chunk_capacity == 0 || config.max_chunk_capacity == 0 {
            return Err(JoinError::InvalidChunkCapacity);
        }
        if config.join_type == JoinType::RightOuter {
            // The planner swaps the inputs and hands us a `LeftOuter`;
            // running right-outer directly would silently produce wrong rows.
            return Err(JoinError::UnsupportedJoinType(config.join_type));
        }

        if config.probe_keys.is_empty() || config.probe_keys.len() != config.build_keys.len() {
            return Err(JoinError::OperandShape {
                probe: config.probe_keys.len(),
                build: config.build_keys.len(),
            });
        }

        let probe_child = self.probe_child.as_ref().ok_or(JoinError::NotOpen)?;
        for (side, keys, num_columns) in [
            ("probe", &config.probe_keys, probe_child.schema().len()),
            ("build", &config.build_keys, self.build_child.schema().len()),
        ] {
            if let Some(&index) = keys.iter().find(|&&index| index >= num_columns) {
                return Err(JoinError::KeyOutOfRange {
                    side,
                    index,
                    num_columns,
                });
            }
        }

        Ok(())
    }

    /// Sequentially drains the build child into a fresh container.
    ///
    /// Runs on the caller's thread during the first `next`; any build-side
    /// error surfaces there, before the probe pipeline exists.
    fn build_phase(&mut self) -> JoinResult<Arc<HashRowContainer>> {
        let build_schema = self.build_child.schema().clone();
        let mut container = HashRowContainer::new(
            self.config.build_keys.clone(),
            self.config.build_rows_hint,
        );
        let mut hctx = HashContext::new("build", self.config.build_keys.clone());

        loop {
            // A fresh chunk per batch: the container keeps them all alive so
            // its row handles stay stable.
            let mut chunk = Chunk::with_capacities(
                build_schema.clone(),
                self.config.initial_chunk_capacity,
                self.config.max_chunk_capacity,
            );
            self.build_child.next(&mut chunk)?;
            if chunk.is_empty() {
                break;
            }
            container.insert_chunk(chunk, &mut hctx)?;
        }

        qv_log::debug!(
            num_rows = container.num_rows(),
            num_indexed = container.num_indexed_rows(),
            "hash join build phase complete"
        );
        Ok(Arc::new(container))
    }

    fn start_pipeline(&mut self, container: Arc<HashRowContainer>) -> JoinResult<()> {
        let config = &self.config;
        let num_workers = config.concurrency;
        let shutdown_rx = self.shutdown_rx.clone().ok_or(JoinError::NotOpen)?;
        let probe_child = self.probe_child.take().ok_or(JoinError::NotOpen)?;
        let probe_schema = probe_child.schema().clone();

        let (result_tx, result_rx) = channel::bounded(num_workers + 1);
        let (resource_tx, resource_rx) = channel::bounded(num_workers);

        let mut probe_txs = Vec::with_capacity(num_workers);
        let mut probe_rxs = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let (tx, rx) = channel::bounded(1);
            probe_txs.push(tx);
            probe_rxs.push(rx);
        }

        // One probe resource per worker, pinned to it for the whole run.
        for worker_id in 0..num_workers {
            let chunk = Chunk::with_capacities(
                probe_schema.clone(),
                config.initial_chunk_capacity,
                config.max_chunk_capacity,
            );
            resource_tx
                .send(ProbeResource { chunk, worker_id })
                .expect("resource pool is sized to hold one resource per worker");
        }

        let wg = WaitGroup::new();
        let mut result_pool_txs = Vec::with_capacity(num_workers);
        let mut handles = Vec::with_capacity(num_workers + 2);

        for (worker_id, probe_rx) in probe_rxs.into_iter().enumerate() {
            let (pool_tx, pool_rx) = channel::bounded(1);
            pool_tx
                .send(Chunk::with_capacities(
                    self.output_schema.clone(),
                    config.initial_chunk_capacity,
                    config.max_chunk_capacity,
                ))
                .expect("result pool is sized to hold one chunk");
            result_pool_txs.push(pool_tx);

            let worker = JoinWorker {
                container: Arc::clone(&container),
                probe_keys: config.probe_keys.clone(),
                probe_filter: config.probe_filter.clone(),
                joiner: make_joiner(config.join_type)?,
                hctx: HashContext::new("probe", config.probe_keys.clone()),
                selected: Vec::new(),
                probe_rx,
                resource_tx: resource_tx.clone(),
                shutdown_rx: shutdown_rx.clone(),
                sink: ResultSink {
                    worker_id,
                    result_tx: result_tx.clone(),
                    pool_rx,
                    shutdown_rx: shutdown_rx.clone(),
                },
            };
            handles.push(spawn_join_task(
                format!("hash_join_worker_{worker_id}"),
                worker_id,
                wg.clone(),
                result_tx.clone(),
                shutdown_rx.clone(),
                move || {
                    let mut worker = worker;
                    worker.run()
                },
            )?);
        }
        // The workers hold the live clones now; this lets the fetcher see the
        // pool disconnect once every worker is gone.
        drop(resource_tx);

        let fetcher = ProbeFetcher {
            probe_child,
            resource_rx,
            probe_txs,
            shutdown_rx: shutdown_rx.clone(),
        };
        handles.push(spawn_join_task(
            "hash_join_fetcher".to_owned(),
            FETCHER_TASK_ID,
            wg.clone(),
            result_tx.clone(),
            shutdown_rx,
            move || {
                let mut fetcher = fetcher;
                let res = fetcher.run();
                // The fetcher owns the probe child, so it closes it. On a
                // fetcher panic this is skipped; unwinding still drops the
                // probe channels, which is what the workers depend on.
                if let Err(err) = fetcher.probe_child.close() {
                    qv_log::warn!(%err, "failed to close the probe child");
                }
                res
            },
        )?);

        // The supervisor holds the last result sender: the caller observes
        // end-of-input only after the wait-group has fully drained.
        let supervisor_tx = result_tx;
        handles.push(
            std::thread::Builder::new()
                .name("hash_join_supervisor".to_owned())
                .spawn(move || {
                    wg.wait();
                    drop(supervisor_tx);
                    qv_log::trace!("hash join pipeline wound down");
                })
                .map_err(JoinError::Spawn)?,
        );

        self.pipeline = Some(Pipeline {
            result_rx,
            result_pool_txs,
            handles,
        });
        Ok(())
    }
}

// ---

/// The per-worker end of the shared result channel and of this worker's
/// chunk pool. All operations abort on shutdown.
struct ResultSink {
    worker_id: usize,
    result_tx: Sender<WorkerResult>,
    pool_rx: Receiver<Chunk>,
    shutdown_rx: Receiver<()>,
}

impl ResultSink {
    /// Takes an empty result chunk out of this worker's pool.
    fn acquire(&self) -> JoinResult<Chunk> {
        select! {
            recv(self.pool_rx) -> chunk => chunk.map_err(|_| JoinError::Cancelled),
            recv(self.shutdown_rx) -> _ => Err(JoinError::Cancelled),
        }
    }

    /// Ships one result (chunk or error) to the caller.
    fn ship(&self, res: JoinResult<Chunk>) -> JoinResult<()> {
        let result = WorkerResult {
            worker_id: self.worker_id,
            res,
        };
        select! {
            send(self.result_tx, result) -> sent => sent.map_err(|_| JoinError::Cancelled),
            recv(self.shutdown_rx) -> _ => Err(JoinError::Cancelled),
        }
    }

    /// Ships the filled `out` and replaces it with a fresh chunk from the
    /// pool. Shipping must come first: the pool only refills once the caller
    /// has consumed what we send.
    fn rotate(&self, out: &mut Chunk) -> JoinResult<()> {
        let full = std::mem::replace(out, Chunk::new(Schema::new(Vec::new()), 1));
        self.ship(Ok(full))?;
        *out = self.acquire()?;
        Ok(())
    }
}

/// One join worker: filters, hashes and probes one probe chunk at a time.
struct JoinWorker {
    container: Arc<HashRowContainer>,
    probe_keys: Vec<usize>,
    probe_filter: Option<CnfFilter>,
    joiner: Box<dyn Joiner>,
    hctx: HashContext,
    /// Reusable per-row selection vector for the probe-side filter.
    selected: Vec<bool>,

    probe_rx: Receiver<Chunk>,
    resource_tx: Sender<ProbeResource>,
    shutdown_rx: Receiver<()>,
    sink: ResultSink,
}

impl JoinWorker {
    fn run(&mut self) -> JoinResult<()> {
        let mut out = self.sink.acquire()?;

        loop {
            let mut probe = select! {
                recv(self.probe_rx) -> msg => match msg {
                    Ok(chunk) => chunk,
                    // The fetcher dropped the channel: end of probe input.
                    Err(_) => break,
                },
                recv(self.shutdown_rx) -> _ => return Err(JoinError::Cancelled),
            };

            self.join_chunk(&probe, &mut out)?;

            // Hand the consumed chunk back to the fetcher, still pinned to
            // this worker.
            probe.clear();
            let resource = ProbeResource {
                chunk: probe,
                worker_id: self.sink.worker_id,
            };
            select! {
                send(self.resource_tx, resource) -> sent => {
                    if sent.is_err() {
                        // Fetcher already exited; the chunk retires.
                    }
                },
                recv(self.shutdown_rx) -> _ => return Err(JoinError::Cancelled),
            }
        }

        if !out.is_empty() {
            self.sink.ship(Ok(out))?;
        }
        Ok(())
    }

    /// Joins one probe chunk: filter, hash the key columns of the surviving
    /// rows, then dispatch row by row. `out` is shipped and replaced whenever
    /// it fills up.
    fn join_chunk(&mut self, probe: &Chunk, out: &mut Chunk) -> JoinResult<()> {
        if let Some(filter) = &self.probe_filter {
            filter.eval_selected(probe, &mut self.selected)?;
        } else {
            self.selected.clear();
            self.selected.resize(probe.num_rows(), true);
        }

        self.hctx.reset(probe.num_rows());
        self.hctx.hash_key_columns(probe, Some(&self.selected))?;

        for row in 0..probe.num_rows() {
            let probe_row = probe.row(row);
            if !self.selected[row] || self.hctx.has_null(row) {
                // Filtered out, or a NULL key: unmatched by definition.
                self.joiner.on_miss_match(probe_row, out)?;
            } else {
                self.join_matched_probe_row(self.hctx.hash(row), probe_row, out)?;
            }

            if out.is_full() {
                self.sink.rotate(out)?;
            }
        }
        Ok(())
    }

    /// Probes the container for one row whose keys hashed cleanly.
    ///
    /// The candidates arrive as an iterator the joiner consumes in chunks of
    /// its choosing; whenever `out` fills up mid-iteration it is rotated and
    /// the joiner resumes with the same iterator.
    fn join_matched_probe_row(
        &mut self,
        fingerprint: u64,
        probe_row: RowRef<'_>,
        out: &mut Chunk,
    ) -> JoinResult<()> {
        let Self {
            container,
            probe_keys,
            joiner,
            sink,
            ..
        } = self;

        let mut build_rows = container
            .matched_rows(fingerprint, probe_row, probe_keys)
            .peekable();

        if build_rows.peek().is_none() {
            // Fingerprint hit but no true match (collision), or no hit at all.
            return joiner.on_miss_match(probe_row, out);
        }

        let mut matched_any = false;
        loop {
            matched_any |= joiner.try_match_build_rows(probe_row, &mut build_rows, out)?;
            if build_rows.peek().is_none() {
                break;
            }
            // The joiner stopped early because `out` filled up.
            sink.rotate(out)?;
        }

        if !matched_any {
            joiner.on_miss_match(probe_row, out)?;
        }
        Ok(())
    }
}

// ---

/// The probe fetcher: the single task that drives the probe child.
///
/// It waits for a pooled resource, fills its chunk from the probe child and
/// routes it to the resource's pinned worker. Dropping it (normal exit or
/// unwind) drops `probe_txs`, which is how workers learn about end-of-input.
struct ProbeFetcher {
    probe_child: Box<dyn Executor>,
    resource_rx: Receiver<ProbeResource>,
    probe_txs: Vec<Sender<Chunk>>,
    shutdown_rx: Receiver<()>,
}

impl ProbeFetcher {
    fn run(&mut self) -> JoinResult<()> {
        loop {
            let ProbeResource { mut chunk, worker_id } = select! {
                recv(self.resource_rx) -> resource => match resource {
                    Ok(resource) => resource,
                    // Every worker is gone; nothing left to feed.
                    Err(_) => break,
                },
                recv(self.shutdown_rx) -> _ => return Err(JoinError::Cancelled),
            };

            self.probe_child.next(&mut chunk)?;
            if chunk.is_empty() {
                break;
            }

            select! {
                send(self.probe_txs[worker_id], chunk) -> sent => {
                    if sent.is_err() {
                        // That worker is gone; without its pinned resource
                        // there is nothing more to do for it.
                        break;
                    }
                },
                recv(self.shutdown_rx) -> _ => return Err(JoinError::Cancelled),
            }
        }
        Ok(())
    }
}

// ---

/// Spawns one pipeline task with the standard wrapper: converts a panic into
/// an error result, reports fatal errors on the shared result channel, and
/// always releases the wait-group slot.
fn spawn_join_task(
    name: String,
    task_id: usize,
    wg: WaitGroup,
    result_tx: Sender<WorkerResult>,
    shutdown_rx: Receiver<()>,
    body: impl FnOnce() -> JoinResult<()> + Send + 'static,
) -> JoinResult<std::thread::JoinHandle<()>> {
    let task = name.clone();
    std::thread::Builder::new()
        .name(name)
        .spawn(move || {
            qv_log::trace!(%task, "hash join task started");

            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(body));
            let err = match outcome {
                Ok(Ok(())) | Ok(Err(JoinError::Cancelled)) => None,
                Ok(Err(err)) => Some(err),
                Err(panic) => Some(JoinError::TaskPanic(panic_message(&*panic))),
            };

            match &err {
                None => qv_log::trace!(%task, "hash join task finished"),
                Some(err) => qv_log::trace!(%task, %err, "hash join task failed"),
            }

            if let Some(err) = err {
                let result = WorkerResult {
                    worker_id: task_id,
                    res: Err(err),
                };
                // Deliver the failure unless shutdown is already racing us.
                select! {
                    send(result_tx, result) -> _ => {},
                    recv(shutdown_rx) -> _ => {},
                }
            }

            drop(wg);
        })
        .map_err(JoinError::Spawn)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
