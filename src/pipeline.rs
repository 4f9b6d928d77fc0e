//! Placement Pipeline - sample → query → filter → commit, as one blocking job chain.
//!
//! Stage order is strict: a job only starts once the previous job's whole
//! batch is materialised. Temporaries are released by their own jobs,
//! scheduled right after their last consumer:
//!
//! ```text
//! sample queries → execute queries → release queries
//!                → place blades    → release hits
//!                → commit store    → release blades
//! ```
//!
//! Any failure stops the chain and leaves the pipeline `Failed`. Nothing is
//! committed unless every earlier job succeeded, and nothing is retried.

use noise::NoiseFn;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::blade::Blade;
use crate::config::GrassConfig;
use crate::constants::BLADE_BUFFER_LABEL;
use crate::error::GrassError;
use crate::gpu::{GpuBackend, InstanceStore};
use crate::placement::{place_blades, PlacementStats};
use crate::query::{execute_checked, QueryExecutor, RayHit, RayQuery};
use crate::sampler::sample_queries;

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    Sampling,
    Querying,
    Filtering,
    Committing,
    Ready,
    Failed,
}

/// Committed result of a successful run.
pub struct Placement<B: GpuBackend> {
    pub store: InstanceStore<Blade, B>,
    pub stats: PlacementStats,
}

// ============================================================================
// JOB CHAIN
// ============================================================================

/// Temporaries handed from job to job. Each field is `Some` only between
/// its producer and its release job.
struct Scratch<B: GpuBackend> {
    cell_count: usize,
    queries: Option<Vec<RayQuery>>,
    hits: Option<Vec<RayHit>>,
    blades: Option<Vec<Blade>>,
    stats: PlacementStats,
    store: Option<InstanceStore<Blade, B>>,
}

impl<B: GpuBackend> Default for Scratch<B> {
    fn default() -> Self {
        Self {
            cell_count: 0,
            queries: None,
            hits: None,
            blades: None,
            stats: PlacementStats::default(),
            store: None,
        }
    }
}

type Job<'a, B> = Box<dyn FnOnce(&mut Scratch<B>) -> Result<(), GrassError> + 'a>;

struct JobChain<'a, B: GpuBackend> {
    jobs: Vec<(PipelineState, &'static str, Job<'a, B>)>,
}

impl<'a, B: GpuBackend> JobChain<'a, B> {
    fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Append a job that depends on everything scheduled before it.
    fn then(
        mut self,
        stage: PipelineState,
        name: &'static str,
        job: impl FnOnce(&mut Scratch<B>) -> Result<(), GrassError> + 'a,
    ) -> Self {
        self.jobs.push((stage, name, Box::new(job)));
        self
    }

    /// Run every job in order on the calling thread, reporting stage changes.
    fn complete(
        self,
        scratch: &mut Scratch<B>,
        mut enter: impl FnMut(PipelineState),
    ) -> Result<(), GrassError> {
        let mut current = None;
        for (stage, name, job) in self.jobs {
            if current != Some(stage) {
                enter(stage);
                current = Some(stage);
            }
            debug!("job '{}'", name);
            job(scratch)?;
        }
        Ok(())
    }
}

/// Take a temporary out of the scratch, failing loudly if a job ran out of order.
fn take<T>(slot: &mut Option<T>, what: &'static str) -> Result<T, GrassError> {
    slot.take().ok_or(GrassError::JobOrder(what))
}

// ============================================================================
// PIPELINE
// ============================================================================

/// One-shot placement run for a single config.
pub struct PlacementPipeline {
    config: GrassConfig,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl PlacementPipeline {
    pub fn new(config: GrassConfig) -> Self {
        Self {
            config,
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn config(&self) -> &GrassConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    fn enter(&mut self, state: PipelineState) {
        self.state = state;
        self.history.push(state);
    }

    /// Run the whole chain and block until the store is committed.
    pub fn run<E, N, B>(&mut self, executor: &E, noise: &N, backend: Arc<B>) -> Result<Placement<B>, GrassError>
    where
        E: QueryExecutor + ?Sized,
        N: NoiseFn<f64, 2>,
        B: GpuBackend,
    {
        if self.state != PipelineState::Idle {
            return Err(GrassError::PipelineSpent);
        }

        let config = &self.config;
        let chain = JobChain::new()
            .then(PipelineState::Sampling, "sample queries", |s: &mut Scratch<B>| {
                s.cell_count = config.cell_count()?;
                s.queries = Some(sample_queries(config, s.cell_count)?);
                Ok(())
            })
            .then(PipelineState::Querying, "execute queries", |s| {
                let queries = s.queries.as_deref().unwrap_or_default();
                s.hits = Some(execute_checked(executor, queries)?);
                Ok(())
            })
            .then(PipelineState::Querying, "release queries", |s| {
                let queries = take(&mut s.queries, "ray queries")?;
                debug!("released {} ray queries", queries.len());
                Ok(())
            })
            .then(PipelineState::Filtering, "place blades", |s| {
                let hits = s.hits.as_deref().unwrap_or_default();
                let (blades, stats) = place_blades(hits, noise)?;
                s.blades = Some(blades);
                s.stats = stats;
                Ok(())
            })
            .then(PipelineState::Filtering, "release hits", |s| {
                let hits = take(&mut s.hits, "ray hits")?;
                debug!("released {} ray hits", hits.len());
                Ok(())
            })
            .then(PipelineState::Committing, "commit store", move |s| {
                let blades = s.blades.as_deref().unwrap_or_default();
                s.store = Some(InstanceStore::new(backend, BLADE_BUFFER_LABEL, blades)?);
                Ok(())
            })
            .then(PipelineState::Committing, "release blades", |s| {
                let blades = take(&mut s.blades, "blade list")?;
                debug!("released {} staged blades", blades.len());
                Ok(())
            });

        let mut scratch = Scratch::default();
        let mut entered = Vec::new();
        let result = chain.complete(&mut scratch, |stage| entered.push(stage));
        for stage in entered {
            self.enter(stage);
        }

        match result.and_then(|()| take(&mut scratch.store, "blade store")) {
            Ok(store) => {
                self.enter(PipelineState::Ready);
                info!(
                    "grass placement ready: {} cells, {} hits, {} blades",
                    scratch.cell_count, scratch.stats.hits, scratch.stats.accepted
                );
                Ok(Placement { store, stats: scratch.stats })
            }
            Err(e) => {
                error!("grass placement failed in {:?}: {}", self.state, e);
                self.enter(PipelineState::Failed);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HostBackend;
    use crate::heightfield::HeightField;
    use bevy::math::Vec3;
    use noise::Constant;

    struct Missing;

    impl QueryExecutor for Missing {
        fn execute(&self, _queries: &[RayQuery]) -> Vec<RayHit> {
            Vec::new()
        }
    }

    struct Everywhere;

    impl QueryExecutor for Everywhere {
        fn execute(&self, queries: &[RayQuery]) -> Vec<RayHit> {
            queries.iter().map(|q| RayHit::new(1, Vec3::new(q.origin.x, 0.0, q.origin.z))).collect()
        }
    }

    fn small_config() -> GrassConfig {
        GrassConfig { bounds: [0, 10], density: 2, ..Default::default() }
    }

    #[test]
    fn successful_run_walks_every_state() {
        let mut pipeline = PlacementPipeline::new(small_config());
        let placement = pipeline
            .run(&Everywhere, &Constant::new(0.5), Arc::new(HostBackend::new()))
            .unwrap();

        assert_eq!(placement.store.len(), 400);
        assert_eq!(placement.stats.queries, 400);
        assert_eq!(pipeline.state(), PipelineState::Ready);
        assert_eq!(
            pipeline.history(),
            &[
                PipelineState::Idle,
                PipelineState::Sampling,
                PipelineState::Querying,
                PipelineState::Filtering,
                PipelineState::Committing,
                PipelineState::Ready,
            ]
        );
    }

    #[test]
    fn executor_contract_violation_fails_before_filtering() {
        let backend = Arc::new(HostBackend::new());
        let mut pipeline = PlacementPipeline::new(small_config());
        let result = pipeline.run(&Missing, &Constant::new(0.5), backend.clone());

        assert!(matches!(result, Err(GrassError::ExecutorContract { expected: 400, actual: 0 })));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(!pipeline.history().contains(&PipelineState::Filtering));
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn commit_failure_leaves_no_buffers() {
        let backend = Arc::new(HostBackend::with_budget(64));
        let mut pipeline = PlacementPipeline::new(small_config());
        let result = pipeline.run(&Everywhere, &Constant::new(0.5), backend.clone());

        assert!(matches!(result, Err(GrassError::Allocation { stage: "commit", .. })));
        assert_eq!(pipeline.history().last(), Some(&PipelineState::Failed));
        assert!(pipeline.history().contains(&PipelineState::Committing));
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn oversized_grid_fails_while_sampling() {
        let config = GrassConfig { bounds: [0, 1_000_000], density: 1_000, ..Default::default() };
        let mut pipeline = PlacementPipeline::new(config);
        let result = pipeline.run(&Everywhere, &Constant::new(0.5), Arc::new(HostBackend::new()));

        assert!(matches!(result, Err(GrassError::Allocation { stage: "sampling", .. })));
        assert_eq!(
            pipeline.history(),
            &[PipelineState::Idle, PipelineState::Sampling, PipelineState::Failed]
        );
    }

    #[test]
    fn release_before_producer_is_a_job_order_error() {
        let chain = JobChain::<HostBackend>::new()
            .then(PipelineState::Querying, "release queries", |s| {
                take(&mut s.queries, "ray queries").map(drop)
            })
            .then(PipelineState::Filtering, "never runs", |_| unreachable!());
        let mut scratch = Scratch::default();
        let mut entered = Vec::new();
        let result = chain.complete(&mut scratch, |stage| entered.push(stage));

        assert!(matches!(result, Err(GrassError::JobOrder("ray queries"))));
        assert_eq!(entered, vec![PipelineState::Querying]);
    }

    #[test]
    fn pipeline_is_one_shot() {
        let field = HeightField::flat(0.0, 10.0, 0.0).unwrap();
        let mut pipeline = PlacementPipeline::new(small_config());
        pipeline.run(&field, &Constant::new(0.5), Arc::new(HostBackend::new())).unwrap();
        let again = pipeline.run(&field, &Constant::new(0.5), Arc::new(HostBackend::new()));
        assert!(matches!(again, Err(GrassError::PipelineSpent)));
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }
}
