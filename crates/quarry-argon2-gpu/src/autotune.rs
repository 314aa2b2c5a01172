//! Work-group geometry autotuning.
//!
//! Per (variant, lanes, segment-blocks) the tuner picks `lanes_per_block`
//! (lane tiling inside a work-group) and `jobs_per_block` (independent
//! candidates coalesced into one work-group once lanes are fully filled) by
//! timing real kernel launches with OpenCL event profiling. Results are
//! memoized for the lifetime of the process in a dense write-once table.
//!
//! Timings use one warm-up launch plus one profiled launch per candidate
//! geometry. A device error mid-sweep truncates the sweep and keeps the best
//! geometry measured so far; only the baseline measurement is fatal.

use crate::context::GpuContext;
use crate::encoding::Variant;
use crate::error::EngineError;
use crate::pipeline::segment_kernel;
use crate::{NUM_VARIANTS, THREADS_PER_LANE};
use ocl::enums::{ProfilingInfo, ProfilingInfoResult};
use ocl::{Buffer, Event};

/// Launches slower than this get a note in the log.
const SLOW_LAUNCH_NS: u64 = 200_000_000;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Work-group tiling for one segment launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Lanes evaluated by one work-group; must divide the salt's lane count.
    pub lanes_per_block: u32,
    /// Candidates evaluated by one work-group; must divide the batch capacity.
    pub jobs_per_block: u32,
}

impl Geometry {
    /// Sentinel for "not yet measured".
    pub const UNMEASURED: Self = Self {
        lanes_per_block: 0,
        jobs_per_block: 0,
    };

    /// Whether a sweep has produced this entry.
    #[must_use]
    pub const fn is_measured(self) -> bool {
        self.lanes_per_block != 0
    }

    /// Local-memory bytes one work-group needs: one 64-bit shuffle slot per
    /// work item.
    #[must_use]
    pub const fn shared_mem_bytes(self) -> u64 {
        (THREADS_PER_LANE as u64)
            .saturating_mul(self.lanes_per_block as u64)
            .saturating_mul(self.jobs_per_block as u64)
            .saturating_mul(8)
    }

    /// Check the geometry against a salt's lane count, the batch capacity and
    /// the device's local-memory budget. Violations are configuration errors,
    /// not user input.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] naming the violated constraint.
    pub fn validate(self, lanes: u32, batch: u32, local_budget: u64) -> Result<(), EngineError> {
        // `checked_rem` folds the zero case into the divisibility test.
        if lanes.checked_rem(self.lanes_per_block) != Some(0) {
            return Err(EngineError::Config(format!(
                "lanes_per_block {} does not divide lane count {lanes}",
                self.lanes_per_block
            )));
        }
        if batch.checked_rem(self.jobs_per_block) != Some(0) {
            return Err(EngineError::Config(format!(
                "jobs_per_block {} does not divide batch capacity {batch}",
                self.jobs_per_block
            )));
        }
        let shared = self.shared_mem_bytes();
        if shared > local_budget {
            return Err(EngineError::Config(format!(
                "work-group needs {shared} B local memory, device offers {local_budget} B"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memoization table
// ---------------------------------------------------------------------------

/// Dense (variant, lanes, segment-blocks) → [`Geometry`] table.
///
/// Axes are bounded by the maxima observed over the target set at planning
/// time. Entries are written once and never changed.
pub struct AutotuneTable {
    max_lanes: u32,
    max_segment_blocks: u32,
    entries: Vec<Geometry>,
}

impl AutotuneTable {
    /// Table covering lanes `1..=max_lanes` and segment blocks
    /// `1..=max_segment_blocks` for all three variants.
    #[must_use]
    pub fn new(max_lanes: u32, max_segment_blocks: u32) -> Self {
        let per_variant = (max_lanes as usize)
            .saturating_add(1)
            .saturating_mul((max_segment_blocks as usize).saturating_add(1));
        Self {
            max_lanes,
            max_segment_blocks,
            entries: vec![Geometry::UNMEASURED; NUM_VARIANTS.saturating_mul(per_variant)],
        }
    }

    fn index(&self, variant: Variant, lanes: u32, segment_blocks: u32) -> usize {
        assert!(
            lanes >= 1 && lanes <= self.max_lanes,
            "lanes outside surveyed range"
        );
        assert!(
            segment_blocks >= 1 && segment_blocks <= self.max_segment_blocks,
            "segment blocks outside surveyed range"
        );
        let lane_axis = (self.max_lanes as usize).saturating_add(1);
        let stride = (self.max_segment_blocks as usize).saturating_add(1);
        (variant.kernel_index() as usize)
            .saturating_mul(lane_axis)
            .saturating_add(lanes as usize)
            .saturating_mul(stride)
            .saturating_add(segment_blocks as usize)
    }

    /// The memoized geometry, or [`Geometry::UNMEASURED`]. Panics outside
    /// the surveyed axes.
    #[must_use]
    pub fn get(&self, variant: Variant, lanes: u32, segment_blocks: u32) -> Geometry {
        self.entries[self.index(variant, lanes, segment_blocks)]
    }

    /// Like [`Self::get`], but `None` for keys outside the surveyed axes or
    /// never measured. This is the safe entry for salts the caller cannot
    /// vouch for.
    #[must_use]
    pub fn lookup(&self, variant: Variant, lanes: u32, segment_blocks: u32) -> Option<Geometry> {
        if lanes < 1
            || lanes > self.max_lanes
            || segment_blocks < 1
            || segment_blocks > self.max_segment_blocks
        {
            return None;
        }
        let geometry = self.get(variant, lanes, segment_blocks);
        geometry.is_measured().then_some(geometry)
    }

    fn record(&mut self, variant: Variant, lanes: u32, segment_blocks: u32, geometry: Geometry) {
        let index = self.index(variant, lanes, segment_blocks);
        debug_assert!(!self.entries[index].is_measured(), "entry is write-once");
        self.entries[index] = geometry;
    }
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Measure (or look up) the geometry for one (variant, lanes, segment-blocks)
/// key and memoize it.
///
/// The scratch buffer contents are scratch in both senses: the sweep launches
/// real segment kernels over whatever the buffer holds and discards the
/// result.
///
/// # Errors
///
/// [`EngineError::Device`] when the baseline (1, 1) measurement itself fails.
/// Errors later in the sweep are soft and merely truncate it.
pub fn tune(
    table: &mut AutotuneTable,
    ctx: &GpuContext,
    scratch: &Buffer<u8>,
    batch: u32,
    variant: Variant,
    lanes: u32,
    segment_blocks: u32,
) -> Result<(), EngineError> {
    if table.get(variant, lanes, segment_blocks).is_measured() {
        return Ok(());
    }

    let mut best = Geometry {
        lanes_per_block: 1,
        jobs_per_block: 1,
    };
    let mut best_time = profile_launch(ctx, scratch, batch, variant, lanes, segment_blocks, best)?;

    if lanes > 1 && lanes.is_power_of_two() {
        let mut lpb = 1;
        while lpb <= lanes {
            let candidate = Geometry {
                lanes_per_block: lpb,
                jobs_per_block: 1,
            };
            match profile_launch(ctx, scratch, batch, variant, lanes, segment_blocks, candidate) {
                Ok(time) if time < best_time => {
                    best_time = time;
                    best.lanes_per_block = lpb;
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("lanes_per_block sweep stopped at {lpb}: {e}");
                    break;
                }
            }
            lpb = lpb.saturating_mul(2);
        }
    }

    // Coalescing candidates only pays once a work-group already covers every
    // lane.
    if best.lanes_per_block == lanes && batch > 1 && batch.is_power_of_two() {
        let mut jpb = 1;
        while jpb <= batch {
            let candidate = Geometry {
                lanes_per_block: best.lanes_per_block,
                jobs_per_block: jpb,
            };
            match profile_launch(ctx, scratch, batch, variant, lanes, segment_blocks, candidate) {
                Ok(time) if time < best_time => {
                    best_time = time;
                    best.jobs_per_block = jpb;
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("jobs_per_block sweep stopped at {jpb}: {e}");
                    break;
                }
            }
            jpb = jpb.saturating_mul(2);
        }
    }

    if best_time > SLOW_LAUNCH_NS {
        log::warn!(
            "segment launch takes {} ms at batch {batch}; consider a smaller batch",
            best_time / 1_000_000
        );
    }
    log::info!(
        "autotune [variant {}, lanes {lanes}, segments {segment_blocks}] -> ({}, {}) in {} ms",
        variant.kernel_index(),
        best.lanes_per_block,
        best.jobs_per_block,
        best_time / 1_000_000
    );

    table.record(variant, lanes, segment_blocks, best);
    Ok(())
}

/// One warm-up launch plus one profiled launch of a single (pass 0, slice 0)
/// segment; returns the profiled duration in nanoseconds.
fn profile_launch(
    ctx: &GpuContext,
    scratch: &Buffer<u8>,
    batch: u32,
    variant: Variant,
    lanes: u32,
    segment_blocks: u32,
    geometry: Geometry,
) -> Result<u64, EngineError> {
    let queue = ctx.profiling_queue();
    let kernel = segment_kernel(
        ctx,
        queue,
        scratch,
        variant,
        1,
        lanes,
        segment_blocks,
        batch,
        geometry,
    )?;

    unsafe { kernel.cmd().enq() }
        .map_err(|e| EngineError::Device(format!("autotune warm-up launch: {e}")))?;

    let mut event = Event::empty();
    unsafe { kernel.cmd().enew(&mut event).enq() }
        .map_err(|e| EngineError::Device(format!("autotune profiled launch: {e}")))?;
    queue
        .finish()
        .map_err(|e| EngineError::Device(format!("autotune finish: {e}")))?;

    let start = profiling_ns(&event, ProfilingInfo::Start)?;
    let end = profiling_ns(&event, ProfilingInfo::End)?;
    Ok(end.saturating_sub(start))
}

fn profiling_ns(event: &Event, info: ProfilingInfo) -> Result<u64, EngineError> {
    let result = event
        .profiling_info(info)
        .map_err(|e| EngineError::Device(format!("profiling query: {e}")))?;
    match result {
        ProfilingInfoResult::Queued(ns)
        | ProfilingInfoResult::Submit(ns)
        | ProfilingInfoResult::Start(ns)
        | ProfilingInfoResult::End(ns) => Ok(ns),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
