//! Segment-kernel driver.
//!
//! One `crypt_all` turns into: upload the first-blocks strip, then for every
//! pass and every slice — in exactly that nested order — one launch of the
//! variant's segment kernel followed by a full `finish`, then a readback of
//! the final block of every lane. The per-step barrier is what Argon2's
//! dataflow demands: within a slice all lanes run in parallel, across slices
//! every lane must see every other lane's previous slice.
//!
//! The kernel contract is fixed seven arguments: a local-memory shuffle
//! buffer, the scratch buffer, then `t_cost`, `lanes`, `segment_blocks`,
//! `pass`, `slice` as `u32`.

use crate::autotune::Geometry;
use crate::context::{kernel_name, GpuContext};
use crate::encoding::{SaltDescriptor, Variant};
use crate::error::EngineError;
use crate::planner::DeviceMemory;
use crate::{BLOCK_BYTES, SYNC_POINTS, THREADS_PER_LANE};
use ocl::{Buffer, Kernel, Queue};

/// Build a segment kernel for one launch configuration.
///
/// Global geometry covers `THREADS_PER_LANE * lanes` work items per candidate
/// across the whole batch; the local geometry is the autotuned tiling.
#[allow(clippy::too_many_arguments)]
pub(crate) fn segment_kernel(
    ctx: &GpuContext,
    queue: &Queue,
    scratch: &Buffer<u8>,
    variant: Variant,
    t_cost: u32,
    lanes: u32,
    segment_blocks: u32,
    batch: u32,
    geometry: Geometry,
) -> Result<Kernel, EngineError> {
    let shuffle_words = (THREADS_PER_LANE as usize)
        .saturating_mul(geometry.lanes_per_block as usize)
        .saturating_mul(geometry.jobs_per_block as usize);
    Kernel::builder()
        .program(ctx.program())
        .name(kernel_name(variant))
        .queue(queue.clone())
        .global_work_size((
            (THREADS_PER_LANE as usize).saturating_mul(lanes as usize),
            batch as usize,
        ))
        .local_work_size((
            (THREADS_PER_LANE as usize).saturating_mul(geometry.lanes_per_block as usize),
            geometry.jobs_per_block as usize,
        ))
        .arg_local::<u64>(shuffle_words)
        .arg(scratch)
        .arg(t_cost)
        .arg(lanes)
        .arg(segment_blocks)
        .arg(0u32)
        .arg(0u32)
        .build()
        .map_err(|e| EngineError::Device(format!("building {} kernel: {e}", kernel_name(variant))))
}

/// Run the full memory fill for the current batch.
///
/// `memory.blocks_in` must already hold the first two blocks of every lane of
/// every candidate; on success `memory.blocks_out` holds the final block of
/// every lane. The kernel always covers the whole batch capacity — slots
/// beyond the caller's live candidates compute garbage and are ignored.
///
/// # Errors
///
/// [`EngineError::Config`] for an invalid tiling (a configuration bug, not
/// input), [`EngineError::Device`] for any failed transfer, launch or finish;
/// there is no partial-batch result.
pub fn run_segments(
    ctx: &GpuContext,
    memory: &mut DeviceMemory,
    descriptor: &SaltDescriptor,
    geometry: Geometry,
) -> Result<(), EngineError> {
    let lanes = descriptor.lanes;
    let batch = memory.batch_capacity();
    geometry.validate(lanes, batch, ctx.local_mem_budget())?;

    let slab_bytes = descriptor.bytes_per_candidate();
    let out_strip = (lanes as usize).saturating_mul(BLOCK_BYTES);
    let in_strip = out_strip.saturating_mul(2);

    memory.upload_first_blocks(in_strip, slab_bytes)?;

    let kernel = segment_kernel(
        ctx,
        ctx.queue(),
        memory.scratch(),
        descriptor.variant,
        descriptor.t_cost,
        lanes,
        descriptor.segment_blocks(),
        batch,
        geometry,
    )?;

    for pass in 0..descriptor.t_cost {
        for slice in 0..SYNC_POINTS {
            kernel
                .set_arg(5, pass)
                .map_err(|e| EngineError::Device(format!("setting pass argument: {e}")))?;
            kernel
                .set_arg(6, slice)
                .map_err(|e| EngineError::Device(format!("setting slice argument: {e}")))?;
            unsafe { kernel.cmd().enq() }.map_err(|e| {
                EngineError::Device(format!("segment launch (pass {pass}, slice {slice}): {e}"))
            })?;
            ctx.queue()
                .finish()
                .map_err(|e| EngineError::Device(format!("finish after pass {pass}: {e}")))?;
        }
    }

    memory.download_lane_tails(out_strip, slab_bytes)
}
