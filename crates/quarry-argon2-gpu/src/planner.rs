//! GPU memory planning.
//!
//! One device allocation serves every batch: a scratch buffer sized for the
//! worst-case (variant, lanes, `m_cost`) in the target set, times the batch
//! capacity. If the device refuses the allocation, the batch capacity is
//! halved and the attempt repeated; running out at zero is fatal. Host
//! staging buffers for the first-blocks strip and the lane tails are sized in
//! lockstep with whatever capacity the device accepted.
//!
//! Planning happens once per engine; changing the target set afterwards
//! requires a full tear-down.

use crate::context::GpuContext;
use crate::encoding::SaltDescriptor;
use crate::error::EngineError;
use crate::BLOCK_BYTES;
use ocl::{Buffer, MemFlags};
use zeroize::Zeroize;

/// Worst-case dimensions over a set of decoded targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryPlan {
    /// Highest lane count in the target set.
    pub max_lanes: u32,
    /// Highest per-(lane, slice) block count in the target set.
    pub max_segment_blocks: u32,
    /// Largest per-candidate device footprint in bytes.
    pub slab_bytes: usize,
}

impl MemoryPlan {
    /// Compute the worst case over `targets`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] when `targets` is empty — there is nothing
    /// to size the scratch buffer for.
    pub fn survey(targets: &[SaltDescriptor]) -> Result<Self, EngineError> {
        if targets.is_empty() {
            return Err(EngineError::Config(
                "memory plan needs at least one decoded target".into(),
            ));
        }
        let mut plan = Self {
            max_lanes: 0,
            max_segment_blocks: 0,
            slab_bytes: 0,
        };
        for descriptor in targets {
            plan.max_lanes = plan.max_lanes.max(descriptor.lanes);
            plan.max_segment_blocks = plan.max_segment_blocks.max(descriptor.segment_blocks());
            plan.slab_bytes = plan.slab_bytes.max(descriptor.bytes_per_candidate());
        }
        Ok(plan)
    }
}

/// The scratch buffer plus its host-side staging companions.
///
/// `blocks_in` stages the first two blocks of every lane of every candidate;
/// `blocks_out` receives the final block of every lane after the fill. Both
/// are wiped on drop — they hold password-derived material.
pub struct DeviceMemory {
    plan: MemoryPlan,
    batch_capacity: u32,
    scratch: Buffer<u8>,
    blocks_in: Vec<u8>,
    blocks_out: Vec<u8>,
}

impl DeviceMemory {
    /// Allocate the scratch buffer for up to `requested_batch` candidates,
    /// halving on failure.
    ///
    /// # Errors
    ///
    /// [`EngineError::OutOfMemory`] when not even a single candidate fits;
    /// [`EngineError::Config`] when `requested_batch` is zero.
    pub fn allocate(
        ctx: &GpuContext,
        plan: MemoryPlan,
        requested_batch: u32,
    ) -> Result<Self, EngineError> {
        if requested_batch == 0 {
            return Err(EngineError::Config("batch capacity must be at least 1".into()));
        }

        let (batch_capacity, scratch) = shrink_to_fit(requested_batch, |batch| {
            let total = plan
                .slab_bytes
                .checked_mul(batch as usize)
                .ok_or_else(|| "scratch size overflows the address space".to_string())?;
            Buffer::<u8>::builder()
                .queue(ctx.queue().clone())
                .flags(MemFlags::new().read_write())
                .len(total)
                .build()
                .map_err(|e| e.to_string())
        })?;

        log::info!(
            "renting {} MiB of device memory for {batch_capacity} candidates \
             ({} MiB global, {} MiB max alloc)",
            plan.slab_bytes.saturating_mul(batch_capacity as usize) / 1_048_576,
            ctx.global_mem_bytes() / 1_048_576,
            ctx.max_alloc_bytes() / 1_048_576
        );

        // One tail block per lane per candidate; the input strip is twice that.
        let tail_bytes = (batch_capacity as usize)
            .saturating_mul(plan.max_lanes as usize)
            .saturating_mul(BLOCK_BYTES);
        Ok(Self {
            plan,
            batch_capacity,
            scratch,
            blocks_in: vec![0u8; tail_bytes.saturating_mul(2)],
            blocks_out: vec![0u8; tail_bytes],
        })
    }

    /// Worst-case dimensions this memory was sized for.
    #[must_use]
    pub fn plan(&self) -> MemoryPlan {
        self.plan
    }

    /// Candidates per `crypt_all` after downsizing; never shrinks afterwards.
    #[must_use]
    pub fn batch_capacity(&self) -> u32 {
        self.batch_capacity
    }

    /// The single device-side allocation.
    #[must_use]
    pub fn scratch(&self) -> &Buffer<u8> {
        &self.scratch
    }

    /// Staging view for candidate `index`'s first-blocks strip, packed at the
    /// stride of the current salt's lane count.
    pub(crate) fn input_slot(&mut self, index: usize, lanes: u32) -> &mut [u8] {
        let stride = (lanes as usize).saturating_mul(2).saturating_mul(BLOCK_BYTES);
        let start = index.saturating_mul(stride);
        &mut self.blocks_in[start..start.saturating_add(stride)]
    }

    /// Staging view of candidate `index`'s lane tails after a fill.
    pub(crate) fn output_tails(&self, index: usize, lanes: u32) -> &[u8] {
        let stride = (lanes as usize).saturating_mul(BLOCK_BYTES);
        let start = index.saturating_mul(stride);
        &self.blocks_out[start..start.saturating_add(stride)]
    }

    /// Upload the first-blocks strip: one row per candidate, host rows packed
    /// at `strip_bytes`, device rows at `slab_bytes`.
    pub(crate) fn upload_first_blocks(
        &self,
        strip_bytes: usize,
        slab_bytes: usize,
    ) -> Result<(), EngineError> {
        let rows = self.batch_capacity as usize;
        self.scratch
            .write(&self.blocks_in)
            .rect(
                [0, 0, 0],
                [0, 0, 0],
                [strip_bytes, rows, 1],
                strip_bytes,
                strip_bytes.saturating_mul(rows),
                slab_bytes,
                slab_bytes.saturating_mul(rows),
            )
            .enq()
            .map_err(|e| EngineError::Device(format!("uploading first blocks: {e}")))
    }

    /// Read back the final block of every lane: the last `strip_bytes` of
    /// each candidate slab. Blocks until the copy is complete.
    pub(crate) fn download_lane_tails(
        &mut self,
        strip_bytes: usize,
        slab_bytes: usize,
    ) -> Result<(), EngineError> {
        let Self {
            scratch,
            blocks_out,
            batch_capacity,
            ..
        } = self;
        let rows = *batch_capacity as usize;
        scratch
            .read(&mut blocks_out[..])
            .rect(
                [slab_bytes.saturating_sub(strip_bytes), 0, 0],
                [0, 0, 0],
                [strip_bytes, rows, 1],
                slab_bytes,
                slab_bytes.saturating_mul(rows),
                strip_bytes,
                strip_bytes.saturating_mul(rows),
            )
            .enq()
            .map_err(|e| EngineError::Device(format!("reading lane tails: {e}")))
    }
}

impl Drop for DeviceMemory {
    fn drop(&mut self) {
        self.blocks_in.zeroize();
        self.blocks_out.zeroize();
    }
}

/// Halve `batch` until `attempt` succeeds. The floor of one candidate is
/// always tried before giving up.
fn shrink_to_fit<T, E: std::fmt::Display>(
    mut batch: u32,
    mut attempt: impl FnMut(u32) -> Result<T, E>,
) -> Result<(u32, T), EngineError> {
    while batch >= 1 {
        match attempt(batch) {
            Ok(value) => return Ok((batch, value)),
            Err(e) => {
                log::warn!("scratch allocation for {batch} candidates failed ({e}); halving");
                batch /= 2;
            }
        }
    }
    Err(EngineError::OutOfMemory(
        "scratch allocation failed even for a single candidate".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode;

    fn descriptors() -> Vec<SaltDescriptor> {
        [
            "$argon2d$v=19$m=4096,t=3,p=1$ZGFtYWdlX2RvbmU$w9w3s5/zV8+PcAZlJhnTCOE+vBkZssmZf6jOq3dKv50",
            "$argon2i$v=19$m=16384,t=4,p=3$YW5vdGhlcl9zYWx0$K7unxwO5aeuZCpnIJ06FMCRKod3eRg8oIRzQrK3E6mGbyqlTvvl47jeDWq/5drF1COJkEF9Ty7FWXJZHa+vqlf2YZGp/4qSlAvKmdtJ/6JZU32iQItzMRwcfujHE+PBjbL5uz4966A",
        ]
        .iter()
        .map(|s| decode(s).unwrap().0)
        .collect()
    }

    #[test]
    fn survey_takes_maxima_per_axis() {
        let plan = MemoryPlan::survey(&descriptors()).unwrap();
        assert_eq!(plan.max_lanes, 3);
        // m=4096 p=1 -> 1024 segment blocks; m=16384 p=3 -> 1365.
        assert_eq!(plan.max_segment_blocks, 1365);
        // Largest slab: 3 lanes * 4 slices * 1365 blocks * 1 KiB.
        assert_eq!(plan.slab_bytes, 3 * 4 * 1365 * BLOCK_BYTES);
    }

    #[test]
    fn survey_rejects_empty_target_set() {
        assert!(matches!(
            MemoryPlan::survey(&[]),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn shrink_to_fit_halves_until_acceptance() {
        let mut attempts = Vec::new();
        let (batch, ()) = shrink_to_fit(256, |b| {
            attempts.push(b);
            if b <= 32 {
                Ok(())
            } else {
                Err("too big")
            }
        })
        .unwrap();
        assert_eq!(batch, 32);
        assert_eq!(attempts, vec![256, 128, 64, 32]);
    }

    #[test]
    fn shrink_to_fit_keeps_the_floor_of_one() {
        let (batch, ()) = shrink_to_fit(5, |b| if b == 1 { Ok(()) } else { Err("no") }).unwrap();
        assert_eq!(batch, 1);
    }

    #[test]
    fn shrink_to_fit_reports_exhaustion_as_fatal() {
        let result: Result<(u32, ()), _> = shrink_to_fit(64, |_| Err::<(), _>("never"));
        assert!(matches!(result, Err(EngineError::OutOfMemory(_))));
    }
}
