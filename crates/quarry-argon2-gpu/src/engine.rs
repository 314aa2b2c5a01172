//! The batch & comparison facade.
//!
//! [`CrackEngine`] is the narrow contract the outer cracking harness drives:
//! pick a salt, stage up to [`CrackEngine::max_keys`] candidate passwords,
//! run the pipeline with `crypt_all`, compare with `cmp_one`. Construction
//! performs the one-time reset work: survey the target set, rent the scratch
//! buffer (halving the batch until the device accepts), and autotune every
//! distinct (variant, lanes, segment-blocks) the targets will need.

use crate::autotune::{self, AutotuneTable};
use crate::context::GpuContext;
use crate::encoding::{SaltDescriptor, TagCell};
use crate::error::EngineError;
use crate::finalize::extract_tag;
use crate::initialize::fill_first_blocks;
use crate::pipeline::run_segments;
use crate::planner::{DeviceMemory, MemoryPlan};
use crate::{MAX_PASSWORD, MAX_TAG};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default batch capacity requested at construction, before downsizing.
pub const DEFAULT_MAX_KEYS: u32 = 256;

/// One stored candidate password.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct Candidate {
    bytes: [u8; MAX_PASSWORD],
    len: usize,
}

impl Default for Candidate {
    fn default() -> Self {
        Self {
            bytes: [0u8; MAX_PASSWORD],
            len: 0,
        }
    }
}

impl Candidate {
    fn store(&mut self, key: &[u8]) {
        self.zeroize();
        let len = key.len().min(MAX_PASSWORD);
        self.bytes[..len].copy_from_slice(&key[..len]);
        self.len = len;
    }

    fn key(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// GPU-backed Argon2 batch evaluator.
pub struct CrackEngine {
    ctx: GpuContext,
    memory: DeviceMemory,
    autotune: AutotuneTable,
    salt: Option<SaltDescriptor>,
    keys: Vec<Candidate>,
    crypted: Vec<TagCell>,
}

impl CrackEngine {
    /// Open `device_index`, size the scratch buffer for `targets`, and run
    /// the autotune sweep over every distinct salt shape in the set.
    ///
    /// `requested_batch` is the starting batch capacity; the planner may
    /// halve it to fit device memory. Sizing is fixed afterwards — a changed
    /// target set needs a new engine.
    ///
    /// # Errors
    ///
    /// Anything fatal from context creation, planning, or the baseline
    /// autotune measurements.
    pub fn new(
        device_index: usize,
        targets: &[SaltDescriptor],
        requested_batch: u32,
    ) -> Result<Self, EngineError> {
        let ctx = GpuContext::new(device_index)?;
        let plan = MemoryPlan::survey(targets)?;
        let memory = DeviceMemory::allocate(&ctx, plan, requested_batch)?;

        let mut table = AutotuneTable::new(plan.max_lanes, plan.max_segment_blocks);
        for descriptor in targets {
            autotune::tune(
                &mut table,
                &ctx,
                memory.scratch(),
                memory.batch_capacity(),
                descriptor.variant,
                descriptor.lanes,
                descriptor.segment_blocks(),
            )?;
        }

        let capacity = memory.batch_capacity() as usize;
        Ok(Self {
            ctx,
            memory,
            autotune: table,
            salt: None,
            keys: vec![Candidate::default(); capacity],
            crypted: vec![[0u8; MAX_TAG]; capacity],
        })
    }

    /// Candidates one `crypt_all` evaluates.
    #[must_use]
    pub fn max_keys(&self) -> u32 {
        self.memory.batch_capacity()
    }

    /// Select the salt the next batch runs against.
    pub fn set_salt(&mut self, descriptor: &SaltDescriptor) {
        self.salt = Some(*descriptor);
    }

    /// Store candidate `index`, truncated to [`MAX_PASSWORD`] bytes.
    pub fn set_key(&mut self, index: usize, key: &[u8]) {
        self.keys[index].store(key);
    }

    /// The stored candidate `index` (after any truncation).
    #[must_use]
    pub fn get_key(&self, index: usize) -> &[u8] {
        self.keys[index].key()
    }

    /// Evaluate the leading `count` candidates against the current salt.
    ///
    /// Initialization and finalization run on the host; the memory fill runs
    /// on the device with the memoized geometry. A batch either completes or
    /// fails as a whole.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] when no salt is set, `count` exceeds the
    /// batch capacity, or the salt was not part of the autotuned target set;
    /// [`EngineError::Device`] for any device failure.
    pub fn crypt_all(&mut self, count: usize) -> Result<(), EngineError> {
        let descriptor = self
            .salt
            .ok_or_else(|| EngineError::Config("crypt_all before set_salt".into()))?;
        if count > self.max_keys() as usize {
            return Err(EngineError::Config(format!(
                "batch of {count} exceeds capacity {}",
                self.max_keys()
            )));
        }

        // The geometry gate also bounds the salt's staging footprint: a
        // measured (variant, lanes, segment_blocks) was part of the survey.
        let geometry = self
            .autotune
            .lookup(descriptor.variant, descriptor.lanes, descriptor.segment_blocks())
            .ok_or_else(|| {
                EngineError::Config("salt was not part of the planned target set".into())
            })?;

        for index in 0..count {
            let slot = self.memory.input_slot(index, descriptor.lanes);
            fill_first_blocks(self.keys[index].key(), &descriptor, slot);
        }

        run_segments(&self.ctx, &mut self.memory, &descriptor, geometry)?;

        for index in 0..count {
            let tails = self.memory.output_tails(index, descriptor.lanes);
            extract_tag(tails, descriptor.hash_size as usize, &mut self.crypted[index]);
        }
        Ok(())
    }

    /// Permissive pre-filter; precision lives in [`Self::cmp_one`].
    #[must_use]
    pub fn cmp_all(&self, _expected: &[u8]) -> bool {
        true
    }

    /// Whether candidate `index`'s tag equals the expected tag over the
    /// current salt's `hash_size` bytes.
    ///
    /// `expected` must hold at least `hash_size` bytes (a [`TagCell`] always
    /// does).
    #[must_use]
    pub fn cmp_one(&self, index: usize, expected: &[u8]) -> bool {
        let Some(descriptor) = &self.salt else {
            return false;
        };
        let n = descriptor.hash_size as usize;
        self.crypted[index][..n] == expected[..n]
    }

    /// The computed tag cell for candidate `index` (valid after `crypt_all`).
    #[must_use]
    pub fn tag(&self, index: usize) -> &TagCell {
        &self.crypted[index]
    }
}
