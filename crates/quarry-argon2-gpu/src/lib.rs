//! `quarry-argon2-gpu` — GPU-accelerated Argon2 candidate evaluation for QUARRY.
//!
//! The crate evaluates batches of candidate passwords against Argon2-encoded
//! targets on an OpenCL device. The host side stays deliberately thin:
//!
//! - [`encoding`] decodes `$argon2{d,i,id}$…` target strings into an immutable
//!   [`SaltDescriptor`] plus an expected-tag cell
//! - [`initialize`] computes the first two blocks of every lane on the CPU
//! - [`pipeline`] drives the variant-specific segment kernel once per
//!   (pass, slice), with a full barrier between steps
//! - [`finalize`] reduces the lane tails back into the Argon2 tag
//! - [`autotune`] picks the work-group geometry per (variant, lanes,
//!   segment-blocks) by profiled microbenchmark
//! - [`engine`] ties it together behind the batch contract
//!   (`set_salt` / `set_key` / `crypt_all` / `cmp_one`)
//!
//! Only Argon2 version 0x13 is supported; secret and associated-data inputs
//! are not.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod autotune;
pub mod context;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod initialize;
mod long_hash;
pub mod pipeline;
pub mod planner;

pub use autotune::{AutotuneTable, Geometry};
pub use context::GpuContext;
pub use encoding::{decode, is_valid, SaltDescriptor, TagCell, Variant};
pub use engine::{CrackEngine, DEFAULT_MAX_KEYS};
pub use error::EngineError;
pub use planner::{DeviceMemory, MemoryPlan};

/// Lane-synchronization points (slices) per pass.
pub const SYNC_POINTS: u32 = 4;

/// Device work items cooperating on one lane.
pub const THREADS_PER_LANE: u32 = 32;

/// Size of one Argon2 memory block in bytes (128 × 64-bit words).
pub const BLOCK_BYTES: usize = 1024;

/// Longest candidate password stored per slot; longer keys are truncated.
pub const MAX_PASSWORD: usize = 100;

/// Fixed per-candidate tag storage; actual tags are 4–256 bytes.
pub const MAX_TAG: usize = 256;

/// Longest salt the encoded form may carry.
pub const MAX_SALT: usize = 64;

/// Number of Argon2 variants (`d`, `i`, `id`).
pub const NUM_VARIANTS: usize = 3;
