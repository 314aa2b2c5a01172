//! OpenCL device context.
//!
//! Owns the platform/device selection, the in-order command queue driving the
//! pipeline, a second profiling-enabled queue used only by the autotuner, and
//! the compiled segment program. Everything is released on drop.

use crate::encoding::Variant;
use crate::error::EngineError;
use crate::NUM_VARIANTS;
use ocl::enums::{DeviceInfo, DeviceInfoResult};
use ocl::flags::CommandQueueProperties;
use ocl::{Context, Device, Platform, Program, Queue};

/// Segment kernel source shipped with the crate. The kernel is a consumed
/// artifact: the host only knows its entry-point names and argument layout.
const KERNEL_SRC: &str = include_str!("kernels/argon2_segment.cl");

/// Entry points, indexed by [`Variant::kernel_index`].
const KERNEL_NAMES: [&str; NUM_VARIANTS] = [
    "argon2_kernel_segment_0",
    "argon2_kernel_segment_1",
    "argon2_kernel_segment_2",
];

/// The device entry point evaluating segments of the given variant.
#[must_use]
pub fn kernel_name(variant: Variant) -> &'static str {
    KERNEL_NAMES[variant.kernel_index() as usize]
}

/// A selected OpenCL device with its queues, program and limits.
pub struct GpuContext {
    device: Device,
    queue: Queue,
    profiling_queue: Queue,
    program: Program,
    local_mem: u64,
    max_alloc: u64,
    global_mem: u64,
}

impl GpuContext {
    /// Number of OpenCL devices on the default platform.
    #[must_use]
    pub fn device_count() -> usize {
        Device::list_all(Platform::default()).map_or(0, |devices| devices.len())
    }

    /// Open device `device_index` of the default platform and compile the
    /// segment program for it.
    ///
    /// # Errors
    ///
    /// [`EngineError::Device`] when the device does not exist, a queue cannot
    /// be created, or the program fails to build.
    pub fn new(device_index: usize) -> Result<Self, EngineError> {
        let platform = Platform::default();
        let devices = Device::list_all(platform)
            .map_err(|e| EngineError::Device(format!("listing devices: {e}")))?;
        let device = *devices.get(device_index).ok_or_else(|| {
            EngineError::Device(format!(
                "device index {device_index} out of range ({} available)",
                devices.len()
            ))
        })?;

        log::info!(
            "using OpenCL device {device_index}: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        let context = Context::builder()
            .platform(platform)
            .devices(device)
            .build()
            .map_err(|e| EngineError::Device(format!("creating context: {e}")))?;
        let queue = Queue::new(&context, device, None)
            .map_err(|e| EngineError::Device(format!("creating queue: {e}")))?;
        let profiling_queue = Queue::new(
            &context,
            device,
            Some(CommandQueueProperties::new().profiling()),
        )
        .map_err(|e| EngineError::Device(format!("creating profiling queue: {e}")))?;

        let program = Program::builder()
            .devices(device)
            .src(KERNEL_SRC)
            .build(&context)
            .map_err(|e| EngineError::Device(format!("building segment program: {e}")))?;

        let local_mem = device_info_u64(device, DeviceInfo::LocalMemSize)?;
        let max_alloc = device_info_u64(device, DeviceInfo::MaxMemAllocSize)?;
        let global_mem = device_info_u64(device, DeviceInfo::GlobalMemSize)?;
        log::debug!(
            "device limits: {} KiB local, {} MiB max alloc, {} MiB global",
            local_mem / 1024,
            max_alloc / 1_048_576,
            global_mem / 1_048_576
        );

        Ok(Self {
            device,
            queue,
            profiling_queue,
            program,
            local_mem,
            max_alloc,
            global_mem,
        })
    }

    /// The in-order queue the pipeline submits to.
    #[must_use]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Profiling-enabled queue; autotune timings come from its events.
    #[must_use]
    pub fn profiling_queue(&self) -> &Queue {
        &self.profiling_queue
    }

    /// The compiled segment program.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Local-memory budget per work-group, in bytes.
    #[must_use]
    pub fn local_mem_budget(&self) -> u64 {
        self.local_mem
    }

    /// Largest single allocation the device accepts, in bytes.
    #[must_use]
    pub fn max_alloc_bytes(&self) -> u64 {
        self.max_alloc
    }

    /// Total device memory, in bytes.
    #[must_use]
    pub fn global_mem_bytes(&self) -> u64 {
        self.global_mem
    }

    /// The underlying device handle.
    #[must_use]
    pub fn device(&self) -> Device {
        self.device
    }
}

fn device_info_u64(device: Device, info: DeviceInfo) -> Result<u64, EngineError> {
    let result = device
        .info(info)
        .map_err(|e| EngineError::Device(format!("querying {info:?}: {e}")))?;
    match result {
        DeviceInfoResult::LocalMemSize(v)
        | DeviceInfoResult::MaxMemAllocSize(v)
        | DeviceInfoResult::GlobalMemSize(v) => Ok(v),
        other => Err(EngineError::Device(format!(
            "unexpected result for {info:?}: {other:?}"
        ))),
    }
}
