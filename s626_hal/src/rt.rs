//! Real-time setup for the polling thread.
//!
//! Setup sequence, run on the polling thread before its first cycle:
//!
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` - lock all pages.
//! 2. `sched_setaffinity` - pin to the configured CPU core.
//! 3. `sched_setscheduler(SCHED_FIFO, priority)` - RT priority.
//!
//! Every step is a no-op unless the `rt` feature is enabled.

use s626_common::error::DaqError;

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), DaqError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| DaqError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), DaqError> {
    Ok(())
}

/// Pin the current thread to a CPU core.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), DaqError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| DaqError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| DaqError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), DaqError> {
    Ok(())
}

/// Switch the current thread to SCHED_FIFO.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), DaqError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(DaqError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), DaqError> {
    Ok(())
}

/// Run the full setup sequence on the calling thread.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), DaqError> {
    rt_mlockall()?;
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

/// Whether the calling thread runs under a real-time scheduling policy.
pub fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: querying the calling thread's policy has no preconditions.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
