/// Per-OS reads for process fields `sysinfo` does not expose. Every accessor
/// is best-effort: a restricted or vanished process yields `None` and the row
/// is still usable with its remaining fields.
pub trait PlatformExtensions {
    fn process_priority(pid: u32) -> Option<i32>;
    fn process_thread_count(pid: u32) -> Option<u32>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn process_priority(pid: u32) -> Option<i32> {
    platform_impl::Platform::process_priority(pid)
}

pub fn process_thread_count(pid: u32) -> Option<u32> {
    platform_impl::Platform::process_thread_count(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_has_at_least_one_thread() {
        let pid = std::process::id();
        if let Some(threads) = process_thread_count(pid) {
            assert!(threads >= 1, "thread count {threads} for own pid {pid}");
        }
    }

    #[test]
    fn nonexistent_pid_yields_none() {
        // Pid near the top of the range; extremely unlikely to exist.
        assert_eq!(process_priority(u32::MAX - 7), None);
        assert_eq!(process_thread_count(u32::MAX - 7), None);
    }
}
