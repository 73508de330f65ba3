use super::PlatformExtensions;

pub struct Platform;

#[cfg(target_os = "windows")]
use windows_sys::Win32::{
    Foundation::CloseHandle,
    System::Threading::{GetPriorityClass, OpenProcess, PROCESS_QUERY_INFORMATION},
};

impl PlatformExtensions for Platform {
    #[cfg(target_os = "windows")]
    fn process_priority(pid: u32) -> Option<i32> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_INFORMATION, 0, pid);
            if handle.is_null() {
                return None;
            }
            let prio = GetPriorityClass(handle);
            CloseHandle(handle);
            if prio == 0 { None } else { Some(prio as i32) }
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn process_priority(_pid: u32) -> Option<i32> {
        None
    }

    fn process_thread_count(_pid: u32) -> Option<u32> {
        // Needs a toolhelp snapshot walk; sysinfo's memory refresh does not
        // carry it and a per-pid snapshot per cycle is too expensive.
        None
    }
}
