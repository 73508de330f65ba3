use super::PlatformExtensions;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn process_priority(pid: u32) -> Option<i32> {
        // Read /proc/{pid}/stat and parse priority (field 18, 0-indexed from stat)
        stat_field(pid, 15)
    }

    fn process_thread_count(pid: u32) -> Option<u32> {
        stat_field(pid, 17)
    }
}

/// Field index counted from the first field after `comm`; the comm field may
/// contain spaces and parens, so parsing starts after the closing `)`.
fn stat_field<T: std::str::FromStr>(pid: u32, index: usize) -> Option<T> {
    let path = format!("/proc/{pid}/stat");
    let contents = std::fs::read_to_string(path).ok()?;
    let after_comm = contents.rfind(')')? + 1;
    // Fields after comm: state(0) ppid(1) pgrp(2) session(3) tty_nr(4)
    // tpgid(5) flags(6) minflt(7) cminflt(8) majflt(9) cmajflt(10)
    // utime(11) stime(12) cutime(13) cstime(14) priority(15) nice(16)
    // num_threads(17)
    contents[after_comm..]
        .split_whitespace()
        .nth(index)?
        .parse()
        .ok()
}
