use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use tracing::Level;

use procscope::config::{self, Config};
use procscope::format::format_bytes;
use procscope::system::cache::SnapshotCache;
use procscope::system::monitor::ProcessMonitor;
use procscope::system::source::SysinfoSource;
use procscope::tasks::TaskQueue;

#[derive(Parser)]
#[command(
    name = "procscope",
    about = "Live process-table sampler with a plain-text front end"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Update interval in milliseconds
    #[arg(long)]
    interval: Option<u64>,

    /// Number of refreshes before exiting (0 = run until interrupted)
    #[arg(long, default_value_t = 0)]
    iterations: usize,

    /// Rows to print per refresh
    #[arg(long)]
    top: Option<usize>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let config = load_config_for_cli(&cli);

    let interval = Duration::from_millis(config.monitor.update_interval_ms);
    let source = SysinfoSource::new(config.monitor.show_kernel_threads);
    let monitor = Arc::new(ProcessMonitor::new(source, interval));
    let queue = TaskQueue::new(config.monitor.copy_workers);
    let cache = SnapshotCache::new();

    monitor.run();

    let mut iteration = 0usize;
    loop {
        cache.refresh(&monitor, &queue);
        std::thread::sleep(interval);
        print_table(&cache, &config, &monitor);

        iteration += 1;
        if cli.iterations > 0 && iteration >= cli.iterations {
            break;
        }
    }

    monitor.terminate();
    Ok(())
}

fn print_table(cache: &SnapshotCache, config: &Config, monitor: &ProcessMonitor) {
    let snapshot = cache.snapshot();
    if snapshot.is_empty() {
        println!("(waiting for first sample...)");
        return;
    }

    let mut rows: Vec<_> = snapshot
        .entries()
        .iter()
        .map(|record| {
            let state = record.lock();
            (
                record.pid(),
                state.parent_pid,
                state.module_id,
                state.name.clone(),
                state.memory_usage,
                state.thread_count,
                state.priority_class,
            )
        })
        .collect();
    rows.sort_by(|a, b| b.4.cmp(&a.4));
    rows.truncate(config.output.top);

    println!(
        "--- {} processes (showing {}) ---",
        monitor.num_processes(),
        rows.len()
    );
    let mut header = format!("{:>8}  {:<28}{:>10}", "PID", "NAME", "MEMORY");
    if config.output.show_parent_pid {
        header.push_str(&format!("{:>8}", "PPID"));
    }
    if config.output.show_module_id {
        header.push_str(&format!("{:>8}", "MODULE"));
    }
    if config.output.show_threads {
        header.push_str(&format!("{:>8}", "THR"));
    }
    if config.output.show_priority {
        header.push_str(&format!("{:>6}", "PRI"));
    }
    println!("{header}");

    for (pid, ppid, module_id, name, memory, threads, priority) in rows {
        let mut line = format!("{:>8}  {:<28}{:>10}", pid, name, format_bytes(memory));
        if config.output.show_parent_pid {
            line.push_str(&format!("{:>8}", ppid));
        }
        if config.output.show_module_id {
            line.push_str(&format!("{:>8}", module_id));
        }
        if config.output.show_threads {
            line.push_str(&format!("{:>8}", threads));
        }
        if config.output.show_priority {
            line.push_str(&format!("{:>6}", priority));
        }
        println!("{line}");
    }
}

fn init_tracing(level: &str) {
    let level = match level {
        "error" => Level::ERROR,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::WARN,
    };
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from_path(path),
        None => config::load_config(),
    };

    if let Some(interval) = cli.interval {
        config.monitor.update_interval_ms = interval;
    }
    if let Some(top) = cli.top {
        config.output.top = top;
    }

    config
}
