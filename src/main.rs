use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use linesort::{config, utils, SortConfig, SortDriver};

#[derive(Parser)]
#[command(name = "linesort")]
#[command(about = "External merge sort for huge files of numbered text lines")]
#[command(version)]
struct Args {
    #[arg(long, default_value = "data.txt", help = "Source file")]
    input: PathBuf,

    #[arg(long, default_value = "result.txt", help = "Destination file")]
    output: PathBuf,

    #[arg(
        long,
        default_value = "temp_chunks",
        help = "Scratch directory; wiped on start, deleted on end"
    )]
    temp: PathBuf,

    #[arg(long, default_value_t = 200, help = "Per-chunk memory cap in MB")]
    chunk_size: usize,

    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Serialize reads and writes for spinning disks"
    )]
    hdd_mode: bool,

    #[arg(long, default_value_t = 2, help = "Sorter thread count")]
    cores: usize,

    #[arg(long, default_value_t = 2, help = "Pipeline queue capacity")]
    channels: usize,

    #[arg(short, long, help = "Verbose output")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose)?;

    let sort_config = SortConfig {
        temp_directory: args.temp,
        chunk_size_mb: args.chunk_size,
        sorter_count: config::clamp_sorter_count(args.cores),
        channel_capacity: args.channels,
        hdd_mode: args.hdd_mode,
        verbose: args.verbose,
        ..SortConfig::default()
    };

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nShutdown signal received, stopping...");
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }
    });

    let driver = SortDriver::new(sort_config).with_shutdown_signal(shutdown_flag);
    let stats = driver
        .process(&args.input, &args.output)
        .await
        .context("sort failed")?;

    println!("Sorted {} -> {}", args.input.display(), args.output.display());
    println!(
        "  lines: {} kept, {} dropped",
        stats.lines_read - stats.lines_dropped,
        stats.lines_dropped
    );
    println!(
        "  chunks: {}, merge passes: {}",
        stats.chunks_created, stats.merge_passes
    );
    println!(
        "  split: {}, merge: {}, total: {}",
        utils::format_duration(stats.split_time_ms),
        utils::format_duration(stats.merge_time_ms),
        utils::format_duration(stats.total_time_ms)
    );
    println!(
        "  throughput: {:.1} MB/s, peak rss: {} MB",
        stats.avg_mb_per_s, stats.peak_rss_mb
    );

    Ok(())
}
