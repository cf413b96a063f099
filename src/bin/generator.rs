use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc::sync_channel;
use std::thread;

use anyhow::{bail, Result};
use clap::Parser;
use rand::Rng;

use linesort::constants::{BYTES_PER_GB, BYTES_PER_MB};
use linesort::utils;

/// Producers hand the writer batches of roughly this size; the final batch
/// bounds the overshoot past the target, well inside the 512 KiB allowance.
const BATCH_SIZE_BYTES: usize = 256 * 1024;

/// A finite pool keeps duplicate texts frequent, which is what exercises the
/// numeric tie-break downstream.
const PHRASES: &[&str] = &[
    "Apple",
    "Banana is yellow",
    "Cherry is the best",
    "Something something something",
    "Dragonfruit",
    "Elderberry syrup",
    "Fig and walnut",
    "Grape expectations",
    "Honeydew melon season",
    "Iceberg lettuce again",
    "Jackfruit weighs a lot",
    "Kiwi from the market",
    "Lemon zest everywhere",
    "Mango pulp in a jar",
    "Nectarine or peach",
    "Orange you glad",
    "Pomegranate seeds scatter",
    "Quince jelly on toast",
    "Raspberry thicket",
    "Strawberry fields",
    "Tomato is technically a fruit",
    "Ugli fruit exists",
    "Vanilla is an orchid",
    "Watermelon in summer",
];

#[derive(Parser)]
#[command(name = "generator")]
#[command(about = "Generates a synthetic numbered-line test file")]
#[command(version)]
struct Args {
    #[arg(long, default_value = "data.txt", help = "Output file")]
    output: PathBuf,

    #[arg(long, default_value_t = 1.0, help = "Target size in GB")]
    size: f64,

    #[arg(long, default_value_t = 2, help = "Producer thread count")]
    cores: usize,
}

fn fill_batch(rng: &mut impl Rng, batch: &mut Vec<u8>) {
    while batch.len() < BATCH_SIZE_BYTES {
        let number = rng.gen_range(0..(1u64 << 31));
        let phrase = PHRASES[rng.gen_range(0..PHRASES.len())];
        batch.extend_from_slice(number.to_string().as_bytes());
        batch.extend_from_slice(b". ");
        batch.extend_from_slice(phrase.as_bytes());
        batch.push(b'\n');
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.size <= 0.0 {
        bail!("target size must be positive");
    }
    let target_bytes = (args.size * BYTES_PER_GB as f64) as u64;
    let cores = args.cores.max(1);

    let (tx, rx) = sync_channel::<Vec<u8>>(cores * 2);
    let mut producers = Vec::with_capacity(cores);
    for _ in 0..cores {
        let tx = tx.clone();
        producers.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            loop {
                let mut batch = Vec::with_capacity(BATCH_SIZE_BYTES + 64);
                fill_batch(&mut rng, &mut batch);
                if tx.send(batch).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let file = File::create(&args.output)?;
    let mut writer = BufWriter::with_capacity(4 * BYTES_PER_MB, file);
    let mut written = 0u64;
    while written < target_bytes {
        let Ok(batch) = rx.recv() else { break };
        writer.write_all(&batch)?;
        written += batch.len() as u64;
    }
    drop(rx);
    writer.flush()?;

    for producer in producers {
        let _ = producer.join();
    }

    println!(
        "Generated {} at {}",
        utils::format_bytes(written),
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use linesort::Row;

    #[test]
    fn batches_contain_only_valid_rows() {
        let mut rng = rand::thread_rng();
        let mut batch = Vec::new();
        fill_batch(&mut rng, &mut batch);

        assert!(batch.len() >= BATCH_SIZE_BYTES);
        let text = String::from_utf8(batch).unwrap();
        let mut lines = 0;
        for line in text.lines() {
            let row = Row::try_parse(line.to_string()).expect("generated line must parse");
            assert!(row.number() >= 0);
            assert!(row.number() < (1 << 31));
            lines += 1;
        }
        assert!(lines > 0);
    }
}
