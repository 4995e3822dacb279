// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Randomized smoke run.
//!
//! Constructs a few stacks, pushes random values into each, pops them all
//! back and checks the LIFO order. The pushed values can be recorded to a
//! file for replay, and every buffer allocation can be logged as JSON lines.
//!
//! ```text
//! RAMPART_PROTECTION=canary,hash RUST_LOG=rampart_stack=debug \
//!     cargo run -p rampart-smoke -- --pushes 64 --seed 7
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

use rampart::stack::{JsonLinesAllocationSink, JsonLinesSink, MAX_STACK_AMOUNT, TracingSink};
use rampart::{Elem, ErrorFlags, ProtectionConfig, StackError, StackHandle, Stacks};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "rampart-smoke")]
#[command(about = "Randomized push/pop run against protected stacks")]
struct Args {
    /// Number of stacks to construct.
    #[arg(short, long, default_value_t = 1)]
    stacks: usize,

    /// Values pushed into each stack.
    #[arg(short, long, default_value_t = 32)]
    pushes: usize,

    /// Pushed values are drawn from `0..max_value`.
    #[arg(long, default_value_t = 100)]
    max_value: Elem,

    /// Initial capacity requested for each stack.
    #[arg(long, default_value_t = 8)]
    capacity: usize,

    /// RNG seed. Random if omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Guard list overriding `RAMPART_PROTECTION` (e.g. `canary,hash`).
    #[arg(long)]
    protection: Option<String>,

    /// Write every pushed value, one per line, to this file.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Write every allocation event, one JSON object per line, to this file.
    #[arg(long)]
    memory_log: Option<PathBuf>,

    /// Also write diagnostic records as JSON lines to stderr.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, thiserror::Error)]
enum SmokeError {
    #[error(transparent)]
    Stack(#[from] StackError),

    #[error("failed to write output file: {0}")]
    Io(#[from] io::Error),

    #[error("stack {handle} popped {found}, expected {expected}")]
    OrderViolated {
        handle: StackHandle,
        expected: Elem,
        found: Elem,
    },

    #[error("at most {max} stacks can be live, {requested} requested")]
    TooManyStacks { requested: usize, max: usize },

    #[error("error register not empty: {0}")]
    Flags(ErrorFlags),
}

fn build_stacks(args: &Args) -> Result<Stacks, SmokeError> {
    let env = ProtectionConfig::from_env();
    let config = match &args.protection {
        Some(list) => ProtectionConfig::parse(list).with_fault_policy(env.fault_policy),
        None => env,
    };

    let mut builder = Stacks::builder()
        .config(config)
        .diagnostic_sink(Arc::new(TracingSink));
    if args.json {
        builder = builder.diagnostic_sink(Arc::new(JsonLinesSink::stderr()));
    }
    // Unbuffered: every line reaches the file before a fault can abort.
    if let Some(path) = &args.memory_log {
        let log = JsonLinesAllocationSink::new(File::create(path)?);
        builder = builder.allocation_sink(Arc::new(log));
    }

    Ok(builder.build())
}

fn run(args: &Args) -> Result<(), SmokeError> {
    if args.stacks > MAX_STACK_AMOUNT {
        return Err(SmokeError::TooManyStacks {
            requested: args.stacks,
            max: MAX_STACK_AMOUNT,
        });
    }

    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);
    let stacks = build_stacks(args)?;
    let mut record = args
        .record
        .as_ref()
        .map(|path| File::create(path).map(BufWriter::new))
        .transpose()?;

    info!(seed, config = ?stacks.config(), stacks = args.stacks, pushes = args.pushes, "smoke run starting");

    let handles = (0..args.stacks)
        .map(|_| stacks.construct(args.capacity))
        .collect::<Result<Vec<_>, _>>()?;

    let mut pushed: Vec<Vec<Elem>> = vec![Vec::with_capacity(args.pushes); handles.len()];

    for _ in 0..args.pushes {
        for (index, &handle) in handles.iter().enumerate() {
            let value = rng.random_range(0..args.max_value.max(1));
            if let Some(out) = record.as_mut() {
                writeln!(out, "{value}")?;
            }
            stacks.push(handle, value)?;
            pushed[index].push(value);
        }
    }

    for (index, &handle) in handles.iter().enumerate() {
        info!(
            handle = %handle,
            len = stacks.len(handle)?,
            capacity = stacks.capacity(handle)?,
            "stack filled"
        );

        while let Some(expected) = pushed[index].pop() {
            let found = stacks.pop(handle)?;
            if found != expected {
                return Err(SmokeError::OrderViolated {
                    handle,
                    expected,
                    found,
                });
            }
        }

        stacks.dump(handle)?;
        stacks.destroy(handle)?;
    }

    if let Some(mut out) = record {
        out.flush()?;
    }
    stacks.flush_sinks();

    let flags = stacks.error_flags();
    if !flags.is_empty() {
        return Err(SmokeError::Flags(flags));
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => {
            info!("smoke run executed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "smoke run failed");
            ExitCode::FAILURE
        }
    }
}
