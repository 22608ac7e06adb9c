use anyhow::{Context, Result};
use clap::Parser;
use tracemodel_importer::importer::{ImportOptions, import_trace};
use tracemodel_model::model::Model;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trace file to import (Chrome trace event JSON)
    trace: String,

    /// Keep original timestamps instead of shifting the world to zero
    #[arg(long)]
    no_shift: bool,

    /// Keep threads that hold no events
    #[arg(long)]
    keep_empty: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let text = std::fs::read_to_string(&args.trace)
        .with_context(|| format!("reading {}", args.trace))?;
    let options = ImportOptions {
        shift_world_to_zero: !args.no_shift,
        prune_empty_containers: !args.keep_empty,
    };
    let model = import_trace(&text, &options)
        .with_context(|| format!("importing {}", args.trace))?;
    print_summary(&model);
    Ok(())
}

fn print_summary(model: &Model) {
    let mut threads = 0;
    let mut slices = 0;
    let mut async_slices = 0;
    let mut counters = 0;
    let mut object_instances = 0;
    for process in model.processes.values() {
        threads += process.threads.len();
        counters += process.counters.len();
        object_instances += process.objects.instances.len();
        for thread in process.threads.values() {
            slices += thread.slice_group.len();
            async_slices += thread.async_slice_group.len();
        }
    }

    println!("Processes: {}", model.processes.len());
    println!("Threads: {threads}");
    println!("Slices: {slices}");
    println!("Async slices: {async_slices}");
    println!("Flow events: {}", model.flow_events.len());
    println!("Counters: {counters}");
    println!("Object instances: {object_instances}");
    println!("Samples: {}", model.samples.len());
    println!("Global memory dumps: {}", model.global_memory_dumps.len());
    println!("Stack frames: {}", model.stack_frames.len());
    println!("Categories: {}", model.categories.len());
    match (model.bounds.min(), model.bounds.max()) {
        (Some(min), Some(max)) => println!("Bounds: {min:.3}ms .. {max:.3}ms"),
        _ => println!("Bounds: empty"),
    }

    if model.import_warnings.is_empty() {
        println!("No import warnings.");
        return;
    }
    println!("Import warnings: {}", model.import_warnings.len());
    for kind in model.distinct_warning_kinds() {
        let mut messages = model.import_warnings.iter().filter(|w| w.kind == kind);
        let first = messages.next().map(|w| w.message.as_str()).unwrap_or("");
        let count = 1 + messages.count();
        println!("  {kind} ({count}): {first}");
    }
}
