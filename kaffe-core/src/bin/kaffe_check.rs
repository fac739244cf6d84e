//! Kaffe trace checker - run check-stage queries against a saved trace
//!
//! Usage:
//!     kaffe-check kinds run.jsonl
//!     kaffe-check project run.jsonl --kind "tx.*" --key tx --key status
//!     kaffe-check pairs run.jsonl --cause req.sent --effect req.done --key request_id --strict
//!
//! Exits with status 1 when the trace cannot be loaded or an assertion fails.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kaffe_core::{
    pair_max_depth, read_jsonl_file, Guard, PairMatch, PairQuery, Pattern, Role, Trace, TraceError,
};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kaffe-check")]
#[command(about = "Check a recorded trace against ordering and causality assertions")]
#[command(version)]
struct Args {
    /// Output as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List event kinds with their counts, in order of first appearance
    Kinds {
        /// Trace file (JSON Lines)
        trace: PathBuf,
    },

    /// Print attribute tuples, skipping events that lack any key
    Project {
        trace: PathBuf,

        /// Only consider events whose kind matches this glob
        #[arg(long)]
        kind: Option<String>,

        /// Attribute key or JSON pointer (repeatable)
        #[arg(long = "key", required = true)]
        keys: Vec<String>,
    },

    /// Pair causes with effects and check causality
    Pairs {
        trace: PathBuf,

        /// Kind glob of cause events
        #[arg(long)]
        cause: String,

        /// Kind glob of effect events
        #[arg(long)]
        effect: String,

        /// Attribute that must be equal on cause and effect
        #[arg(long)]
        key: Option<String>,

        /// Also fail on causes that never got an effect
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kaffe_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&e.to_error_response())
                    .unwrap_or_else(|_| e.to_string())
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), TraceError> {
    match &args.command {
        Command::Kinds { trace } => {
            let trace = load(trace)?;
            let counts = kind_counts(&trace);

            if args.json {
                println!("{}", serde_json::to_string_pretty(&kinds_json(&counts))?);
            } else {
                for (kind, count) in counts {
                    println!("{:>8}  {}", count, kind);
                }
            }
        }

        Command::Project { trace, kind, keys } => {
            let trace = load(trace)?;
            let pattern = match kind {
                Some(glob) => Pattern::kind_glob(glob)?,
                None => Pattern::any(),
            };
            let selected: Trace = trace
                .into_iter()
                .filter(|e| pattern.bind_event(e).is_some())
                .collect();
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();

            for tuple in selected.project(&keys) {
                if args.json {
                    println!("{}", Value::Array(tuple));
                } else {
                    let cells: Vec<String> = tuple.iter().map(Value::to_string).collect();
                    println!("{}", cells.join("\t"));
                }
            }
        }

        Command::Pairs {
            trace,
            cause,
            effect,
            key,
            strict,
        } => {
            let trace = load(trace)?;
            let mut cause_pattern = Pattern::kind_glob(cause)?;
            let mut effect_pattern = Pattern::kind_glob(effect)?;
            let mut guard = None;
            if let Some(key) = key {
                cause_pattern = cause_pattern.bind("cause", key.as_str());
                effect_pattern = effect_pattern.bind("effect", key.as_str());
                guard = Some(Guard::equal("cause", "effect"));
            }

            let mut query = PairQuery::new(cause_pattern, effect_pattern);
            if let Some(guard) = guard {
                query = query.with_guard(guard)?;
            }

            let matches = query.find_pairs(&trace);
            report_pairs(&matches, args.json)?;
            query.assert_pairs(*strict, &trace)?;
        }
    }
    Ok(())
}

/// Event count per kind, in order of first appearance
fn kind_counts(trace: &Trace) -> Vec<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = trace.kinds().into_iter().map(|k| (k, 0)).collect();
    for event in trace {
        if let Some(entry) = counts.iter_mut().find(|(k, _)| *k == event.kind) {
            entry.1 += 1;
        }
    }
    counts
}

/// `[{"kind": .., "count": ..}, ..]`, keeping the order of `counts`
fn kinds_json(counts: &[(&str, usize)]) -> Value {
    counts
        .iter()
        .map(|(kind, count)| json!({ "kind": kind, "count": count }))
        .collect()
}

fn load(path: &PathBuf) -> Result<Trace, TraceError> {
    let trace = read_jsonl_file(path)?;
    tracing::debug!(path = %path.display(), events = trace.len(), "trace loaded");
    Ok(trace)
}

fn report_pairs(matches: &[PairMatch], as_json: bool) -> Result<(), TraceError> {
    let paired = matches.iter().filter(|m| m.is_pair()).count();
    let lone_causes = matches.iter().filter(|m| m.unmatched(Role::Cause).is_some()).count();
    let lone_effects = matches.iter().filter(|m| m.unmatched(Role::Effect).is_some()).count();
    let depth = pair_max_depth(matches);

    if as_json {
        let summary = json!({
            "pairs": paired,
            "unmatched_causes": lone_causes,
            "unmatched_effects": lone_effects,
            "max_depth": depth,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Pairs:             {}", paired);
        println!("Unmatched causes:  {}", lone_causes);
        println!("Unmatched effects: {}", lone_effects);
        println!("Max open pairs:    {}", depth);
    }
    Ok(())
}
