//! Workspace tasks: run the backend suite and tabulate its results.
//!
//! `cargo xtask bench --features alloc-mimalloc` runs `benches/suite.rs` with
//! the extra backends compiled in; `cargo xtask report` reads criterion's
//! output and writes a table with one row per workload, one column per backend.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/// Column order for the report; unknown backends are appended by name.
const BACKENDS: &[&str] = &["global", "system", "pages", "scratch", "mimalloc", "snmalloc", "jemalloc"];

/// Every backend is compared against this one.
const BASELINE: &str = "global";

#[derive(Parser)]
#[command(name = "xtask", about = "native-containers workspace tasks")]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Run the backend suite, then write the report.
    Bench {
        /// Short warm-up and measurement, for smoke runs.
        #[arg(long)]
        quick: bool,
        /// Extra backend features, e.g. `alloc-mimalloc,alloc-jemalloc`.
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,
        /// Only run benchmarks whose id matches this criterion filter.
        filter: Option<String>,
    },
    /// Tabulate existing criterion results.
    Report {
        /// Criterion output directory.
        #[arg(long, default_value = "target/criterion")]
        criterion_dir: PathBuf,
        /// Where the markdown and JSON reports go.
        #[arg(long, default_value = "target/backend-report")]
        out: PathBuf,
    },
}

/// The parts of criterion's `benchmark.json` the report needs.
#[derive(Debug, Deserialize)]
struct BenchmarkRecord {
    group_id: String,
    function_id: Option<String>,
    value_str: Option<String>,
    throughput: Option<ThroughputRecord>,
}

/// Only `Elements` feeds the report; the byte variants keep parsing total.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
enum ThroughputRecord {
    Bytes(u64),
    BytesDecimal(u64),
    Elements(u64),
}

/// The parts of criterion's `estimates.json` the report needs.
#[derive(Debug, Deserialize)]
struct Estimates {
    mean: Estimate,
}

#[derive(Debug, Deserialize)]
struct Estimate {
    point_estimate: f64,
}

/// One workload run on one backend.
#[derive(Debug, Serialize)]
struct Measurement {
    workload: String,
    backend: String,
    mean_ns: f64,
    elements_per_sec: Option<f64>,
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Task::Bench {
            quick,
            features,
            filter,
        } => {
            run_suite(quick, &features, filter.as_deref())?;
            write_report(Path::new("target/criterion"), Path::new("target/backend-report"))
        }
        Task::Report { criterion_dir, out } => write_report(&criterion_dir, &out),
    }
}

fn run_suite(quick: bool, features: &[String], filter: Option<&str>) -> Result<()> {
    let mut cmd = Command::new(std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()));
    cmd.args(["bench", "--bench", "suite"]);
    if !features.is_empty() {
        cmd.arg("--features").arg(features.join(","));
    }
    cmd.arg("--");
    if let Some(filter) = filter {
        cmd.arg(filter);
    }
    if quick {
        cmd.args(["--warm-up-time", "0.2", "--measurement-time", "0.5", "--sample-size", "10", "--noplot"]);
    }

    println!(">>> {cmd:?}");
    let status = cmd.status().context("failed to launch cargo bench")?;
    if !status.success() {
        bail!("backend suite failed with {status}");
    }
    Ok(())
}

fn write_report(criterion_dir: &Path, out: &Path) -> Result<()> {
    if !criterion_dir.exists() {
        bail!("no criterion output at {}; run `cargo xtask bench` first", criterion_dir.display());
    }
    let mut measurements = Vec::new();
    collect(criterion_dir, &mut measurements)?;
    if measurements.is_empty() {
        bail!("no benchmark results under {}", criterion_dir.display());
    }
    measurements.sort_by(|a, b| (&a.workload, &a.backend).cmp(&(&b.workload, &b.backend)));

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let markdown = out.join("backends.md");
    fs::write(&markdown, render(&measurements)).with_context(|| format!("writing {}", markdown.display()))?;
    let json = out.join("backends.json");
    fs::write(&json, serde_json::to_string_pretty(&measurements)?)
        .with_context(|| format!("writing {}", json.display()))?;

    println!("Report written to {} and {}", markdown.display(), json.display());
    Ok(())
}

/// Walks the criterion tree for `new/benchmark.json` + `new/estimates.json`
/// pairs. Baselines other than `new` are ignored.
fn collect(dir: &Path, measurements: &mut Vec<Measurement>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if path.file_name().is_some_and(|name| name == "new") {
            if let Some(measurement) = read_measurement(&path)? {
                measurements.push(measurement);
            }
        } else if path.file_name().is_some_and(|name| name != "report") {
            collect(&path, measurements)?;
        }
    }
    Ok(())
}

fn read_measurement(dir: &Path) -> Result<Option<Measurement>> {
    let (record, estimates) = match (
        fs::read_to_string(dir.join("benchmark.json")),
        fs::read_to_string(dir.join("estimates.json")),
    ) {
        (Ok(record), Ok(estimates)) => (record, estimates),
        _ => return Ok(None),
    };
    let record: BenchmarkRecord =
        serde_json::from_str(&record).with_context(|| format!("parsing {}/benchmark.json", dir.display()))?;
    let estimates: Estimates =
        serde_json::from_str(&estimates).with_context(|| format!("parsing {}/estimates.json", dir.display()))?;

    let Some(backend) = record.function_id else {
        return Ok(None);
    };
    let workload = match record.value_str {
        Some(value) => format!("{} / {value}", record.group_id),
        None => record.group_id,
    };
    let mean_ns = estimates.mean.point_estimate;
    let elements_per_sec = match record.throughput {
        Some(ThroughputRecord::Elements(n)) if mean_ns > 0.0 => Some(n as f64 * 1e9 / mean_ns),
        _ => None,
    };
    Ok(Some(Measurement {
        workload,
        backend,
        mean_ns,
        elements_per_sec,
    }))
}

fn backend_order(measurements: &[Measurement]) -> Vec<String> {
    let mut order: Vec<String> = BACKENDS
        .iter()
        .filter(|name| measurements.iter().any(|m| m.backend == **name))
        .map(|name| (*name).to_string())
        .collect();
    for m in measurements {
        if !order.contains(&m.backend) {
            order.push(m.backend.clone());
        }
    }
    order
}

fn render(measurements: &[Measurement]) -> String {
    let backends = backend_order(measurements);
    let mut rows: BTreeMap<&str, BTreeMap<&str, &Measurement>> = BTreeMap::new();
    for m in measurements {
        rows.entry(m.workload.as_str()).or_default().insert(m.backend.as_str(), m);
    }

    let mut out = String::from("# Container workloads by allocation backend\n\n");
    out.push_str(&format!("Mean time per run; speedup relative to `{BASELINE}` in brackets.\n\n"));
    out.push_str("| Workload |");
    for backend in &backends {
        out.push_str(&format!(" {backend} |"));
    }
    out.push_str("\n|---|");
    out.push_str(&"---|".repeat(backends.len()));
    out.push('\n');

    for (workload, cells) in &rows {
        let baseline = cells.get(BASELINE).map(|m| m.mean_ns);
        out.push_str(&format!("| {workload} |"));
        for backend in &backends {
            match cells.get(backend.as_str()) {
                Some(m) => {
                    let speedup = baseline.map_or(String::new(), |base| format!(" ({:.2}x)", base / m.mean_ns));
                    out.push_str(&format!(" {}{speedup} |", format_duration(m.mean_ns)));
                }
                None => out.push_str(" - |"),
            }
        }
        out.push('\n');
    }
    out
}

fn format_duration(ns: f64) -> String {
    if ns >= 1e6 {
        format!("{:.2} ms", ns / 1e6)
    } else if ns >= 1e3 {
        format!("{:.2} µs", ns / 1e3)
    } else {
        format!("{ns:.0} ns")
    }
}
