use anyhow::Context;
use clap::{Parser, Subcommand};
use satbench_types::{BenchReport, Category, ConfigFile, Manifest};
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Repo automation for satbench")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the report, manifest and config JSON Schemas.
    Schema {
        /// Output directory
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,

        /// Fail if the files on disk differ from the types instead of writing.
        #[arg(long)]
        check: bool,
    },

    /// Write a tiny labelled corpus for smoke-testing a solver with `satbench run`.
    SampleCorpus {
        #[arg(long, default_value = "sample-benchmarks")]
        out_dir: PathBuf,

        /// Cases per category
        #[arg(long, default_value_t = 3)]
        cases: u32,
    },

    /// fmt, clippy and tests, then regenerate the schemas.
    Ci,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Schema { out_dir, check } if check => check_schemas(&out_dir),
        Command::Schema { out_dir, .. } => write_schemas(&out_dir),
        Command::SampleCorpus { out_dir, cases } => {
            let written = write_sample_corpus(&out_dir, cases)?;
            eprintln!("wrote {written} case(s) under {}", out_dir.display());
            Ok(())
        }
        Command::Ci => cmd_ci(),
    }
}

fn cmd_ci() -> anyhow::Result<()> {
    cargo(&["fmt", "--all", "--", "--check"])?;
    cargo(&["clippy", "--all-targets", "--all-features", "--", "-D", "warnings"])?;
    cargo(&["test", "--workspace"])?;
    write_schemas(Path::new("schemas"))
}

fn cargo(args: &[&str]) -> anyhow::Result<()> {
    let status = std::process::Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("running cargo {}", args.join(" ")))?;
    if !status.success() {
        anyhow::bail!("cargo {} failed: {status}", args[0]);
    }
    Ok(())
}

/// File name and pretty JSON for every published schema.
fn schemas() -> anyhow::Result<Vec<(&'static str, String)>> {
    Ok(vec![
        (
            "satbench.report.v1.schema.json",
            render(&schema_for!(BenchReport))?,
        ),
        (
            "satbench.manifest.v1.schema.json",
            render(&schema_for!(Manifest))?,
        ),
        (
            "satbench.config.v1.schema.json",
            render(&schema_for!(ConfigFile))?,
        ),
    ])
}

fn render<T: serde::Serialize>(schema: &T) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(schema)?;
    json.push('\n');
    Ok(json)
}

fn write_schemas(out_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create dir {}", out_dir.display()))?;
    for (name, json) in schemas()? {
        let path = out_dir.join(name);
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

fn check_schemas(out_dir: &Path) -> anyhow::Result<()> {
    let mut stale = Vec::new();
    for (name, json) in schemas()? {
        let path = out_dir.join(name);
        if fs::read_to_string(&path).ok().as_deref() != Some(json.as_str()) {
            stale.push(path.display().to_string());
        }
    }
    if !stale.is_empty() {
        anyhow::bail!(
            "schemas out of date (run `cargo run -p xtask -- schema`): {}",
            stale.join(", ")
        );
    }
    Ok(())
}

const SAT_CASE: &str = "c satisfiable: x1=1 x2=1 x3=1\np cnf 3 2\n1 -2 0\n2 3 0\n";
const UNSAT_CASE: &str = "c unsatisfiable: x1 and not x1\np cnf 1 2\n1 0\n-1 0\n";

/// Lay out `<out>/2_clauses/<category>/case-NN.cnf` for both categories.
///
/// Refuses to write into a directory that already has files in it.
fn write_sample_corpus(out_dir: &Path, cases: u32) -> anyhow::Result<u32> {
    let occupied = fs::read_dir(out_dir)
        .map(|mut it| it.next().is_some())
        .unwrap_or(false);
    if occupied {
        anyhow::bail!("{} is not empty", out_dir.display());
    }

    let mut written = 0;
    for (category, body) in [
        (Category::Satisfiable, SAT_CASE),
        (Category::Unsatisfiable, UNSAT_CASE),
    ] {
        let dir = out_dir.join("2_clauses").join(category.as_str());
        fs::create_dir_all(&dir).with_context(|| format!("create dir {}", dir.display()))?;
        for i in 1..=cases {
            let path = dir.join(format!("case-{i:02}.cnf"));
            fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
            written += 1;
        }
    }
    Ok(written)
}
