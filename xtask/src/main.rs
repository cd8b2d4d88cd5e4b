use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use perf_test_core::naming::fixture_file_name;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const DIST_DIR: &str = "dist";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the Lambda runtime benchmark workspace",
    long_about = "A unified CLI for generating fixtures, running the benchmark task,\n\
                  packaging Lambda artifacts, benchmarks, and CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a vehicle dataset fixture from the reference lists
    GenerateFixtures {
        #[arg(long, default_value_t = 10_000)]
        count: usize,
        #[arg(long, default_value = "fixtures")]
        output_dir: String,
        /// Seed for a reproducible dataset
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run the benchmark task once against a local fixture
    RunTask {
        #[arg(long, default_value = "fixtures")]
        data_dir: String,
        #[arg(long, default_value = "test_data_10000.json")]
        data_file: String,
    },
    /// Run the full 10 x 10 x 10 fan-out with in-process leaves
    RunTopology {
        #[arg(long, default_value = "fixtures")]
        data_dir: String,
        #[arg(long, default_value = "test_data_10000.json")]
        data_file: String,
    },
    /// Zip a fixture into a Lambda layer archive (dist/test_data.zip)
    PackageLayer {
        /// Record count of the fixture to package
        #[arg(long, default_value_t = 100_000)]
        count: usize,
        #[arg(long, default_value = "fixtures")]
        fixtures_dir: String,
    },
    /// Run Criterion benchmarks
    Bench,
    /// Compare benchmarks: stash changes, create baseline, restore, compare
    BenchCompare,
    /// Run CI checks (fmt, clippy, tests, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build the benchmark task binary and package it as a Lambda zip
    ServerlessPackage {
        /// Compilation target triple for Lambda binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Run benchmarks
    Bench,
    /// Run check + bench
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn git(args: &[&str]) -> ExitStatus {
    eprintln!("+ git {}", args.join(" "));
    Command::new("git")
        .args(args)
        .status()
        .expect("failed to execute git")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_git(args: &[&str]) {
    let status = git(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_perf_cli(args: &[&str]) {
    let mut cargo_args = vec![
        "run",
        "-p",
        "perf_test_lambda",
        "--bin",
        "perf_cli",
        "--release",
        "--",
    ];
    cargo_args.extend_from_slice(args);
    run_cargo(&cargo_args);
}

fn package_serverless_lambda(target: &str, profile: BuildProfile) {
    ensure_rust_target_installed(target);
    ensure_c_linker_available(target);

    step("Build benchmark task binary");

    let mut cargo_args = vec![
        "build",
        "-p",
        "perf_test_lambda",
        "--target",
        target,
        "--bin",
        "benchmark_task",
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package lambda zip artifact");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir).expect("failed to create dist directory");

    let zip_path = dist_dir.join("benchmark_task.zip");
    write_single_entry_zip(
        &target_dir.join(binary_name("benchmark_task", target)),
        &zip_path,
        "bootstrap",
        0o755,
    );

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

/// Layers unpack under `/opt`, so the fixture sits at the archive root.
fn package_layer(count: usize, fixtures_dir: &str) {
    step("Package fixture layer");
    let file_name = fixture_file_name(count);
    let fixture = Path::new(fixtures_dir).join(&file_name);
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir).expect("failed to create dist directory");

    let zip_path = dist_dir.join("test_data.zip");
    write_single_entry_zip(&fixture, &zip_path, &file_name, 0o644);

    eprintln!("\nPackaged layer:\n- {}", zip_path.display());
}

fn ensure_rust_target_installed(target: &str) {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output();

    let output = match output {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- serverless-package`"
        );
    }
}

fn ensure_c_linker_available(target: &str) {
    if !cfg!(windows) || !target.ends_with("unknown-linux-gnu") {
        return;
    }

    let env_override_keys = [
        format!("CC_{}", target.replace('-', "_")),
        format!("CC_{target}"),
        "TARGET_CC".to_string(),
        "CC".to_string(),
    ];

    for key in env_override_keys {
        if let Ok(value) = std::env::var(&key) {
            let candidate = value.trim();
            if !candidate.is_empty() && tool_works(candidate) {
                return;
            }
        }
    }

    let canonical = "x86_64-linux-gnu-gcc";
    if tool_works(canonical) {
        return;
    }

    panic!(
        "missing C cross-linker for target `{target}`. install `{canonical}` (or set CC_x86_64_unknown_linux_gnu) before running `cargo run -p xtask -- serverless-package`.\n\
         Tip: the AWS SDK's TLS stack builds C sources and needs a Linux C toolchain when cross-compiling from Windows."
    );
}

fn tool_works(program: &str) -> bool {
    let mut parts = program.split_whitespace();
    let Some(bin) = parts.next() else {
        return false;
    };
    let args: Vec<&str> = parts.collect();

    Command::new(bin)
        .args(&args)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

fn write_single_entry_zip(source: &Path, zip_path: &Path, entry_name: &str, mode: u32) {
    if !source.exists() {
        panic!("expected artifact at '{}'", source.display());
    }

    let contents = fs::read(source).expect("failed to read artifact");
    let file = fs::File::create(zip_path).expect("failed to create zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(mode);
    zip.start_file(entry_name, options)
        .expect("failed to start zip entry");
    zip.write_all(&contents).expect("failed to write zip entry");
    zip.finish().expect("failed to finish zip");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test perf_test_core");
    run_cargo(&["test", "-p", "perf_test_core"]);

    step("Test perf_test_lambda");
    run_cargo(&["test", "-p", "perf_test_lambda"]);
}

fn ci_bench() {
    step("Run benchmarks");
    run_cargo(&["bench", "--package", "perf_test_core", "--bench", "pipeline"]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateFixtures {
            count,
            output_dir,
            seed,
        } => {
            let count = count.to_string();
            let seed = seed.map(|value| value.to_string());
            let mut args: Vec<&str> = vec![
                "generate-fixtures",
                "--count",
                &count,
                "--output-dir",
                &output_dir,
            ];
            if let Some(seed) = &seed {
                args.extend_from_slice(&["--seed", seed.as_str()]);
            }
            run_perf_cli(&args);
        }
        Commands::RunTask {
            data_dir,
            data_file,
        } => {
            run_perf_cli(&[
                "run-task",
                "--data-dir",
                &data_dir,
                "--data-file",
                &data_file,
            ]);
        }
        Commands::RunTopology {
            data_dir,
            data_file,
        } => {
            run_perf_cli(&[
                "run-topology",
                "--local",
                "--data-dir",
                &data_dir,
                "--data-file",
                &data_file,
            ]);
        }
        Commands::PackageLayer {
            count,
            fixtures_dir,
        } => {
            package_layer(count, &fixtures_dir);
        }
        Commands::Bench => {
            run_cargo(&["bench", "--package", "perf_test_core", "--bench", "pipeline"]);
        }
        Commands::BenchCompare => {
            let baseline_dir = Path::new("target/criterion");
            if baseline_dir.exists() {
                step("Removing existing benchmark data");
                fs::remove_dir_all(baseline_dir).expect("failed to remove target/criterion");
            }

            step("Stashing current changes");
            run_git(&[
                "stash",
                "push",
                "-m",
                "Temporary stash for benchmark comparison",
            ]);

            step("Running benchmark to create baseline");
            run_cargo(&[
                "bench",
                "--package",
                "perf_test_core",
                "--bench",
                "pipeline",
                "--",
                "--save-baseline",
                "main",
            ]);

            step("Reapplying changes");
            run_git(&["stash", "pop"]);

            step("Running benchmark comparing against baseline");
            run_cargo(&[
                "bench",
                "--package",
                "perf_test_core",
                "--bench",
                "pipeline",
                "--",
                "--baseline",
                "main",
            ]);

            eprintln!("\nDone! Check the output above to see performance comparison.");
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::ServerlessPackage { target, profile } => {
            package_serverless_lambda(&target, profile);
        }
    }
}
