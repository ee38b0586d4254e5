// Licensed under the Apache-2.0 license

use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

mod csr_gen;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "CSR compiler tasks", long_about = None)]
struct Xtask {
    #[command(subcommand)]
    xtask: Commands,

    /// Log every allocation and generated file
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate CSR hardware, software and documentation from a TOML description
    CsrGen {
        /// Module description
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory (default: build/<module name>)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Fail if the output directory is not up to date instead of writing it
        #[arg(long, default_value_t = false)]
        check: bool,
    },
    /// Print the resolved address map of a module description
    CsrMap {
        /// Module description
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() {
    let cli = Xtask::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("Failed to initialize logging: {e}");
    }

    let result = match &cli.xtask {
        Commands::CsrGen { input, out, check } => {
            csr_gen::generate(input, out.as_deref(), *check)
        }
        Commands::CsrMap { input } => csr_gen::print_map(input),
    };
    if let Err(e) = result {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
