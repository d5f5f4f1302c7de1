use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use env_logger::Env;

use mesi_cachesim::{trace, Geometry, Report, SimError, Simulator};

/// Cycle-accurate MESI snooping-bus cache simulator.
///
/// Simulates four cores with private L1 caches over per-core trace files
/// named `<prefix>_proc<i>.trace`.
#[derive(Parser, Debug)]
#[command(name = "mesi-cachesim")]
struct Args {
    /// Base name of the per-core trace files.
    #[arg(short = 't', value_name = "prefix", default_value = "sample")]
    trace_prefix: String,

    /// Number of set index bits (sets = 2^s).
    #[arg(short = 's', value_name = "int", default_value_t = 6)]
    set_bits: i64,

    /// Associativity (lines per set).
    #[arg(short = 'E', value_name = "int", default_value_t = 2)]
    assoc: i64,

    /// Number of block offset bits (block bytes = 2^b).
    #[arg(short = 'b', value_name = "int", default_value_t = 5)]
    block_bits: i64,

    /// Also write the report as CSV to this path.
    #[arg(short = 'o', value_name = "path")]
    outfile: Option<PathBuf>,
}

fn geometry(args: &Args) -> Result<Geometry, SimError> {
    if args.set_bits <= 0 || args.assoc <= 0 || args.block_bits <= 0 {
        return Err(SimError::InvalidConfig(
            "cache parameters -s, -E and -b must be positive".into(),
        ));
    }
    if args.set_bits + args.block_bits > 31 {
        return Err(SimError::InvalidConfig(format!(
            "s + b = {} leaves no tag bits in a 32-bit address",
            args.set_bits + args.block_bits
        )));
    }
    Ok(Geometry {
        set_bits: args.set_bits as u32,
        block_bits: args.block_bits as u32,
        assoc: args.assoc as usize,
    })
}

fn run(args: &Args) -> Result<(), SimError> {
    let geom = geometry(args)?;
    let traces = trace::load_traces(&args.trace_prefix)?;

    let mut sim = Simulator::new(geom, traces);
    sim.run();

    let report = Report::new(&sim, &args.trace_prefix);
    report.print()?;
    if let Some(path) = &args.outfile {
        let mut file = File::create(path)?;
        report.write_csv(&mut file)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "warn"));

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
