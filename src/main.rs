use clap::Parser;
use env_logger::Env;

use resonator_anneal::{read_sweep_config, run_sweep, SweepError};

#[derive(Parser, Debug)]
#[command(version, about = "Electron configurations above a resonator trap for a bias voltage sweep", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    /// Override the output directory of the configuration
    #[arg(short, long)]
    output: Option<String>,

    /// Skip assembling the snapshot frames into a movie
    #[arg(long)]
    no_movie: bool,

    /// Continue an interrupted sweep in the output directory
    #[arg(long)]
    resume: bool,
}

fn run(args: &Args) -> Result<(), SweepError> {
    let mut config = read_sweep_config(&args.config)?;
    if let Some(output) = &args.output {
        config.output.directory = output.into();
    }
    if args.no_movie {
        config.output.movie = false;
    }
    if args.resume {
        config.output.resume = true;
    }

    let summary = run_sweep(&config)?;
    log::info!(
        "sweep finished: {} of {} steps stored in {}",
        summary.metadata.completed_steps,
        summary.metadata.voltages.len(),
        summary.output_dir.display()
    );
    if !summary.non_converged.is_empty() {
        log::warn!("steps without convergence: {:?}", summary.non_converged);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
