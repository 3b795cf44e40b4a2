use clap::Parser;
use log::LevelFilter;
use zynqimage::cli::{Args, run_cli};

fn main() {
    let args = Args::parse();

    let level = if args.quiet {
        LevelFilter::Error
    } else if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run_cli(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
