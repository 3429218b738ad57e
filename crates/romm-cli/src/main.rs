mod cli;
mod logging;

use crate::cli::CliCommand;

fn main() {
    logging::init_logging();

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("romm-switch-client error: {err:#}");
        std::process::exit(1);
    }
}
