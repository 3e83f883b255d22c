use podq_core::logging;

mod cli;

fn main() {
    // Log to the state file when possible; otherwise keep going on stderr.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = cli::run_from_args() {
        eprintln!("podq error: {:#}", err);
        std::process::exit(1);
    }
}
