use std::process::ExitCode;

use chainfit_rs::app::{self, Cli};
use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match app::run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("chainfit: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
