//! diskprint - Incremental content fingerprints for backup disks
//!
//! Entry point for the diskprint CLI application.

use clap::Parser;
use diskprint::{
    cli::Cli,
    error::{ExitCode, StructuredError},
};
use log::LevelFilter;

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match diskprint::run_app(cli) {
        Ok(code) => {
            log::logger().flush();
            std::process::exit(code.as_i32())
        }
        Err(err) => {
            let exit_code = ExitCode::GeneralError;

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                if let Ok(json) = serde_json::to_string_pretty(&structured) {
                    eprintln!("{}", json);
                } else {
                    eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
                }
            } else if log::max_level() == LevelFilter::Off {
                // Failed before logging was set up.
                eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
            } else {
                log::error!("[{}] {:#}", exit_code.code_prefix(), err);
            }

            log::logger().flush();
            std::process::exit(exit_code.as_i32());
        }
    }
}
