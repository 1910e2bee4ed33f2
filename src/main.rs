//! SysBot CFW bundle builder.
//!
//! Checks upstream component releases and builds the combined SD card
//! archive when any of them changed.

use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging, `info` unless RUST_LOG says otherwise
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Run CLI and get exit code
    let exit_code = match sysbot_cfw_bundle::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
