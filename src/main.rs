//! Network Speed Bot - command-line entry point
//!
//! Measures throughput with the installed speed-test tools, appends the
//! results to the measurement log and, when due, posts a chart with the
//! median speeds.

use clap::Parser;
use netspeed_bot::{app::App, cli::Cli, error::AppError};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let use_color = cli.use_colors();

    if let Err(e) = App::new(cli).run().await {
        eprintln!("{}", e.format_for_console(use_color));
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Print hints for errors an operator can fix
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - The config file is JSON with \"api_key\" and \"api_secret\"");
            eprintln!("  - Use --config, NETSPEED_CONFIG or NETSPEED_HOME to point at it");
            eprintln!("  - Use --dry_run to render the chart without credentials");
        }
        AppError::AuthorizationPending(_) => {
            eprintln!();
            eprintln!("Authorization saved. Run the bot again to start posting.");
        }
        AppError::Auth(_) => {
            eprintln!();
            eprintln!("Authentication help:");
            eprintln!("  - Check the consumer key and secret");
            eprintln!("  - Remove \"request_token\" and \"access_token\" to authorize again");
        }
        _ => {}
    }
}
