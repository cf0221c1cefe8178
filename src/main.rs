//! Edge IP Optimizer - Main CLI Application
//!
//! Probes CDN edge address ranges for latency and loss, measures download
//! throughput of the best candidates and prints a ranked shortlist.

use clap::Parser;
use edge_ip_optimizer::{
    app::App,
    cli::Cli,
    config::{load_config, EnvManager},
    error::{AppError, ErrorReporter, Result},
    shutdown::Shutdown,
    PKG_NAME, VERSION,
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if let Err(e) = cli.validate() {
        reporter.report_error(&AppError::config(e));
        process::exit(1);
    }

    match run_application(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            reporter.report_error(&e);
            print_error_suggestions(&e);
            process::exit(e.exit_code());
        }
    }
}

/// Main application logic; returns the process exit code
async fn run_application(cli: Cli) -> Result<i32> {
    if cli.env_example {
        print!("{}", EnvManager::create_example_env_content());
        return Ok(0);
    }

    if cli.debug {
        eprintln!("{} v{}", PKG_NAME, VERSION);
        eprintln!("Debug mode enabled");
    }

    let config = load_config(cli)?;

    let shutdown = Shutdown::new();
    let listener = shutdown.listen_for_signals();

    let summary = App::new(config).with_shutdown(shutdown).run().await;
    listener.abort();
    let summary = summary?;

    if summary.interrupted {
        eprintln!(
            "Interrupted: {} partial results after probing {} addresses",
            summary.records.len(),
            summary.probed
        );
        return Ok(AppError::cancelled("interrupted").exit_code());
    }

    Ok(0)
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your YAML config file and .env file format");
            eprintln!("  - Run with --env-example to see every supported variable");
            eprintln!("  - URLs must start with http:// or https://");
        }
        AppError::InvalidRangeSyntax { .. } => {
            eprintln!();
            eprintln!("Range help:");
            eprintln!("  - One range per line in the range file, '#' starts a comment");
            eprintln!("  - Inline ranges are separated by commas");
            eprintln!("  - Examples: 104.16.0.0/13, 1.1.1.1, 2606:4700::/32");
        }
        AppError::Io(_) => {
            eprintln!();
            eprintln!("File help:");
            eprintln!("  - Check the range file path given with -f/--ip-file");
            eprintln!("  - Or pass ranges inline with --ip-text");
        }
        AppError::Network(_) | AppError::HttpRequest(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Verify firewall settings for the probe port");
            eprintln!("  - Test with a different --url");
        }
        _ => {}
    }
}
