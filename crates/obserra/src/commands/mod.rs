use clap::ArgMatches;
use tracing::error;

use obserra_core::events;

pub mod helpers;

mod completions;
mod logs;
mod restart;
mod service;
mod services;

pub async fn run_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    events::log_app_startup();

    match matches.subcommand() {
        Some(("services", sub_matches)) => services::handle_services_command(sub_matches).await,
        Some(("service", sub_matches)) => service::handle_service_command(sub_matches).await,
        Some(("logs", sub_matches)) => logs::handle_logs_command(sub_matches).await,
        Some(("restart", sub_matches)) => restart::handle_restart_command(sub_matches).await,
        Some(("completions", sub_matches)) => {
            completions::handle_completions_command(sub_matches)
        }
        _ => {
            error!(event = "cli.command_unknown");
            Err("Unknown command".into())
        }
    }
}
