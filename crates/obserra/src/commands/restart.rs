use clap::ArgMatches;
use tracing::{error, info};

use obserra_core::events;
use obserra_core::operations::RestClient;

use super::helpers::load_context;

pub(crate) async fn handle_restart_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = matches
        .get_one::<String>("id")
        .ok_or("Service id is required")?;
    let context = load_context(matches)?;

    info!(event = "cli.restart_started", service_id = id);

    let client = RestClient::new(context.config.endpoint.url())?;
    match client.restart_service(id).await {
        Ok(reply) => {
            println!("✅ Restart requested for '{}'", id);
            if let Some(message) = reply.get("message").and_then(|m| m.as_str()) {
                println!("   {}", message);
            }
            info!(event = "cli.restart_completed", service_id = id);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Failed to restart '{}': {}", id, e);
            error!(event = "cli.restart_failed", service_id = id, error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}
