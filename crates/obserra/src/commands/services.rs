use std::sync::Arc;
use std::time::Duration;

use clap::ArgMatches;
use serde_json::Value;
use tracing::{error, info, warn};

use obserra_core::events;
use obserra_core::operations::{decode_services, get_services};
use obserra_core::{
    RefreshCoordinator, RefreshState, ServiceDetail, SessionSnapshot, normalize_service,
};

use super::helpers::{Context, load_context};
use crate::table::ServiceTable;

pub(crate) async fn handle_services_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = matches.get_flag("json");
    let watch = matches.get_flag("watch");
    let context = load_context(matches)?;

    info!(
        event = "cli.services_started",
        json_output = json_output,
        watch = watch
    );

    if watch {
        let interval = matches
            .get_one::<u64>("interval-ms")
            .map(|ms| Duration::from_millis(*ms));
        return watch_services(&context, interval).await;
    }

    let executor = context.executor()?;
    let data = match executor.execute(&get_services(), &context.query).await {
        Ok(data) => data,
        Err(e) => {
            eprintln!("❌ Failed to fetch services: {}", e);
            error!(event = "cli.services_failed", error = %e);
            events::log_app_error(&e);
            return Err(e.into());
        }
    };

    let services = to_details(&data)?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&services)?);
    } else if services.is_empty() {
        println!("No services registered.");
    } else {
        ServiceTable::new(&services).print_table(&services);
    }

    info!(event = "cli.services_completed", count = services.len());
    Ok(())
}

fn to_details(data: &Value) -> Result<Vec<ServiceDetail>, Box<dyn std::error::Error>> {
    let services = match decode_services(data) {
        Ok(services) => services,
        Err(e) => {
            eprintln!("❌ Unexpected services response: {}", e);
            events::log_app_error(&e);
            return Err(e.into());
        }
    };
    Ok(services.iter().map(normalize_service).collect())
}

/// Keep the service list on screen until Ctrl-C.
async fn watch_services(
    context: &Context,
    interval: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    events::log_view_opened("services");

    let executor = Arc::new(context.executor()?);
    let mut coordinator =
        RefreshCoordinator::new(executor, context.query.clone(), &context.config.refresh)
            .with_auto_refresh(true);
    if let Some(interval) = interval {
        coordinator = coordinator.with_interval(interval);
    }
    let mut handle = coordinator.session(get_services());
    let interval_secs = interval
        .unwrap_or_else(|| context.config.refresh.interval())
        .as_secs_f64();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut rendered: Option<(u64, RefreshState)> = None;
    loop {
        let snapshot = handle.snapshot();
        let marker = (snapshot.fetch_count, snapshot.state);
        if snapshot.state != RefreshState::Fetching && rendered != Some(marker) {
            render(&snapshot, interval_secs);
            rendered = Some(marker);
        }

        tokio::select! {
            _ = &mut shutdown => break,
            alive = handle.changed() => {
                if !alive {
                    break;
                }
            }
        }
    }

    let sessions = coordinator.len();
    drop(coordinator);
    events::log_view_closed("services", sessions, 0);
    Ok(())
}

fn render(snapshot: &SessionSnapshot, interval_secs: f64) {
    if let (RefreshState::Failed, Some(e)) = (snapshot.state, &snapshot.last_error) {
        eprintln!("⚠️  Refresh failed: {}", e);
        warn!(event = "cli.services_refresh_failed", error = %e);
        if snapshot.result.is_some() {
            eprintln!("   Showing the last successful result.");
        }
        return;
    }

    let Some(result) = &snapshot.result else {
        return;
    };
    let services = match to_details(result) {
        Ok(services) => services,
        Err(_) => return,
    };

    let when = snapshot
        .refreshed_at
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_default();
    println!(
        "\nServices at {} ({} total, refreshing every {}s, Ctrl-C to stop)",
        when,
        services.len(),
        interval_secs
    );
    if services.is_empty() {
        println!("No services registered.");
    } else {
        ServiceTable::new(&services).print_table(&services);
    }
}
