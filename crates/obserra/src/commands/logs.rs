use std::collections::HashSet;

use clap::ArgMatches;
use tracing::{error, info, warn};

use obserra_core::events;
use obserra_core::operations::{decode_log_stream, decode_logs, get_service_logs, service_log_stream};
use obserra_core::subscription::SubscriptionError;
use obserra_core::{LogEntry, SubscriptionBridge, SubscriptionEvent, WsConnector};

use super::helpers::{Context, load_context};

pub(crate) async fn handle_logs_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = matches
        .get_one::<String>("id")
        .ok_or("Service id is required")?;
    let limit = matches.get_one::<u32>("limit").copied();
    let follow = matches.get_flag("follow");
    let json_output = matches.get_flag("json");
    let context = load_context(matches)?;

    info!(
        event = "cli.logs_started",
        service_id = id,
        follow = follow,
        limit = limit
    );

    let executor = context.executor()?;
    let data = match executor
        .execute(&get_service_logs(id, limit), &context.query)
        .await
    {
        Ok(data) => data,
        Err(e) => {
            eprintln!("❌ Failed to fetch logs for '{}': {}", id, e);
            error!(event = "cli.logs_failed", service_id = id, error = %e);
            events::log_app_error(&e);
            return Err(e.into());
        }
    };

    let mut seen = HashSet::new();
    for entry in decode_logs(&data)? {
        seen.insert(entry.id.clone());
        print_entry(&entry, json_output)?;
    }

    if follow {
        follow_logs(&context, id, json_output, seen).await?;
    }

    info!(event = "cli.logs_completed", service_id = id);
    Ok(())
}

/// Stream new entries until Ctrl-C or until the server ends the stream.
async fn follow_logs(
    context: &Context,
    id: &str,
    json_output: bool,
    mut seen: HashSet<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    events::log_view_opened("logs");

    let bridge = SubscriptionBridge::new(
        WsConnector::new(context.config.endpoint.ws_url()),
        &context.config.subscription,
    );
    let mut stream = bridge.subscribe(service_log_stream(id))?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut outcome = Ok(());
    loop {
        let event = tokio::select! {
            _ = &mut shutdown => break,
            event = stream.recv() => event,
        };

        match event {
            Some(SubscriptionEvent::Next(data)) => {
                let entries = match decode_log_stream(&data) {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(event = "cli.logs_event_invalid", error = %e);
                        continue;
                    }
                };
                for entry in entries {
                    if seen.insert(entry.id.clone()) {
                        print_entry(&entry, json_output)?;
                    }
                }
            }
            Some(SubscriptionEvent::Error(e @ SubscriptionError::Operation { .. })) => {
                eprintln!("⚠️  Log stream event failed: {}", e);
                warn!(event = "cli.logs_event_failed", error = %e);
            }
            Some(SubscriptionEvent::Error(e)) => {
                eprintln!("❌ Log stream for '{}' ended: {}", id, e);
                error!(event = "cli.logs_stream_failed", service_id = id, error = %e);
                events::log_app_error(&e);
                outcome = Err(e.into());
                break;
            }
            Some(SubscriptionEvent::Completed) | None => break,
        }
    }

    drop(stream);
    bridge.close().await;
    events::log_view_closed("logs", 0, 1);
    outcome
}

fn print_entry(entry: &LogEntry, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json_output {
        println!("{}", serde_json::to_string(entry)?);
        return Ok(());
    }

    match &entry.logger {
        Some(logger) => println!(
            "{} {:<5} [{}] {}",
            entry.timestamp, entry.level, logger, entry.message
        ),
        None => println!("{} {:<5} {}", entry.timestamp, entry.level, entry.message),
    }
    if let Some(exception) = &entry.exception {
        println!("    {}", exception);
    }
    Ok(())
}
