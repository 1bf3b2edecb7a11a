use clap::ArgMatches;
use serde::Serialize;
use tracing::{error, info};

use obserra_core::events;
use obserra_core::normalize::insights::{HealthInsight, MetricsInsight};
use obserra_core::normalize::parse_bytes;
use obserra_core::operations::{decode_service, get_service};
use obserra_core::{ServiceDetail, normalize_service};

use super::helpers::load_context;
use crate::table::{format_bytes, format_uptime};

/// `--json` output: the legacy flat shape plus the raw health and metrics.
#[derive(Serialize)]
struct ServiceView<'a> {
    #[serde(flatten)]
    detail: &'a ServiceDetail,
    health: Option<&'a HealthInsight>,
    insights: Option<&'a MetricsInsight>,
}

pub(crate) async fn handle_service_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = matches
        .get_one::<String>("id")
        .ok_or("Service id is required")?;
    let json_output = matches.get_flag("json");
    let context = load_context(matches)?;

    info!(event = "cli.service_started", service_id = id);

    let executor = context.executor()?;
    let data = match executor.execute(&get_service(id), &context.query).await {
        Ok(data) => data,
        Err(e) => {
            eprintln!("❌ Failed to fetch service '{}': {}", id, e);
            error!(event = "cli.service_failed", service_id = id, error = %e);
            events::log_app_error(&e);
            return Err(e.into());
        }
    };

    let service = match decode_service(&data)? {
        Some(service) => service,
        None => {
            eprintln!("❌ Service '{}' not found", id);
            error!(event = "cli.service_not_found", service_id = id);
            return Err(format!("Service '{}' not found", id).into());
        }
    };

    let detail = normalize_service(&service);
    let insights = service.insights.as_ref();
    let health = insights.and_then(|i| i.health.as_ref());
    let metrics = insights.and_then(|i| i.metrics.as_ref());

    if json_output {
        let view = ServiceView {
            detail: &detail,
            health,
            insights: metrics,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_detail(&detail, health, metrics);
    }

    info!(event = "cli.service_completed", service_id = id);
    Ok(())
}

fn print_detail(
    detail: &ServiceDetail,
    health: Option<&HealthInsight>,
    metrics: Option<&MetricsInsight>,
) {
    let memory = &detail.metrics.memory;
    println!("Service:   {} ({})", detail.name, detail.id);
    println!("App:       {}", detail.app);
    println!("Version:   {}", detail.version.as_deref().unwrap_or("-"));
    println!("Namespace: {}", detail.namespace.as_deref().unwrap_or("-"));
    println!("Status:    {}", detail.status);
    println!("Updated:   {}", detail.updated);
    println!();
    println!(
        "Memory:    {} / {} ({:.1}%)",
        format_bytes(memory.used),
        format_bytes(memory.max),
        memory.usage_percentage
    );
    if let Some(max_heap) = metrics
        .and_then(|m| m.memory.as_ref())
        .and_then(|m| m.max_heap.as_deref())
    {
        println!("Heap max:  {}", format_bytes(parse_bytes(max_heap)));
    }
    println!("CPU:       {:.1}%", detail.metrics.cpu.used);
    println!(
        "Uptime:    {}{}",
        format_uptime(detail.metrics.uptime.seconds),
        detail
            .metrics
            .uptime
            .start_time
            .as_deref()
            .map(|t| format!(" (since {})", t))
            .unwrap_or_default()
    );

    if let Some(threads) = metrics.and_then(|m| m.threads.as_ref()) {
        println!(
            "Threads:   {} live, {} daemon, {} peak",
            threads.live_threads.unwrap_or(0),
            threads.daemon_threads.unwrap_or(0),
            threads.peak_threads.unwrap_or(0)
        );
    }
    if let Some(pool) = metrics.and_then(|m| m.thread_pool.as_ref()) {
        println!(
            "Pool:      {} active of {}, {} queued",
            pool.active_threads.as_deref().unwrap_or("-"),
            pool.pool_size.as_deref().unwrap_or("-"),
            pool.queued_tasks.as_deref().unwrap_or("-")
        );
    }
    if let Some(disk) = metrics.and_then(|m| m.disk.as_ref()) {
        println!(
            "Disk:      {} free of {}",
            disk.free.as_deref().unwrap_or("-"),
            disk.total.as_deref().unwrap_or("-")
        );
    }

    if let Some(health) = health {
        println!();
        println!("Health:    {}", health.status.as_deref().unwrap_or("UNKNOWN"));
        for entry in &health.components {
            println!("  {:<20} {}", entry.name, entry.component.status);
        }
    }
}
