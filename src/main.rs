use std::sync::Arc;
use std::time::Duration;

use feature_admin::backend::DemoBackend;
use feature_admin::config::AdminConfig;
use feature_admin::events::{AdminEvent, EventBus};
use feature_admin::filter::SearchFilter;
use feature_admin::model::{FeatureDefinition, Location};
use feature_admin::tasks::TaskManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    run().await?;
    Ok(())
}

/// Run one load against the demo farm and print what it found.
async fn run() -> feature_admin::error::Result<()> {
    let config = AdminConfig::from_env()?;

    let latency_ms: u64 = std::env::var("FEATURE_ADMIN_DEMO_LATENCY_MS")
        .unwrap_or_else(|_| "100".to_string())
        .parse()
        .unwrap_or(100);

    let filter = SearchFilter::new(
        std::env::var("FEATURE_ADMIN_FILTER").unwrap_or_default(),
        None,
    );

    let title = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Load farm".to_string());

    eprintln!("🧩 Feature Admin v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: demo farm ({} ms latency)", latency_ms);
    eprintln!(
        "   Steps: {} preparation, {} location, {} feature definition",
        config.preparation_steps_for_load,
        config.location_steps_for_load,
        config.feature_definition_steps_for_load
    );
    if !filter.query.is_empty() {
        eprintln!("   Filter: '{}'", filter.query);
    }
    eprintln!("   Ctrl+C to abort.\n");

    let bus = EventBus::new();
    let backend = Arc::new(DemoBackend::new().with_latency(Duration::from_millis(latency_ms)));
    let mut events = bus.subscribe();
    let (manager, join) = TaskManager::spawn(&config, backend, bus);

    let task_id = manager.start_load(title, None)?;

    // Result lists, as an observer keeps them.
    let mut locations: Vec<Location> = Vec::new();
    let mut definitions: Vec<FeatureDefinition> = Vec::new();

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nInterrupted.");
                break;
            }
        };

        let Some(event) = event else {
            break;
        };

        if event.task_id().is_some_and(|id| id != task_id) {
            continue;
        }

        match event {
            AdminEvent::ClearItems { task_id } => {
                locations.clear();
                definitions.clear();
                // One acknowledgment per emptied list.
                for _ in 0..config.preparation_steps_for_load {
                    manager.clear_ready(task_id)?;
                }
            }
            AdminEvent::Progress(progress) => {
                eprintln!(
                    "  {:>5.1}%  {} ({})",
                    progress.percent_completed * 100.0,
                    progress.title,
                    progress.state
                );
                if progress.end.is_some() {
                    break;
                }
            }
            AdminEvent::Log(log) => eprintln!("  [{}] {}", log.level, log.message),
            AdminEvent::LocationsUpdated(update) => locations.extend(update.items),
            AdminEvent::FeatureDefinitionsUpdated(update) => {
                for definition in update.items {
                    match definitions.iter_mut().find(|d| d.id == definition.id) {
                        Some(existing) => *existing = definition,
                        None => definitions.push(definition),
                    }
                }
            }
            AdminEvent::NewTask { .. } | AdminEvent::TaskRemoved { .. } => {}
        }
    }

    println!("\nLocations:");
    for location in filter.apply(&locations) {
        println!(
            "  {:<16} {:<20} {} feature(s)",
            location.scope.to_string(),
            location.display_name,
            location.activated_features.len()
        );
    }

    println!("\nFeature definitions:");
    for definition in filter.apply(&definitions) {
        println!(
            "  {:<16} {:<28} active at {} location(s)",
            definition.scope.to_string(),
            definition.display_name,
            definition.activated_features.len()
        );
    }

    manager.shutdown()?;
    if let Err(e) = join.await {
        tracing::error!(error = %e, "Task manager exited abnormally");
    }

    Ok(())
}
