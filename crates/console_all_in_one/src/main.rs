mod config;

use common::identity::negotiate_identity_client;
use common::telemetry::{TelemetryProviders, init_telemetry, shutdown_telemetry};
use crate::config::ConsoleSettings;
use identity_console::IdentityConsole;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let settings_path = std::env::var("CONSOLE_SETTINGS_FILE").ok();
    let settings = match ConsoleSettings::load(settings_path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&settings.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        auth_url = %settings.identity.auth_url,
        region = ?settings.identity.region_name,
        otel_enabled = settings.otel_enabled,
        "Starting identity console"
    );
    debug!(page_size = settings.page_size, policy = ?settings.policy, "Console settings");

    let result = self_check(&settings).await;
    if let Err(e) = &result {
        error!("Identity console self-check failed: {}", e);
    }

    shutdown_telemetry(telemetry_providers);
    if result.is_err() {
        std::process::exit(1);
    }
}

/// Negotiate the identity API and report how the role catalogue maps onto
/// the configured role categories
async fn self_check(settings: &ConsoleSettings) -> anyhow::Result<()> {
    let identity_config = settings.identity_client_config()?;
    let client = negotiate_identity_client(&identity_config).await?;

    let console = IdentityConsole::with_in_memory_cache(client, settings.policy.clone());
    let summary = console.role_catalogue_summary().await?;

    info!(
        generation = %console.generation(),
        matrix_roles = summary.matrix_roles,
        administrative_roles = summary.administrative_roles,
        "Role catalogue loaded"
    );
    for category in &console.policy().role_categories {
        let count = summary
            .per_category
            .get(&category.initial)
            .copied()
            .unwrap_or(0);
        info!(
            category = %category.name,
            initial = %category.initial,
            policy = ?category.policy,
            roles = count,
            "Role category"
        );
    }

    if !summary.has_admin_role {
        warn!("Role catalogue has no admin role; admin categories cannot be escalated");
    }
    if !summary.unknown_categories.is_empty() {
        warn!(
            categories = ?summary.unknown_categories,
            "Roles in categories missing from the console policy are not shown"
        );
    }

    Ok(())
}
