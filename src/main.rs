#![allow(clippy::result_large_err)]

use dotenvy::dotenv;
use mess_ledger::{
    config::{
        database::{create_connection, create_tables, get_database_url},
        settings::load_default_settings,
    },
    core::{
        attendance::deactivate_expired_tokens,
        auth::ActorContext,
        clock::{Clock, SystemClock, local_date},
        meal::{is_entry_window_open, lock_meals},
        notify::{LogNotifier, Notification, Notifier},
        tenant::list_active_tenants,
    },
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    // 3. Load settings
    let settings = load_default_settings()?;
    info!("Settings loaded");

    // 4. Connect and make sure the schema exists
    let db = create_connection(&get_database_url(settings.database.url.as_deref()))
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))?;

    // 5. Maintenance sweep
    if settings.sweep.lock_meals {
        let clock = SystemClock;
        let notifier = LogNotifier;
        let system = ActorContext::system();
        for tenant in list_active_tenants(&db).await? {
            let now = clock.now();
            let today = local_date(now, tenant.utc_offset_minutes);
            if is_entry_window_open(&tenant, today, now) {
                continue;
            }
            match lock_meals(&db, &clock, &system, tenant.id, today, false).await {
                Ok(0) => {}
                Ok(count) => notifier.notify(Notification::MealsLocked {
                    tenant_id: tenant.id,
                    date: today,
                    count,
                }),
                Err(e) => error!(tenant_id = tenant.id, "Failed to lock meals: {}", e),
            }
        }
    }

    if settings.sweep.expire_tokens {
        let expired = deactivate_expired_tokens(&db, &SystemClock).await?;
        info!(expired, "Expired attendance tokens deactivated");
    }

    Ok(())
}
