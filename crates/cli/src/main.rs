use std::io::Write;

use clap::Parser;

use inventario_cli::{Cli, run};
use inventario_infra::{
    InMemoryInventoryStore, InventoryConfig, InventoryService, PostgresInventoryStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    inventario_observability::init();

    let cli = Cli::parse();
    let config = InventoryConfig::from_env()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresInventoryStore::connect(url, config.max_connections).await?;
            store.ensure_schema().await?;
            tracing::info!(max_connections = config.max_connections, "connected to postgres");
            let service = InventoryService::with_policy(store, config.negative_stock);
            run(&service, &config, cli.command, &mut out).await?;
        }
        None => {
            let service =
                InventoryService::with_policy(InMemoryInventoryStore::new(), config.negative_stock);
            run(&service, &config, cli.command, &mut out).await?;
        }
    }

    out.flush()?;
    Ok(())
}
