/// RAGent - chat assistant backend
///
/// Keeps the signed-in user's profile in step with the identity provider,
/// forwards chat queries to the answering webhook and records the exchanges.
use ragent::{config::AppConfig, context::AppContext, error::AppResult, jobs, server};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    let config = AppConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(config.logging.env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ____  ___   ______                 __
   / __ \/   | / ____/__  ____  ____  / /_
  / /_/ / /| |/ / __/ _ \/ __ \/ __ \/ __/
 / _, _/ ___ / /_/ /  __/ / / / / / / /_
/_/ |_/_/  |_\____/\___/_/ /_/_/ /_/\__/

        Chat assistant backend v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
