use tablechat_core::{config, logging, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    let config = Config::from_env()?;
    logging::init(&config.log_level);
    config.log_summary();

    tablechat_server::serve(config).await
}
