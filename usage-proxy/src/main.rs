use args::Args;
use clap::Parser;
use server::ServeConfig;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args);

    let config = match args.config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration from {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };

    let serve_config = ServeConfig {
        listen_address: args.listen_address(&config),
        config,
    };

    if let Err(e) = server::serve(serve_config).await {
        log::error!("Server failed to start: {e}");
        std::process::exit(1);
    }

    Ok(())
}
