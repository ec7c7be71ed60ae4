use clap::Parser;
use chitrakar::config::{build_studio, setup_logging};
use tracing::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = chitrakar::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let studio = match build_studio(&cli) {
        Ok(studio) => studio,
        Err(err) => {
            error!("Failed to set up API clients: {}", err);
            return;
        }
    };

    if let Err(err) = chitrakar::web::setup_server(&cli.listen_address, cli.port, studio).await {
        error!("Application error: {}", err);
    }
}
