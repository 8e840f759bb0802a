use anyhow::Result;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("memberly exited with error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    memberly::run().await
}
