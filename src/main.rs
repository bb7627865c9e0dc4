use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    actharvest_cli::cli::app::run().await
}
