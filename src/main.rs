use anyhow::Result;
use crosstalk::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
