use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    facets_cli::main_entry().await
}
