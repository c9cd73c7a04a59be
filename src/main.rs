use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    samil_bridge::run().await
}
