use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    homecare::start_server().await
}
