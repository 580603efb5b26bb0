#[tokio::main]
async fn main() -> anyhow::Result<()> {
    projectdesk::run_server().await
}
