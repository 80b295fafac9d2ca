#[tokio::main]
async fn main() -> anyhow::Result<()> {
    votechain::node::run_cli().await
}
