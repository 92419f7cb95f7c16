#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bookreview::start_server().await
}
