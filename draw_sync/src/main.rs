#[tokio::main]
async fn main() -> std::io::Result<()> {
    draw_sync::run_with_config().await
}
