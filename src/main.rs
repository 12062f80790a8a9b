use rask_mongo_writer::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
