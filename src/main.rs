use folio::config::{self, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    config::init_tracing();

    let settings = Settings::from_env()?;
    folio::server::serve(&settings).await
}
