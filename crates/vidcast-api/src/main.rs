use vidcast_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = vidcast_api::setup::initialize_app(config.clone()).await?;

    vidcast_api::setup::server::start_server(&config, router, state.shutdown.clone()).await?;

    Ok(())
}
