pub mod cli;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;

use cli::Args;
use llm::chat::new_client;
use llm::LlmConfig;
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Model: {}", args.model);
    info!("Gemini Base URL: {}", args.base_url);
    info!("Listen Address: {}", args.listen_addr());
    info!("-------------------------");

    let config = LlmConfig {
        api_key: Some(args.api_key.clone()),
        model: Some(args.model.clone()),
        base_url: Some(args.base_url.clone()),
    };
    let model = new_client(&config)?;
    info!("Chat client configured: Model={}", model.model_name());

    let server = Server::new(args.listen_addr(), model);
    server.run().await?;

    Ok(())
}
