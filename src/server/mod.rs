pub mod api;
pub mod error;
pub mod json;

use crate::llm::chat::GenerativeModel;
use self::api::AppState;
use log::info;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct Server {
    addr: SocketAddr,
    state: AppState,
}

impl Server {
    pub fn new(addr: SocketAddr, model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            addr,
            state: AppState::new(model),
        }
    }

    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Listening on http://{}", self.addr);

        let app = api::router(self.state);
        axum::serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}
