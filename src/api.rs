//! HTTP and WebSocket surface
//!
//! `/ws` carries the chat, `/gateway/*` proxies the upstream APIs for the
//! client, and `/api/chats/:chat_id/messages` exposes stored transcripts.

mod gateway;
mod handlers;
mod types;
mod ws;

pub use gateway::Gateway;
pub use handlers::create_router;

use crate::runtime::ProductionRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ProductionRuntime>,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(runtime: ProductionRuntime, gateway: Gateway) -> Self {
        Self {
            runtime: Arc::new(runtime),
            gateway: Arc::new(gateway),
        }
    }
}
