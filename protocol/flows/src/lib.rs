pub mod flow_context;
pub mod v1;

pub use flow_context::FlowContext;

use async_trait::async_trait;
use norn_p2p_lib::{ProtocolError, Router};
use std::sync::Arc;

/// The protocol version this node speaks
pub const PROTOCOL_VERSION: u32 = 1;

/// The lowest peer protocol version this node accepts
pub const MINIMUM_PROTOCOL_VERSION: u32 = 1;

/// A long-running task serving one concern of a single peer. A flow suspends
/// on its route dequeues and terminates cleanly when the connection closes.
#[async_trait]
pub trait Flow: Send + 'static {
    fn name(&self) -> &'static str;

    async fn start(&mut self) -> Result<(), ProtocolError>;
}

/// Spawns the flow; its first error is handed to the context which decides on
/// banning and tears the connection down
pub(crate) fn launch_flow(ctx: Arc<FlowContext>, router: Arc<Router>, mut flow: Box<dyn Flow>) {
    tokio::spawn(async move {
        if let Err(err) = flow.start().await {
            ctx.on_flow_error(&router, &err).await;
        }
    });
}
