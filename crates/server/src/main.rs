use anyhow::Result;
use common::config;
use common::logging::setup_logging;
use server::executor::LoopbackExecutor;
use server::net;
use server::pipeline::Pipeline;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging("info")?;

    let pipeline = Pipeline::new(config::TRANSPORT_MODE, config::DAP_QUEUE_DEPTH);

    // The executor runs on its own task; if it halts the server keeps
    // accepting but every command submission fails, so log loudly.
    let worker = pipeline.clone();
    tokio::spawn(async move {
        if let Err(e) = worker.run(LoopbackExecutor).await {
            error!("command pipeline halted: {:#}", e);
        }
    });

    net::run(config::PORT, pipeline).await
}
