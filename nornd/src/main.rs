mod api;
mod args;
mod daemon;

use args::Args;
use clap::Parser;

fn main() {
    let args = Args::parse();
    norn_core::log::init_logger(&args.loglevel);
    norn_core::panic::configure_panic();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("nornd")
        .build()
        .expect("failed building the async runtime");

    runtime.block_on(async move {
        let daemon = daemon::Daemon::start(&args).await;
        tokio::signal::ctrl_c().await.expect("failed listening for the termination signal");
        daemon.shutdown();
    });
}
