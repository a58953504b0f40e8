use std::path::PathBuf;

use axum::Router;
use clap::Parser;
use clap_handler::handler;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Serve a directory of manifests and segments over HTTP
#[derive(Parser, Clone)]
#[clap(name = "serve")]
pub struct ServeCommand {
    /// Directory to serve
    #[clap(long, default_value = ".")]
    root: PathBuf,

    #[clap(long, default_value = "0.0.0.0")]
    host: String,

    #[clap(short, long, default_value = "8080")]
    port: u16,
}

impl ServeCommand {
    fn router(&self) -> Router {
        Router::new()
            .fallback_service(ServeDir::new(&self.root).append_index_html_on_directories(false))
            .layer(TraceLayer::new_for_http())
    }
}

#[handler(ServeCommand)]
async fn handle_serve(this: ServeCommand) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((this.host.as_str(), this.port)).await?;
    tracing::info!(
        "Serving {} on http://{}",
        this.root.display(),
        listener.local_addr()?
    );

    axum::serve(listener, this.router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
