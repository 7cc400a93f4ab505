//! Free-port discovery and the static file server for built bundles

use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::services::ServeDir;
use tracing::info;

use crate::error::HarnessResult;

/// Ask the OS for a currently-unused TCP port.
///
/// The listener is dropped before the port is handed back, so there is a
/// small window in which another process could grab it. Callers accept
/// that race.
pub fn find_free_port() -> HarnessResult<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running static file server over one directory of built assets.
pub struct StaticServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    closed: oneshot::Receiver<()>,
}

impl StaticServer {
    /// Bind to `port` and serve `dir` for arbitrary GET paths.
    /// Resolves once the listener is accepting connections.
    pub async fn start(dir: &Path, port: u16) -> HarnessResult<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await?;
        let app = Router::new().fallback_service(ServeDir::new(dir));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (closed_tx, closed_rx) = oneshot::channel();

        info!("serving {} at http://{}", dir.display(), addr);

        tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
            // Fires whether the server was closed or fell over.
            let _ = closed_tx.send(());
        });

        Ok(Self {
            url: format!("http://127.0.0.1:{}", port),
            shutdown: Some(shutdown_tx),
            closed: closed_rx,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Settles when the serving task terminates for any reason.
    pub async fn closed(&mut self) {
        let _ = (&mut self.closed).await;
    }

    /// Release the listening socket. Safe to call once; a no-op after.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_ports_are_usable_and_distinct() {
        let port1 = find_free_port().unwrap();
        assert!(port1 > 1024);

        // Hold the first port while asking for the second, so the finder
        // cannot hand out a port something else is already bound to.
        let held = std::net::TcpListener::bind(("127.0.0.1", port1)).unwrap();

        let port2 = find_free_port().unwrap();
        assert!(port2 > 1024);
        assert_ne!(port1, port2);

        let _also_usable = std::net::TcpListener::bind(("127.0.0.1", port2)).unwrap();
        drop(held);
    }

    #[tokio::test]
    async fn serves_files_and_signals_close() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();

        let port = find_free_port().unwrap();
        let mut server = StaticServer::start(dir.path(), port).await.unwrap();

        let body = reqwest::get(format!("{}/index.html", server.url()))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "<p>hi</p>");

        server.close();
        server.closed().await;
    }
}
