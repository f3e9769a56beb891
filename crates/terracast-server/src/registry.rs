//! Best-effort server listing endpoint.
//!
//! A background thread serves the current [`ServerListing`] as JSON over
//! HTTP for registry crawlers and LAN browsers. The tick loop publishes a
//! fresh listing into a mutex-guarded slot without blocking; the thread
//! never touches gameplay state directly.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

/// Errors raised while running the listing endpoint.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The HTTP listener failed to bind.
    #[error("failed to bind listing endpoint on port {port}: {error}")]
    BindError {
        /// Requested port.
        port: u16,
        /// Underlying error text.
        error: String,
    },
}

/// Publicly visible server facts, served as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ServerListing {
    /// Server display name.
    pub name: String,
    /// Connected player count.
    pub players: u32,
    /// Configured player capacity.
    pub max_players: u32,
    /// Simulation tick rate in Hz.
    pub tick_rate: u32,
}

struct Shared {
    listing: Mutex<ServerListing>,
    shutdown: Mutex<bool>,
}

/// HTTP listing endpoint on a background thread.
pub struct RegistryServer {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl RegistryServer {
    /// Binds the endpoint and spawns the serving thread.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BindError`] if the port cannot be bound.
    pub fn start(port: u16, listing: ServerListing) -> Result<Self, RegistryError> {
        let server =
            tiny_http::Server::http(("0.0.0.0", port)).map_err(|e| RegistryError::BindError {
                port,
                error: e.to_string(),
            })?;

        let shared = Arc::new(Shared {
            listing: Mutex::new(listing),
            shutdown: Mutex::new(false),
        });
        let thread_shared = shared.clone();

        let handle = std::thread::Builder::new()
            .name("registry-listing".into())
            .spawn(move || serve(&server, &thread_shared))
            .map_err(|e| RegistryError::BindError {
                port,
                error: e.to_string(),
            })?;

        tracing::info!("registry listing endpoint on port {port}");
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Publishes fresh facts from the tick loop. Non-blocking in practice:
    /// the serving thread holds the lock only while formatting a response.
    pub fn publish(&self, listing: ServerListing) {
        if let Ok(mut slot) = self.shared.listing.lock() {
            *slot = listing;
        }
    }

    /// Stops the serving thread and waits for it to exit.
    pub fn shutdown(&mut self) {
        if let Ok(mut flag) = self.shared.shutdown.lock() {
            *flag = true;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RegistryServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(server: &tiny_http::Server, shared: &Shared) {
    loop {
        if shared.shutdown.lock().map(|f| *f).unwrap_or(true) {
            return;
        }
        let request = match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("listing endpoint receive error: {e}");
                return;
            }
        };

        let body = shared
            .listing
            .lock()
            .ok()
            .and_then(|listing| serde_json::to_string(&*listing).ok());
        let response = match body {
            Some(json) => {
                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    &b"application/json"[..],
                );
                let mut response = tiny_http::Response::from_string(json);
                if let Ok(header) = header {
                    response.add_header(header);
                }
                response
            }
            None => tiny_http::Response::from_string("{}").with_status_code(500),
        };
        if let Err(e) = request.respond(response) {
            tracing::warn!("listing endpoint respond error: {e}");
        }
    }
}
