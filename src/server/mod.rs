//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! El servidor:
//! 1. Enlaza IPv4 (obligatorio) e IPv6 (best-effort) en el mismo puerto
//! 2. Acepta conexiones (IPv4 en el thread de `run()`, IPv6 en uno propio)
//! 3. Entrega cada conexión al pool de workers
//! 4. Cada worker lee, parsea, despacha, responde y cierra
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use cbsf_server::config::Config;
//! use cbsf_server::server::Server;
//!
//! let server = Server::new(Config::default()).unwrap();
//! server.get("/hello", |req, res| {
//!     res.json(&format!(r#"{{"hello":"{}"}}"#, req.query_param("name")));
//!     Ok(())
//! });
//! server.run().unwrap();
//! ```

mod connection;
pub mod lan;
mod lifecycle;
mod listener;
mod signals;

pub use lifecycle::{ServerState, ShutdownHandle};

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AddressFamily, ServerError};
use crate::http::{Method, Request, Response};
use crate::logging::{AccessLog, FileSink};
use crate::pool::{PoolStats, ThreadPool};
use crate::router::RouteTable;
use connection::{ConnectionContext, ReadLimits};
use lifecycle::Lifecycle;

/// Servidor HTTP/1.1 sobre TCP crudo
pub struct Server {
    config: Config,
    routes: Arc<RouteTable>,
    pool: Arc<ThreadPool>,
    access_log: Arc<AccessLog>,
    lifecycle: Arc<Lifecycle>,
}

impl Server {
    /// Crea el servidor y arranca el pool de workers
    ///
    /// Todavía no abre ningún socket; eso ocurre en [`Server::run`].
    pub fn new(config: Config) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::InvalidConfig)?;

        let access_log = match &config.access_log {
            Some(path) => AccessLog::new(Box::new(FileSink::open(path)?), config.log_params),
            None => AccessLog::tracing(config.log_params),
        };

        let pool = ThreadPool::new(config.worker_count(), config.max_queue)?;

        Ok(Self {
            config,
            routes: Arc::new(RouteTable::new()),
            pool: Arc::new(pool),
            access_log: Arc::new(access_log),
            lifecycle: Arc::new(Lifecycle::new()),
        })
    }

    /// Registra un handler para un método y path exactos
    pub fn route<F>(&self, method: Method, path: &str, handler: F)
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.routes.register(method, path, handler);
    }

    pub fn get<F>(&self, path: &str, handler: F)
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::GET, path, handler);
    }

    pub fn post<F>(&self, path: &str, handler: F)
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::POST, path, handler);
    }

    pub fn put<F>(&self, path: &str, handler: F)
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::PUT, path, handler);
    }

    /// Registra un handler `DELETE`
    pub fn del<F>(&self, path: &str, handler: F)
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, path, handler);
    }

    /// Tabla de rutas del servidor
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Enlaza los sockets y atiende conexiones hasta `stop()`
    ///
    /// Bloquea el thread actual con el accept loop IPv4. Falla si el socket
    /// IPv4 no se puede enlazar, o si el servidor ya corrió.
    pub fn run(&self) -> Result<(), ServerError> {
        self.lifecycle.begin()?;

        let (ipv4, ipv6) = match self.bind_listeners() {
            Ok(listeners) => listeners,
            Err(e) => {
                self.lifecycle.stop();
                return Err(e);
            }
        };

        let ipv4_addr = match ipv4.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.lifecycle.stop();
                return Err(e.into());
            }
        };
        let ipv6_addr = ipv6.as_ref().and_then(|l| l.local_addr().ok());

        if !self.lifecycle.mark_bound(ipv4_addr, ipv6_addr) {
            // stop() llegó mientras se enlazaban los sockets
            return Ok(());
        }

        self.routes.log_routes();
        log_banner(ipv4_addr.port(), ipv6_addr.is_some());

        let ctx = Arc::new(ConnectionContext {
            routes: Arc::clone(&self.routes),
            access_log: Arc::clone(&self.access_log),
            limits: ReadLimits {
                max_request_bytes: self.config.max_request_bytes,
                read_timeout: Duration::from_millis(self.config.read_timeout_ms),
            },
        });

        if let Some(listener) = ipv6 {
            let lifecycle = Arc::clone(&self.lifecycle);
            let pool = Arc::clone(&self.pool);
            let ctx = Arc::clone(&ctx);

            // Thread desacoplado: termina solo cuando stop() lo despierta
            let spawned = thread::Builder::new()
                .name("accept-ipv6".to_string())
                .spawn(move || listener::accept_loop(listener, AddressFamily::V6, &lifecycle, &pool, &ctx));

            if let Err(e) = spawned {
                tracing::warn!("Could not start IPv6 accept loop, serving IPv4 only: {}", e);
            }
        }

        listener::accept_loop(ipv4, AddressFamily::V4, &self.lifecycle, &self.pool, &ctx);

        tracing::info!("Server stopped");
        Ok(())
    }

    fn bind_listeners(&self) -> Result<(std::net::TcpListener, Option<std::net::TcpListener>), ServerError> {
        let ipv4 = listener::bind_ipv4(self.config.port)?;
        // Con puerto 0, IPv6 usa el puerto efímero que recibió IPv4
        let port = ipv4.local_addr()?.port();

        let ipv6 = if self.config.no_ipv6 {
            None
        } else {
            match listener::bind_ipv6(port) {
                Ok(listener) => Some(listener),
                Err(e) => {
                    tracing::warn!("IPv6 unavailable, serving IPv4 only: {}", e);
                    None
                }
            }
        };

        Ok((ipv4, ipv6))
    }

    /// Detiene el servidor (idempotente)
    ///
    /// Los accept loops cierran sus sockets; las conexiones ya encoladas se
    /// terminan de atender.
    pub fn stop(&self) {
        if self.lifecycle.stop() {
            tracing::info!("Stopping server");
        }
    }

    /// Handle para detener el servidor desde otro thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.lifecycle))
    }

    /// Hace que SIGINT/SIGTERM detengan este servidor
    pub fn install_signal_handlers(&self) -> Result<(), ServerError> {
        signals::install(self.shutdown_handle())?;
        Ok(())
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Dirección IPv4 enlazada, una vez que `run()` arrancó
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr()
    }

    /// Estado del pool de workers
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
        signals::unregister(&self.shutdown_handle());
        // Espera a que los workers terminen lo que tienen en la cola
        self.pool.shutdown();
    }
}

/// URLs de acceso al arrancar
fn log_banner(port: u16, ipv6: bool) {
    tracing::info!("Server listening on port {}", port);
    tracing::info!("  Local:        http://localhost:{}", port);
    tracing::info!("  Network:      http://{}:{}", lan::lan_ipv4(), port);

    if ipv6 {
        tracing::info!("  Local IPv6:   http://[::1]:{}", port);
        tracing::info!("  Network IPv6: http://[{}]:{}", lan::lan_ipv6(), port);
    }
}
