//! # CBSF Server
//! src/lib.rs
//!
//! Servidor HTTP/1.1 implementado desde cero sobre sockets TCP crudos:
//! parser propio, pool fijo de threads con cola acotada, escucha dual
//! IPv4/IPv6 y apagado ordenado por señal.
//!
//! ## Arquitectura
//!
//! - `http`: modelo de request/response, parsing y serialización
//! - `router`: tabla de rutas exacta (método, path) → handler
//! - `pool`: cola FIFO acotada y workers
//! - `server`: sockets, accept loops, ciclo de vida y señales
//! - `config`: CLI y variables de entorno
//! - `logging`: tracing y access log
//! - `error`: errores del ciclo de vida
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use cbsf_server::config::Config;
//! use cbsf_server::server::Server;
//!
//! let server = Server::new(Config::default()).expect("config válida");
//! server.get("/health", |_req, res| {
//!     res.success();
//!     Ok(())
//! });
//! server.install_signal_handlers().expect("señales");
//! server.run().expect("Error al iniciar servidor");
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod pool;
pub mod router;
pub mod server;

pub use error::ServerError;
