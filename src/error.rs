//! # Errores del Servidor
//! src/error.rs
//!
//! Errores que puede devolver el ciclo de vida del servidor.
//!
//! Solo los errores de arranque sobre IPv4 son fatales. Los fallos de IPv6,
//! de una conexión individual o de un handler se registran y el servidor
//! sigue atendiendo.

use std::io;
use std::net::SocketAddr;

/// Familia de direcciones de un socket de escucha
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::V4 => "IPv4",
            AddressFamily::V6 => "IPv6",
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errores del servidor
#[derive(Debug)]
pub enum ServerError {
    /// No se pudo crear, enlazar o poner a escuchar un socket
    Bind {
        family: AddressFamily,
        addr: SocketAddr,
        source: io::Error,
    },

    /// `run()` llamado mientras el servidor ya está corriendo
    AlreadyRunning,

    /// `run()` llamado después de `stop()`; no hay reinicio
    AlreadyStopped,

    /// Configuración inválida
    InvalidConfig(String),

    /// No se pudo instalar el manejador de señales
    Signal(ctrlc::Error),

    /// Cualquier otro error de E/S
    Io(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind { family, addr, source } => {
                write!(f, "Failed to set up {} listener on {}: {}", family, addr, source)
            }
            ServerError::AlreadyRunning => write!(f, "Server is already running"),
            ServerError::AlreadyStopped => write!(f, "Server was stopped and cannot be restarted"),
            ServerError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            ServerError::Signal(e) => write!(f, "Failed to install signal handler: {}", e),
            ServerError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind { source, .. } => Some(source),
            ServerError::Signal(e) => Some(e),
            ServerError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ctrlc::Error> for ServerError {
    fn from(e: ctrlc::Error) -> Self {
        ServerError::Signal(e)
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        ServerError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            family: AddressFamily::V4,
            addr: "0.0.0.0:80".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        let text = err.to_string();
        assert!(text.contains("IPv4"));
        assert!(text.contains("0.0.0.0:80"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_lifecycle_errors_display() {
        assert_eq!(ServerError::AlreadyRunning.to_string(), "Server is already running");
        assert!(ServerError::AlreadyStopped.to_string().contains("cannot be restarted"));
    }
}
