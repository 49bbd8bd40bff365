//! # Sockets de Escucha y Accept Loops
//! src/server/listener.rs
//!
//! Dos sockets separados en el mismo puerto: IPv4 en `0.0.0.0` (obligatorio)
//! e IPv6 en `::` con `IPV6_V6ONLY` (best-effort). Cada accept loop es el
//! único dueño de su listener y lo cierra al salir.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};

use super::connection::{handle_connection, ConnectionContext};
use super::lifecycle::Lifecycle;
use crate::error::{AddressFamily, ServerError};
use crate::pool::ThreadPool;

/// Backlog del `listen()`
const BACKLOG: i32 = 1024;

/// Enlaza el socket IPv4; cualquier fallo es fatal
pub(crate) fn bind_ipv4(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    bind_socket(addr).map_err(|source| ServerError::Bind {
        family: AddressFamily::V4,
        addr,
        source,
    })
}

/// Enlaza el socket IPv6; el llamador decide si un fallo importa
pub(crate) fn bind_ipv6(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    bind_socket(addr).map_err(|source| ServerError::Bind {
        family: AddressFamily::V6,
        addr,
        source,
    })
}

fn bind_socket(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    if domain == Domain::IPV6 {
        // Sin esto el socket IPv6 también reclamaría el puerto IPv4
        socket.set_only_v6(true)?;
    }

    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    Ok(socket.into())
}

/// Acepta conexiones hasta que el servidor se detenga
///
/// Cada conexión se entrega al pool como una tarea. Si la cola la rechaza,
/// la tarea (y con ella el socket) ya se destruyó: el cliente ve el cierre.
pub(crate) fn accept_loop(
    listener: TcpListener,
    family: AddressFamily,
    lifecycle: &Lifecycle,
    pool: &ThreadPool,
    ctx: &Arc<ConnectionContext>,
) {
    tracing::debug!(%family, "Accept loop started");

    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                if !lifecycle.is_running() {
                    // Conexión de despertar (o cliente tardío): se cierra al soltarla
                    break;
                }

                let ctx = Arc::clone(ctx);
                let accepted = pool.submit(move || {
                    if let Err(e) = handle_connection(stream, peer, &ctx) {
                        tracing::debug!(%peer, "Connection error: {}", e);
                    }
                });

                if !accepted {
                    tracing::warn!(%peer, "Task queue full, connection closed without response");
                }
            }
            Err(e) => {
                if !lifecycle.is_running() {
                    break;
                }
                if e.kind() != io::ErrorKind::Interrupted {
                    tracing::error!(%family, "Failed to accept connection: {}", e);
                }
            }
        }
    }

    drop(listener);
    tracing::debug!(%family, "Listener closed");
}
