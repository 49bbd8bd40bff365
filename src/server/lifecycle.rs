//! # Ciclo de Vida del Servidor
//! src/server/lifecycle.rs
//!
//! ```text
//! Created ──run()──► Running ──stop()──► Stopped
//!    └──────────────stop()──────────────────┘
//! ```
//!
//! `Stopped` es terminal. `stop()` es idempotente y puede llamarse desde
//! cualquier thread (incluido el thread de señales).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::ServerError;

/// Tiempo máximo para la conexión que despierta a un `accept()` bloqueado
const WAKE_TIMEOUT: Duration = Duration::from_millis(250);

/// Estado del servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    Stopped,
}

#[derive(Debug)]
struct Inner {
    state: ServerState,
    ipv4: Option<SocketAddr>,
    ipv6: Option<SocketAddr>,
}

/// Estado compartido entre `run()`, los accept loops y los handles
#[derive(Debug)]
pub(crate) struct Lifecycle {
    inner: Mutex<Inner>,
    changed: Condvar,

    /// Copia del estado para consultas sin lock desde los accept loops
    running: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ServerState::Created,
                ipv4: None,
                ipv6: None,
            }),
            changed: Condvar::new(),
            running: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// `Created → Running`
    pub(crate) fn begin(&self) -> Result<(), ServerError> {
        let mut inner = self.lock();
        match inner.state {
            ServerState::Created => {
                inner.state = ServerState::Running;
                self.running.store(true, Ordering::SeqCst);
                Ok(())
            }
            ServerState::Running => Err(ServerError::AlreadyRunning),
            ServerState::Stopped => Err(ServerError::AlreadyStopped),
        }
    }

    /// Publica las direcciones enlazadas
    ///
    /// Retorna `false` si el servidor se detuvo mientras se enlazaban los
    /// sockets; el llamador debe cerrarlos sin entrar a los accept loops.
    pub(crate) fn mark_bound(&self, ipv4: SocketAddr, ipv6: Option<SocketAddr>) -> bool {
        let mut inner = self.lock();
        if inner.state != ServerState::Running {
            return false;
        }
        inner.ipv4 = Some(ipv4);
        inner.ipv6 = ipv6;
        drop(inner);

        self.changed.notify_all();
        true
    }

    /// Pasa a `Stopped` y despierta a los accept loops
    ///
    /// Retorna `true` solo en la llamada que hizo la transición.
    pub(crate) fn stop(&self) -> bool {
        let wake_targets = {
            let mut inner = self.lock();
            if inner.state == ServerState::Stopped {
                return false;
            }
            inner.state = ServerState::Stopped;
            self.running.store(false, Ordering::SeqCst);

            [inner.ipv4, inner.ipv6]
                .into_iter()
                .flatten()
                .map(wake_address)
                .collect::<Vec<_>>()
        };
        self.changed.notify_all();

        // Una conexión descartable hace que el accept() bloqueado retorne
        for addr in wake_targets {
            if let Err(e) = TcpStream::connect_timeout(&addr, WAKE_TIMEOUT) {
                tracing::debug!(%addr, "Wake-up connection failed: {}", e);
            }
        }

        true
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn state(&self) -> ServerState {
        self.lock().state
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().ipv4
    }

    pub(crate) fn local_addr_v6(&self) -> Option<SocketAddr> {
        self.lock().ipv6
    }

    /// Espera a que el socket IPv4 quede escuchando
    ///
    /// Retorna `None` si vence el timeout o si el servidor se detuvo antes.
    pub(crate) fn wait_until_bound(&self, timeout: Duration) -> Option<SocketAddr> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();

        loop {
            if let Some(addr) = inner.ipv4 {
                return Some(addr);
            }
            if inner.state == ServerState::Stopped {
                return None;
            }

            let remaining = deadline.checked_duration_since(Instant::now())?;
            inner = match self.changed.wait_timeout(inner, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Dirección de loopback equivalente a una dirección de escucha
fn wake_address(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        other => other,
    };
    SocketAddr::new(ip, bound.port())
}

/// Handle clonable para detener el servidor desde otro thread
///
/// # Ejemplo
/// ```no_run
/// use cbsf_server::config::Config;
/// use cbsf_server::server::Server;
/// use std::thread;
///
/// let server = Server::new(Config::default()).unwrap();
/// let handle = server.shutdown_handle();
///
/// let serving = thread::spawn(move || server.run());
/// handle.stop();
/// serving.join().unwrap().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    lifecycle: Arc<Lifecycle>,
}

impl ShutdownHandle {
    pub(crate) fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Detiene el servidor (idempotente)
    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Dirección IPv4 enlazada, si ya está escuchando
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr()
    }

    /// Dirección IPv6 enlazada, si la hay
    pub fn local_addr_v6(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr_v6()
    }

    /// Espera a que el servidor esté aceptando conexiones
    pub fn wait_until_bound(&self, timeout: Duration) -> Option<SocketAddr> {
        self.lifecycle.wait_until_bound(timeout)
    }

    pub(crate) fn same_server(&self, other: &ShutdownHandle) -> bool {
        Arc::ptr_eq(&self.lifecycle, &other.lifecycle)
    }
}
