//! # Señales del Sistema
//! src/server/signals.rs
//!
//! `ctrlc` instala un único manejador por proceso (SIGINT, SIGTERM, SIGHUP;
//! eventos de consola en Windows). El manejador reenvía la señal al
//! servidor registrado aquí y a nada más.

use std::sync::{Mutex, MutexGuard};

use super::ShutdownHandle;

struct SignalState {
    installed: bool,
    target: Option<ShutdownHandle>,
}

static SIGNAL_STATE: Mutex<SignalState> = Mutex::new(SignalState {
    installed: false,
    target: None,
});

fn lock() -> MutexGuard<'static, SignalState> {
    match SIGNAL_STATE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Registra el servidor que debe detenerse al recibir una señal
///
/// La primera llamada instala el manejador; las siguientes solo cambian
/// el destino.
pub(crate) fn install(handle: ShutdownHandle) -> Result<(), ctrlc::Error> {
    let mut state = lock();
    state.target = Some(handle);

    if !state.installed {
        ctrlc::set_handler(forward)?;
        state.installed = true;
        tracing::debug!("Signal handler installed");
    }
    Ok(())
}

/// Quita el registro si todavía apunta a este servidor
pub(crate) fn unregister(handle: &ShutdownHandle) {
    let mut state = lock();
    if state.target.as_ref().is_some_and(|t| t.same_server(handle)) {
        state.target = None;
    }
}

/// Corre en el thread propio de `ctrlc`, no en contexto de señal
fn forward() {
    let target = lock().target.clone();
    match target {
        Some(handle) => {
            tracing::info!("Shutdown signal received, stopping server");
            handle.stop();
        }
        None => tracing::warn!("Shutdown signal received with no server registered"),
    }
}
