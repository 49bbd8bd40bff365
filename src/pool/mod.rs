//! # Pool de Workers
//!
//! Un número fijo de threads del sistema consumen tareas de una cola FIFO
//! acotada compartida.
//!
//! ## Flujo
//!
//! ```text
//! submit(task) ──► TaskQueue (Mutex + Condvar) ──► worker-0 ... worker-N
//!      │
//!      └── cola llena o cerrada: la tarea se destruye y submit retorna false
//! ```
//!
//! Un pánico dentro de una tarea se captura en el worker, se registra y el
//! worker sigue atendiendo la cola.

pub mod queue;

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde::Serialize;

pub use queue::{Rejected, Task, TaskQueue};

/// Contadores compartidos por los workers
#[derive(Debug, Default)]
struct Counters {
    completed: AtomicUsize,
    panicked: AtomicUsize,
}

/// Foto del estado del pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub pending: usize,
    pub capacity: usize,
    pub completed: usize,
    pub panicked: usize,
}

/// Pool de threads con cola acotada
pub struct ThreadPool {
    queue: Arc<TaskQueue>,
    counters: Arc<Counters>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl ThreadPool {
    /// Crea el pool y arranca `threads` workers (mínimo 1)
    ///
    /// Falla solo si el sistema operativo no puede crear un thread.
    pub fn new(threads: usize, max_queue: usize) -> io::Result<Self> {
        let size = threads.max(1);
        let queue = Arc::new(TaskQueue::new(max_queue));
        let counters = Arc::new(Counters::default());

        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let worker_queue = Arc::clone(&queue);
            let worker_counters = Arc::clone(&counters);

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", i))
                .spawn(move || worker_loop(worker_queue, worker_counters));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Liberar los workers que sí arrancaron
                    queue_close_and_join(&queue, workers);
                    return Err(e);
                }
            }
        }

        tracing::debug!(workers = size, max_queue, "Thread pool started");

        Ok(Self {
            queue,
            counters,
            workers: Mutex::new(workers),
            size,
        })
    }

    /// Encola una tarea sin bloquear
    ///
    /// Retorna `false` si la cola está llena o el pool se está apagando; en
    /// ese caso la tarea ya fue destruida al retornar.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.queue.push(Box::new(task)) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(%reason, "Task rejected");
                false
            }
        }
    }

    /// Deja de aceptar tareas, drena la cola y espera a los workers
    ///
    /// Idempotente. Llamado desde un worker no se espera a sí mismo.
    pub fn shutdown(&self) {
        self.queue.close();

        let handles = {
            let mut workers = match self.workers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *workers)
        };

        join_all(handles);
    }

    /// Número de workers
    pub fn size(&self) -> usize {
        self.size
    }

    /// Tareas esperando en la cola
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Estadísticas actuales
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.size,
            pending: self.queue.len(),
            capacity: self.queue.max_capacity(),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Loop principal del worker
fn worker_loop(queue: Arc<TaskQueue>, counters: Arc<Counters>) {
    let name = thread::current().name().unwrap_or("worker").to_string();
    tracing::trace!(worker = %name, "Worker started");

    while let Some(task) = queue.pop() {
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker = %name,
                    "Worker task failed: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    tracing::trace!(worker = %name, "Worker stopped");
}

fn queue_close_and_join(queue: &TaskQueue, handles: Vec<JoinHandle<()>>) {
    queue.close();
    join_all(handles);
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    let current = thread::current().id();
    for handle in handles {
        if handle.thread().id() == current {
            continue;
        }
        let _ = handle.join();
    }
}

/// Extrae el mensaje de un pánico capturado
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
