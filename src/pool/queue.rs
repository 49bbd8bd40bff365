//! # Cola de Tareas
//! src/pool/queue.rs
//!
//! Cola FIFO acotada y thread-safe. El mutex protege solo la pertenencia a
//! la cola; las tareas se ejecutan fuera del lock.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Unidad de trabajo: se ejecuta exactamente una vez y su resultado no se
/// observa
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Motivo por el que se rechazó una tarea
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// La cola alcanzó su capacidad máxima
    Full,

    /// La cola ya no acepta trabajo
    Closed,
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejected::Full => write!(f, "Task queue is full"),
            Rejected::Closed => write!(f, "Task queue is closed"),
        }
    }
}

impl std::error::Error for Rejected {}

struct QueueState {
    tasks: VecDeque<Task>,
    accepting: bool,
}

/// Cola de tareas acotada
pub struct TaskQueue {
    state: Mutex<QueueState>,

    /// Notifica a los workers cuando hay tareas o al cerrar
    condvar: Condvar,

    /// Capacidad máxima de la cola
    max_capacity: usize,
}

impl TaskQueue {
    /// Crea una cola vacía con capacidad máxima
    pub fn new(max_capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                accepting: true,
            }),
            condvar: Condvar::new(),
            max_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Las tareas nunca corren con el lock tomado, así que un lock
        // envenenado no deja la cola a medio modificar
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Encola una tarea sin bloquear
    ///
    /// Si se rechaza, la tarea se destruye antes de retornar: cualquier
    /// recurso que capture (por ejemplo un socket) queda liberado.
    pub fn push(&self, task: Task) -> Result<(), Rejected> {
        let mut state = self.lock();

        if !state.accepting {
            return Err(Rejected::Closed);
        }
        if state.tasks.len() >= self.max_capacity {
            return Err(Rejected::Full);
        }

        state.tasks.push_back(task);
        drop(state);

        // Notificar a un worker esperando
        self.condvar.notify_one();
        Ok(())
    }

    /// Desencola la siguiente tarea
    ///
    /// Bloquea mientras la cola esté vacía y abierta. Retorna `None` solo
    /// cuando la cola está cerrada y ya no quedan tareas.
    pub fn pop(&self) -> Option<Task> {
        let mut state = self.lock();

        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if !state.accepting {
                return None;
            }

            // Esperar a que haya tareas o a que cierren la cola
            state = match self.condvar.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Deja de aceptar tareas y despierta a todos los workers
    pub fn close(&self) {
        self.lock().accepting = false;
        self.condvar.notify_all();
    }

    /// Indica si la cola sigue aceptando tareas
    pub fn is_accepting(&self) -> bool {
        self.lock().accepting
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Verifica si la cola está vacía
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retorna la capacidad máxima
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Verifica si la cola está llena
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_capacity
    }
}
