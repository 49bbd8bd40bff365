//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Tabla de rutas de dos niveles: método HTTP → (path exacto → handler).
//!
//! ## Arquitectura
//!
//! ```text
//! Request → RouteTable::dispatch(method, path) → Handler → Response
//! ```
//!
//! Solo hay coincidencia exacta: `/users` no atiende `/users/` ni
//! `/users/1`. Sin wildcards ni parámetros de path.
//!
//! El mutex se toma solo durante un registro o una búsqueda; `dispatch`
//! devuelve un clon del `Arc` y el handler corre sin el lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::http::{Method, Request, Response};

/// Handler registrado para un par (método, path)
///
/// Modifica la respuesta in-place. Un `Err` se convierte en un 500 con el
/// mensaje del error.
pub type Handler = Arc<dyn Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync>;

/// Orden en que se listan las rutas al arrancar
const LISTED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

/// Tabla de rutas compartida entre el registro y los workers
#[derive(Default)]
pub struct RouteTable {
    routes: Mutex<HashMap<Method, HashMap<String, Handler>>>,
}

impl RouteTable {
    /// Crea una tabla vacía
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Method, HashMap<String, Handler>>> {
        match self.routes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registra (o reemplaza) el handler de un par exacto (método, path)
    ///
    /// # Ejemplo
    /// ```
    /// use cbsf_server::http::Method;
    /// use cbsf_server::router::RouteTable;
    ///
    /// let table = RouteTable::new();
    /// table.register(Method::GET, "/hello", |_req, res| {
    ///     res.json(r#"{"message":"Hello"}"#);
    ///     Ok(())
    /// });
    ///
    /// assert!(table.dispatch(&Method::GET, "/hello").is_some());
    /// assert!(table.dispatch(&Method::POST, "/hello").is_none());
    /// ```
    pub fn register<F>(&self, method: Method, path: &str, handler: F)
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let replaced = self
            .lock()
            .entry(method.clone())
            .or_default()
            .insert(path.to_string(), handler);

        if replaced.is_some() {
            tracing::debug!(method = %method, path, "Route handler replaced");
        }
    }

    /// Busca el handler para (método, path) con coincidencia exacta
    pub fn dispatch(&self, method: &Method, path: &str) -> Option<Handler> {
        self.lock()
            .get(method)
            .and_then(|paths| paths.get(path))
            .map(Arc::clone)
    }

    /// Lista las rutas registradas, ordenadas por método y path
    pub fn routes(&self) -> Vec<(Method, String)> {
        let table = self.lock();
        let mut routes: Vec<(Method, String)> = table
            .iter()
            .flat_map(|(method, paths)| paths.keys().map(move |p| (method.clone(), p.clone())))
            .collect();

        routes.sort_by(|a, b| (method_rank(&a.0), a.0.as_str(), &a.1).cmp(&(method_rank(&b.0), b.0.as_str(), &b.1)));
        routes
    }

    /// Número total de rutas
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registra en el log las rutas agrupadas por método
    pub fn log_routes(&self) {
        let routes = self.routes();
        if routes.is_empty() {
            tracing::warn!("No routes registered");
            return;
        }

        tracing::info!("Registered routes:");
        for method in &LISTED_METHODS {
            let paths: Vec<&str> = routes
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, p)| p.as_str())
                .collect();

            if !paths.is_empty() {
                tracing::info!("  {:<6} {}", method.as_str(), paths.join(", "));
            }
        }
    }
}

/// Posición de un método en el listado (los no listados van al final)
fn method_rank(method: &Method) -> usize {
    LISTED_METHODS
        .iter()
        .position(|m| m == method)
        .unwrap_or(LISTED_METHODS.len())
}
