//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor con soporte para argumentos CLI y variables
//! de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./cbsf_server --port 8080 \
//!   --threads 8 \
//!   --max-queue 10000 \
//!   --access-log ./log.log
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 WORKER_THREADS=8 ./cbsf_server
//! ```

use clap::Parser;
use tracing::info;

/// Capacidad por defecto de la cola de tareas
pub const DEFAULT_MAX_QUEUE: usize = 10_000;

/// Tamaño máximo por defecto de un request (1 MiB)
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Configuración del servidor HTTP/1.1
#[derive(Debug, Clone, Parser)]
#[command(name = "cbsf_server")]
#[command(about = "Servidor HTTP/1.1 sobre TCP crudo con pool de threads")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto TCP (el mismo para IPv4 e IPv6; 0 = efímero)
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    // === Workers ===
    /// Número de threads del pool (por defecto: núcleos disponibles)
    #[arg(long, env = "WORKER_THREADS")]
    pub threads: Option<usize>,

    /// Capacidad máxima de la cola de tareas pendientes
    #[arg(long = "max-queue", default_value_t = DEFAULT_MAX_QUEUE, env = "MAX_QUEUE")]
    pub max_queue: usize,

    // === Lectura de requests ===
    /// Máximo de bytes leídos por request; el resto se descarta
    #[arg(long = "max-request-bytes", default_value_t = DEFAULT_MAX_REQUEST_BYTES, env = "MAX_REQUEST_BYTES")]
    pub max_request_bytes: usize,

    /// Timeout de lectura del socket en milisegundos
    #[arg(long = "read-timeout-ms", default_value = "5000", env = "READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    // === Logging ===
    /// Incluir los query params en el access log
    #[arg(long = "log-params", env = "LOG_PARAMS")]
    pub log_params: bool,

    /// Archivo de access log (si falta, se usa tracing)
    #[arg(long = "access-log", env = "ACCESS_LOG")]
    pub access_log: Option<String>,

    /// Filtro de logging (sintaxis de EnvFilter)
    #[arg(long = "log-level", default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    // === Red ===
    /// No intentar escuchar en IPv6
    #[arg(long = "no-ipv6", env = "DISABLE_IPV6")]
    pub no_ipv6: bool,
}

impl Config {
    /// Crea una configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Número efectivo de workers
    ///
    /// # Ejemplo
    /// ```rust
    /// use cbsf_server::config::Config;
    ///
    /// let mut config = Config::default();
    /// config.threads = Some(3);
    /// assert_eq!(config.worker_count(), 3);
    /// ```
    pub fn worker_count(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.threads == Some(0) {
            return Err("Worker threads must be >= 1".to_string());
        }
        if self.max_queue == 0 {
            return Err("Max queue must be >= 1".to_string());
        }
        if self.max_request_bytes < 1024 {
            return Err("Max request bytes must be >= 1024".to_string());
        }
        if self.read_timeout_ms == 0 {
            return Err("Read timeout must be > 0".to_string());
        }
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn print_summary(&self) {
        info!("Configuración:");
        info!("   Puerto:        {}", self.port);
        info!("   Workers:       {}", self.worker_count());
        info!("   Cola máxima:   {}", self.max_queue);
        info!("   Request máx.:  {} bytes", self.max_request_bytes);
        info!("   Read timeout:  {} ms", self.read_timeout_ms);
        info!("   IPv6:          {}", if self.no_ipv6 { "deshabilitado" } else { "best-effort" });
        match &self.access_log {
            Some(path) => info!("   Access log:    {}", path),
            None => info!("   Access log:    tracing"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            threads: None,
            max_queue: DEFAULT_MAX_QUEUE,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            read_timeout_ms: 5_000,
            log_params: false,
            access_log: None,
            log_level: "info".to_string(),
            no_ipv6: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_queue, 10_000);
        assert!(config.threads.is_none());
        assert!(!config.log_params);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worker_count_defaults_to_parallelism() {
        let config = Config::default();
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_validate_zero_threads() {
        let mut config = Config::default();
        config.threads = Some(0);
        let result = config.validate();
        assert!(result.unwrap_err().contains("Worker threads"));
    }

    #[test]
    fn test_validate_zero_queue() {
        let mut config = Config::default();
        config.max_queue = 0;
        assert!(config.validate().unwrap_err().contains("Max queue"));
    }

    #[test]
    fn test_validate_small_request_limit() {
        let mut config = Config::default();
        config.max_request_bytes = 100;
        assert!(config.validate().unwrap_err().contains("Max request bytes"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.read_timeout_ms = 0;
        assert!(config.validate().unwrap_err().contains("Read timeout"));
    }

    #[test]
    fn test_parse_cli_args() {
        let config = Config::try_parse_from([
            "cbsf_server",
            "--port",
            "3000",
            "--threads",
            "2",
            "--max-queue",
            "16",
            "--log-params",
        ])
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.max_queue, 16);
        assert!(config.log_params);
    }

    #[test]
    fn test_print_summary() {
        // No debe hacer panic
        Config::default().print_summary();
    }
}
