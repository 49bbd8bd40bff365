//! # Logging
//! src/logging.rs
//!
//! Dos niveles de logging:
//!
//! - Diagnóstico del servidor con `tracing` (arranque, warnings, errores).
//! - Access log: una línea por respuesta escrita en un [`LogSink`].
//!
//! ## Formato del access log
//!
//! ```text
//! 127.0.0.1 - - [Sun, 19 Oct 2026 10:00:00 GMT] "GET /users HTTP/1.1" 200 27 3ms
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::http::{Method, Request};

/// Inicializa el subscriber global de `tracing`
///
/// Si ya había uno instalado (por ejemplo en tests) no hace nada.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_names(true)
        .try_init();
}

/// Destino de líneas de log (append-only, una llamada por evento)
pub trait LogSink: Send + Sync {
    fn write(&self, line: &str);
}

/// Sink que reenvía cada línea a `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, line: &str) {
        info!(target: "cbsf_server::access", "{}", line);
    }
}

/// Sink que agrega cada línea a un archivo
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    /// Abre (o crea) el archivo en modo append
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn write(&self, line: &str) {
        let mut file = match self.file.lock() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{}", line) {
            warn!("No se pudo escribir en el access log: {}", e);
        }
    }
}

/// Access log compartido por todos los workers
///
/// El mutex propio serializa las líneas para que dos workers nunca
/// intercalen su salida, sin importar el sink.
pub struct AccessLog {
    sink: Box<dyn LogSink>,
    lock: Mutex<()>,
    log_params: bool,
}

impl AccessLog {
    pub fn new(sink: Box<dyn LogSink>, log_params: bool) -> Self {
        Self {
            sink,
            lock: Mutex::new(()),
            log_params,
        }
    }

    /// Access log sobre `tracing`
    pub fn tracing(log_params: bool) -> Self {
        Self::new(Box::new(TracingSink), log_params)
    }

    /// Registra una respuesta enviada
    pub fn record(&self, client_ip: &str, request: &Request, status: u16, body_len: usize, elapsed: Duration) {
        let line = format_access_line(
            client_ip,
            request,
            status,
            body_len,
            elapsed,
            self.log_params,
            SystemTime::now(),
        );
        self.write_line(&line);
    }

    /// Registra una respuesta de error generada por el framework
    pub fn error(&self, code: u16, message: &str) {
        let line = format!(
            "Time {} Code {} Error: {}",
            httpdate::fmt_http_date(SystemTime::now()),
            code,
            message
        );
        self.write_line(&line);
    }

    fn write_line(&self, line: &str) {
        let _guard = match self.lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.sink.write(line);
    }
}

/// Formatea una línea del access log
fn format_access_line(
    client_ip: &str,
    request: &Request,
    status: u16,
    body_len: usize,
    elapsed: Duration,
    log_params: bool,
    now: SystemTime,
) -> String {
    let mut target = request.path().to_string();

    if log_params && !request.query_params().is_empty() {
        // Orden estable para que las líneas sean comparables
        let mut params: Vec<_> = request.query_params().iter().collect();
        params.sort();
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        target.push('?');
        target.push_str(&query);
    }

    let method = match request.method() {
        Method::Other(m) if m.is_empty() => "-",
        m => m.as_str(),
    };

    format!(
        "{} - - [{}] \"{} {} HTTP/1.1\" {} {} {}ms",
        client_ip,
        httpdate::fmt_http_date(now),
        method,
        target,
        status,
        body_len,
        elapsed.as_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Sink en memoria para inspeccionar las líneas
    #[derive(Default, Clone)]
    struct MemorySink {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl LogSink for MemorySink {
        fn write(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    #[test]
    fn test_access_line_format() {
        let request = Request::parse(b"GET /users?id=7 HTTP/1.1\r\nHost: x\r\n\r\n");
        let line = format_access_line(
            "10.0.0.1",
            &request,
            200,
            27,
            Duration::from_millis(3),
            false,
            SystemTime::UNIX_EPOCH,
        );

        assert_eq!(
            line,
            "10.0.0.1 - - [Thu, 01 Jan 1970 00:00:00 GMT] \"GET /users HTTP/1.1\" 200 27 3ms"
        );
    }

    #[test]
    fn test_access_line_with_params() {
        let request = Request::parse(b"GET /s?b=2&a=1 HTTP/1.1\r\n\r\n");
        let line = format_access_line(
            "::1",
            &request,
            404,
            0,
            Duration::ZERO,
            true,
            SystemTime::UNIX_EPOCH,
        );

        assert!(line.contains("\"GET /s?a=1&b=2 HTTP/1.1\" 404 0 0ms"));
    }

    #[test]
    fn test_access_log_uses_sink() {
        let sink = MemorySink::default();
        let log = AccessLog::new(Box::new(sink.clone()), false);

        let request = Request::parse(b"POST /login HTTP/1.1\r\n\r\n");
        log.record("127.0.0.1", &request, 500, 10, Duration::from_millis(1));
        log.error(404, "Resource not found");

        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"POST /login HTTP/1.1\" 500 10"));
        assert!(lines[1].contains("Code 404 Error: Resource not found"));
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");

        let sink = FileSink::open(&path).unwrap();
        sink.write("first");
        sink.write("second");
        drop(sink);

        // Reabrir no trunca el archivo
        let sink = FileSink::open(&path).unwrap();
        sink.write("third");
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\nthird\n");
    }

    #[test]
    fn test_concurrent_lines_not_interleaved() {
        let sink = MemorySink::default();
        let log = Arc::new(AccessLog::new(Box::new(sink.clone()), false));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        log.error(500, &format!("worker-{}", i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines.len(), 400);
        assert!(lines.iter().all(|l| l.starts_with("Time ") && l.contains("Error: worker-")));
    }
}
