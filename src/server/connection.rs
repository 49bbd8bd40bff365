//! # Manejo de una Conexión
//! src/server/connection.rs
//!
//! Corre dentro de un worker del pool. Secuencia estricta por conexión:
//!
//! ```text
//! leer bytes → Request::parse → OPTIONS / dispatch → handler → to_bytes → escribir → cerrar
//! ```
//!
//! Un request por conexión; el socket se cierra al soltar el `TcpStream`.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::http::request::find_header_end;
use crate::http::{Method, Request, Response, StatusCode};
use crate::logging::AccessLog;
use crate::pool::panic_message;
use crate::router::RouteTable;

/// Tamaño de cada lectura del socket
const READ_CHUNK: usize = 8192;

/// Límites de lectura de un request
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadLimits {
    pub max_request_bytes: usize,
    pub read_timeout: Duration,
}

/// Todo lo que un worker necesita para atender conexiones
pub(crate) struct ConnectionContext {
    pub routes: Arc<RouteTable>,
    pub access_log: Arc<AccessLog>,
    pub limits: ReadLimits,
}

/// Atiende una conexión aceptada de principio a fin
///
/// Un primer read vacío o fallido cierra la conexión sin respuesta.
pub(crate) fn handle_connection(mut stream: TcpStream, peer: SocketAddr, ctx: &ConnectionContext) -> io::Result<()> {
    let start = Instant::now();
    stream.set_read_timeout(Some(ctx.limits.read_timeout))?;

    let raw = match read_request(&mut stream, ctx.limits.max_request_bytes) {
        Some(raw) => raw,
        None => {
            tracing::debug!(%peer, "Connection closed before sending a request");
            return Ok(());
        }
    };

    let request = Request::parse(&raw);
    tracing::debug!(%peer, method = %request.method(), path = request.path(), "Request received");

    let response = respond(&request, &ctx.routes, &ctx.access_log);

    stream.write_all(&response.to_bytes())?;
    stream.flush()?;

    ctx.access_log.record(
        &peer.ip().to_string(),
        &request,
        response.status().as_u16(),
        response.body().len(),
        start.elapsed(),
    );

    Ok(())
}

/// Lee un request completo
///
/// Termina al ver el fin de los headers más `Content-Length` bytes de body,
/// al llegar a `max_bytes`, en EOF o al vencer el timeout de lectura.
/// Retorna `None` si no llegó ningún byte.
pub(crate) fn read_request<R: Read>(stream: &mut R, max_bytes: usize) -> Option<Vec<u8>> {
    let mut buffer = Vec::with_capacity(READ_CHUNK.min(max_bytes));
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if !buffer.is_empty() {
                    tracing::debug!("Read stopped after {} bytes: {}", buffer.len(), e);
                }
                break;
            }
        };

        buffer.extend_from_slice(&chunk[..n]);

        if buffer.len() >= max_bytes {
            if buffer.len() > max_bytes || !is_complete(&buffer) {
                tracing::warn!(max_bytes, "Request exceeds the size limit, truncated");
            }
            buffer.truncate(max_bytes);
            break;
        }

        if is_complete(&buffer) {
            break;
        }
    }

    if buffer.is_empty() {
        None
    } else {
        Some(buffer)
    }
}

/// Headers terminados y body completo según `Content-Length`
fn is_complete(buffer: &[u8]) -> bool {
    match find_header_end(buffer) {
        Some((head_end, body_start)) => {
            let expected = content_length(&buffer[..head_end]).unwrap_or(0);
            buffer.len() - body_start >= expected
        }
        None => false,
    }
}

fn content_length(head: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(head)
        .split('\n')
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Produce la respuesta para un request ya parseado
///
/// Nunca propaga un error ni un pánico del handler.
pub(crate) fn respond(request: &Request, routes: &RouteTable, access_log: &AccessLog) -> Response {
    let mut response = Response::new();

    // Preflight CORS: 200 vacío sin pasar por el router
    if *request.method() == Method::OPTIONS {
        return response;
    }

    let handler = match routes.dispatch(request.method(), request.path()) {
        Some(handler) => handler,
        None => {
            response.error(StatusCode::NOT_FOUND, "Resource not found");
            access_log.error(
                StatusCode::NOT_FOUND.as_u16(),
                &format!("{} {} not found", request.method(), request.path()),
            );
            return response;
        }
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(request, &mut response)));

    let failure = match outcome {
        Ok(Ok(())) => return response,
        Ok(Err(e)) => format!("{:#}", e),
        Err(payload) => panic_message(payload.as_ref()),
    };

    tracing::error!(
        method = %request.method(),
        path = request.path(),
        "Handler failed: {}",
        failure
    );
    access_log.error(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), &failure);

    let mut response = Response::new();
    response.error(StatusCode::INTERNAL_SERVER_ERROR, &failure);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogSink;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default, Clone)]
    struct MemorySink(Arc<Mutex<Vec<String>>>);

    impl LogSink for MemorySink {
        fn write(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    fn memory_log() -> (AccessLog, MemorySink) {
        let sink = MemorySink::default();
        (AccessLog::new(Box::new(sink.clone()), false), sink)
    }

    fn table() -> RouteTable {
        let routes = RouteTable::new();
        routes.register(Method::GET, "/ok", |_, res| {
            res.success();
            Ok(())
        });
        routes.register(Method::GET, "/fail", |_, _| Err(anyhow::anyhow!("database unavailable")));
        routes.register(Method::GET, "/panic", |_, _| panic!("handler exploded"));
        routes
    }

    /// Reader que entrega los datos en trozos fijos
    struct Chunked {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = (self.pos + self.step).min(self.data.len()).min(self.pos + buf.len());
            let n = end - self.pos;
            buf[..n].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }
    }

    #[test]
    fn test_read_request_waits_for_content_length() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789".to_vec();
        let mut reader = Chunked { data: raw.clone(), pos: 0, step: 7 };

        assert_eq!(read_request(&mut reader, 1024).unwrap(), raw);
    }

    #[test]
    fn test_read_request_without_body_stops_at_headers() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        let mut reader = Cursor::new(raw.to_vec());
        assert_eq!(read_request(&mut reader, 1024).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_read_request_empty_stream() {
        let mut reader = Cursor::new(Vec::new());
        assert!(read_request(&mut reader, 1024).is_none());
    }

    #[test]
    fn test_read_request_truncates_at_limit() {
        let mut raw = b"POST / HTTP/1.1\r\nContent-Length: 5000\r\n\r\n".to_vec();
        raw.extend(std::iter::repeat(b'a').take(5000));
        let mut reader = Cursor::new(raw);

        assert_eq!(read_request(&mut reader, 1024).unwrap().len(), 1024);
    }

    #[test]
    fn test_content_length_header_lookup() {
        assert_eq!(content_length(b"POST / HTTP/1.1\r\ncontent-length:  42 \r\n"), Some(42));
        assert_eq!(content_length(b"GET / HTTP/1.1\r\nHost: x"), None);
        assert_eq!(content_length(b"GET / HTTP/1.1\r\nContent-Length: abc"), None);
    }

    #[test]
    fn test_options_short_circuit() {
        let (log, sink) = memory_log();
        let request = Request::parse(b"OPTIONS /anything HTTP/1.1\r\n\r\n");

        let response = respond(&request, &table(), &log);

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_not_found() {
        let (log, sink) = memory_log();
        let request = Request::parse(b"GET /nope HTTP/1.1\r\n\r\n");

        let response = respond(&request, &table(), &log);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), br#"{"status":"fail","message":"Resource not found"}"#);
        let lines = sink.0.lock().unwrap();
        assert!(lines[0].contains("Code 404"));
    }

    #[test]
    fn test_handler_error_becomes_500() {
        let (log, _) = memory_log();
        let request = Request::parse(b"GET /fail HTTP/1.1\r\n\r\n");

        let response = respond(&request, &table(), &log);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body(), br#"{"status":"fail","message":"database unavailable"}"#);
    }

    #[test]
    fn test_handler_panic_becomes_500() {
        let (log, sink) = memory_log();
        let request = Request::parse(b"GET /panic HTTP/1.1\r\n\r\n");

        let response = respond(&request, &table(), &log);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8_lossy(response.body()).to_string();
        assert!(text.contains("handler exploded"));
        assert!(sink.0.lock().unwrap()[0].contains("Code 500"));
    }

    #[test]
    fn test_successful_dispatch() {
        let (log, _) = memory_log();
        let request = Request::parse(b"GET /ok HTTP/1.1\r\n\r\n");

        let response = respond(&request, &table(), &log);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), br#"{"status":"ok","message":"Success"}"#);
    }
}
