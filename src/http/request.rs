//! # Parsing de Requests HTTP/1.1
//! src/http/request.rs
//!
//! Parser HTTP/1.1 desde cero, sin librerías de parsing.
//!
//! ## Formato de un Request
//!
//! ```text
//! POST /users?active=1 HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! Content-Type: application/json\r\n
//! \r\n
//! {"name":"Alice"}
//! ```
//!
//! ## Componentes
//!
//! 1. **Request Line**: `METHOD /path?query VERSION`
//! 2. **Headers**: Pares `Name: Value` (uno por línea)
//! 3. **Empty Line**: separa headers del body (`\r\n\r\n` o `\n\n`)
//! 4. **Body**: los bytes restantes, sin modificar
//!
//! El parser nunca falla: una request line malformada o un header sin `:`
//! dejan los campos afectados con su valor por defecto (vacío).

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use super::body::{self, ParsedBody};
use super::url::parse_pairs;

/// Métodos HTTP
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    OPTIONS,
    HEAD,
    PATCH,
    /// Cualquier otro token (vacío si la request line no traía método)
    Other(String),
}

impl Method {
    /// Parsea un método HTTP (sensible a mayúsculas, como el protocolo)
    ///
    /// # Ejemplo
    /// ```
    /// use cbsf_server::http::Method;
    ///
    /// assert_eq!(Method::parse("DELETE"), Method::DELETE);
    /// assert_eq!(Method::parse("get"), Method::Other("get".to_string()));
    /// ```
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "OPTIONS" => Method::OPTIONS,
            "HEAD" => Method::HEAD,
            "PATCH" => Method::PATCH,
            other => Method::Other(other.to_string()),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
            Method::HEAD => "HEAD",
            Method::PATCH => "PATCH",
            Method::Other(s) => s,
        }
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::Other(String::new())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Un request HTTP parseado
///
/// Es de solo lectura para los handlers; cada conexión crea el suyo y lo
/// descarta al terminar.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Método HTTP
    method: Method,

    /// Path sin query string (nunca contiene `?`)
    path: String,

    /// Query parameters decodificados
    query_params: HashMap<String, String>,

    /// Headers tal como llegaron (buscar con [`Request::header`])
    headers: HashMap<String, String>,

    /// Versión HTTP de la request line
    version: String,

    /// Bytes crudos después de la línea vacía
    body: Vec<u8>,

    /// Vista plana del body según el Content-Type
    body_params: HashMap<String, String>,

    /// Body JSON parseado, si lo había
    json_body: Option<Value>,
}

impl Request {
    /// Parsea un request desde los bytes leídos del socket
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use cbsf_server::http::{Method, Request};
    ///
    /// let raw = b"GET /search?q=hello%20world HTTP/1.1\r\nHost: x\r\n\r\n";
    /// let request = Request::parse(raw);
    ///
    /// assert_eq!(request.method(), &Method::GET);
    /// assert_eq!(request.path(), "/search");
    /// assert_eq!(request.query_param("q"), "hello world");
    /// ```
    pub fn parse(buffer: &[u8]) -> Self {
        let (head, body) = match find_header_end(buffer) {
            Some((head_end, body_start)) => (&buffer[..head_end], &buffer[body_start..]),
            None => (buffer, &buffer[buffer.len()..]),
        };

        let head = String::from_utf8_lossy(head);
        let mut lines = head.split('\n').map(|l| l.trim_end_matches('\r'));

        // 1. Request line
        let mut request = Request::default();
        if let Some(line) = lines.next() {
            request.parse_request_line(line);
        }

        // 2. Headers
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            // Header sin ':' se ignora
            if let Some((name, value)) = line.split_once(':') {
                request.headers.insert(
                    name.trim().to_string(),
                    value.trim().to_string(),
                );
            }
        }

        // 3. Body
        request.body = body.to_vec();
        let ParsedBody { params, json } = body::parse_body(&request.body, request.header("Content-Type"));
        request.body_params = params;
        request.json_body = json;

        request
    }

    /// Parsea `METHOD TARGET VERSION`; las partes ausentes quedan vacías
    fn parse_request_line(&mut self, line: &str) {
        let mut parts = line.split_whitespace();

        if let Some(method) = parts.next() {
            self.method = Method::parse(method);
        }

        if let Some(target) = parts.next() {
            let (path, query_params) = parse_path_and_query(target);
            self.path = path;
            self.query_params = query_params;
        }

        if let Some(version) = parts.next() {
            self.version = version.to_string();
        }
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método HTTP del request
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Obtiene el path del request (sin query string)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Obtiene todos los query parameters
    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Obtiene un query parameter, o `""` si no existe
    ///
    /// # Ejemplo
    /// ```
    /// use cbsf_server::http::Request;
    ///
    /// let request = Request::parse(b"GET /test?num=42 HTTP/1.1\r\n\r\n");
    ///
    /// assert_eq!(request.query_param("num"), "42");
    /// assert_eq!(request.query_param("missing"), "");
    /// ```
    pub fn query_param(&self, name: &str) -> &str {
        self.query_param_opt(name).unwrap_or("")
    }

    /// Obtiene un query parameter si existe
    pub fn query_param_opt(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    /// Obtiene todos los headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Busca un header sin distinguir mayúsculas
    ///
    /// # Ejemplo
    /// ```
    /// use cbsf_server::http::Request;
    ///
    /// let request = Request::parse(b"GET / HTTP/1.1\r\ncontent-type: text/plain\r\n\r\n");
    /// assert_eq!(request.header("Content-Type"), Some("text/plain"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value.as_str());
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Obtiene la versión HTTP
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Obtiene el body crudo
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Obtiene el body como texto (lossy)
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Vista plana del body
    pub fn body_params(&self) -> &HashMap<String, String> {
        &self.body_params
    }

    /// Obtiene un parámetro del body, o `""` si no existe
    pub fn body_param(&self, name: &str) -> &str {
        self.body_params.get(name).map(|s| s.as_str()).unwrap_or("")
    }

    /// Indica si el body se parseó como JSON
    pub fn is_json(&self) -> bool {
        self.json_body.is_some()
    }

    /// Body JSON parseado
    pub fn json_body(&self) -> Option<&Value> {
        self.json_body.as_ref()
    }

    /// Valor de primer nivel de un body JSON objeto, como texto
    ///
    /// Solo strings, números y booleanos; cualquier otro caso da `""`.
    pub fn json_param(&self, key: &str) -> String {
        match self.json_body.as_ref().and_then(|v| v.get(key)) {
            Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => {
                body::scalar_to_string(v)
            }
            _ => String::new(),
        }
    }
}

impl fmt::Display for Request {
    /// Volcado multi-línea para depuración
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Method: {}", self.method)?;
        writeln!(f, "Path: {}", self.path)?;
        writeln!(f, "Query Parameters:")?;
        for (key, value) in &self.query_params {
            writeln!(f, "  {} = {}", key, value)?;
        }
        writeln!(f, "Headers:")?;
        for (key, value) in &self.headers {
            writeln!(f, "  {}: {}", key, value)?;
        }
        writeln!(f, "Body: {}", self.body_str())?;
        match &self.json_body {
            Some(json) => writeln!(f, "Parsed JSON Body: {}", json),
            None => {
                writeln!(f, "Body Parameters (key-value):")?;
                for (key, value) in &self.body_params {
                    writeln!(f, "  {} = {}", key, value)?;
                }
                Ok(())
            }
        }
    }
}

/// Separa el path de la query string
///
/// Ejemplo: "/users?id=10&fast=true"
/// Retorna: ("/users", {"id": "10", "fast": "true"})
fn parse_path_and_query(target: &str) -> (String, HashMap<String, String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_pairs(query)),
        None => (target.to_string(), HashMap::new()),
    }
}

/// Busca la línea vacía que termina los headers
///
/// Retorna `(fin_de_headers, inicio_del_body)`. Acepta `\r\n\r\n` y `\n\n`.
pub(crate) fn find_header_end(buffer: &[u8]) -> Option<(usize, usize)> {
    for (i, &byte) in buffer.iter().enumerate() {
        if byte != b'\n' {
            continue;
        }
        match &buffer[i + 1..] {
            [b'\n', ..] => return Some((i, i + 2)),
            [b'\r', b'\n', ..] => return Some((i, i + 3)),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::body::INVALID_JSON_KEY;

    #[test]
    fn test_parse_simple_get() {
        let request = Request::parse(b"GET / HTTP/1.1\r\n\r\n");

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "/");
        assert_eq!(request.version(), "HTTP/1.1");
        assert!(request.query_params().is_empty());
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_parse_with_query_params() {
        let request = Request::parse(b"GET /?name=Alice%20B&x=1+2 HTTP/1.1\r\nHost: x\r\n\r\n");

        assert_eq!(request.path(), "/");
        assert_eq!(request.query_param("name"), "Alice B");
        assert_eq!(request.query_param("x"), "1 2");
    }

    #[test]
    fn test_path_never_contains_question_mark() {
        let request = Request::parse(b"GET /a?b?c=d HTTP/1.1\r\n\r\n");
        assert_eq!(request.path(), "/a");
        assert_eq!(request.query_param("b?c"), "d");
    }

    #[test]
    fn test_parse_headers_trimmed() {
        let raw = b"GET / HTTP/1.1\r\nHost:   localhost:8080  \r\nX-Token:abc\r\n\r\n";
        let request = Request::parse(raw);

        assert_eq!(request.header("Host"), Some("localhost:8080"));
        assert_eq!(request.header("x-token"), Some("abc"));
        assert_eq!(request.header("Missing"), None);
    }

    #[test]
    fn test_header_without_colon_is_ignored() {
        let raw = b"GET / HTTP/1.1\r\nGarbage line\r\nHost: x\r\n\r\n";
        let request = Request::parse(raw);

        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.header("Host"), Some("x"));
    }

    #[test]
    fn test_lf_only_line_endings() {
        let raw = b"POST /echo HTTP/1.1\nContent-Type: text/plain\n\nline1\nline2";
        let request = Request::parse(raw);

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.header("Content-Type"), Some("text/plain"));
        assert_eq!(request.body(), b"line1\nline2");
    }

    #[test]
    fn test_body_bytes_preserved() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Type: text/plain\r\n\r\na\r\n\r\nb\r\n";
        let request = Request::parse(raw);
        assert_eq!(request.body(), b"a\r\n\r\nb\r\n");
    }

    #[test]
    fn test_json_body_flattened() {
        let raw = b"POST /data HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"a\":{\"b\":1},\"name\":\"Ana\"}";
        let request = Request::parse(raw);

        assert!(request.is_json());
        assert_eq!(request.body_param("a.b"), "1");
        assert_eq!(request.json_param("name"), "Ana");
        assert_eq!(request.json_param("a"), "");
    }

    #[test]
    fn test_invalid_json_body() {
        let raw = b"POST /data HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{oops";
        let request = Request::parse(raw);

        assert!(!request.is_json());
        assert_eq!(request.body_param(INVALID_JSON_KEY), "{oops");
    }

    #[test]
    fn test_empty_request() {
        let request = Request::parse(b"");

        assert_eq!(request.method(), &Method::default());
        assert_eq!(request.path(), "");
        assert!(request.headers().is_empty());
    }

    #[test]
    fn test_malformed_request_line() {
        let request = Request::parse(b"GET\r\n\r\n");

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "");
        assert_eq!(request.version(), "");
    }

    #[test]
    fn test_binary_garbage_does_not_panic() {
        let request = Request::parse(b"\x00\x01\x02\xff\xfe garbage");
        assert_eq!(request.path(), "garbage");
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"A\r\n\r\nbody"), Some((2, 5)));
        assert_eq!(find_header_end(b"A\n\nbody"), Some((1, 3)));
        assert_eq!(find_header_end(b"A\r\nB: c\r\n"), None);
    }

    #[test]
    fn test_display_dump() {
        let request = Request::parse(b"GET /x?a=1 HTTP/1.1\r\nHost: h\r\n\r\n");
        let dump = request.to_string();
        assert!(dump.contains("Method: GET"));
        assert!(dump.contains("  a = 1"));
        assert!(dump.contains("  Host: h"));
    }
}
