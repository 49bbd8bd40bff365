//! # Construcción de Respuestas HTTP
//!
//! Un handler recibe un `&mut Response` recién creado y lo modifica; luego
//! el worker lo serializa con [`Response::to_bytes`] y lo descarta.
//!
//! ## Formato en el cable
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Access-Control-Allow-Origin: *\r\n
//! Access-Control-Allow-Methods: GET, POST, PUT, DELETE, OPTIONS\r\n
//! Access-Control-Allow-Headers: Content-Type, Authorization, X-Requested-With\r\n
//! Access-Control-Max-Age: 86400\r\n
//! Content-Type: application/json; charset=utf-8\r\n
//! Content-Length: 15\r\n
//! \r\n
//! {"status":"ok"}
//! ```
//!
//! `Content-Length` siempre se calcula del body real: un valor puesto a
//! mano por el handler se ignora.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use cbsf_server::http::Response;
//!
//! let mut response = Response::new();
//! response.json(r#"{"message":"Hello"}"#);
//!
//! let bytes = response.to_bytes();
//! // Ahora se puede escribir `bytes` en el socket
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::StatusCode;

/// Content-Type por defecto de toda respuesta
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Headers CORS que acompañan a todas las respuestas
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization, X-Requested-With"),
    ("Access-Control-Max-Age", "86400"),
];

/// Cuerpo estándar `{"status":..., "message":...}`
#[derive(Debug, Serialize)]
struct StatusBody<'a> {
    status: &'a str,
    message: &'a str,
}

/// Respuesta HTTP en construcción
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Código de estado (200 por defecto)
    status: StatusCode,

    /// Headers puestos por el handler (ordenados para una salida estable)
    headers: BTreeMap<String, String>,

    /// Body crudo
    body: Vec<u8>,
}

impl Response {
    /// Respuesta vacía: 200 con `Content-Type` JSON
    pub fn new() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string());
        Self {
            status: StatusCode::OK,
            headers,
            body: Vec::new(),
        }
    }

    /// Fija el código de estado
    pub fn set_status(&mut self, code: impl Into<StatusCode>) {
        self.status = code.into();
    }

    /// Agrega o reemplaza un header
    ///
    /// Se eliminan `\r` y `\n` del nombre y del valor: un header nunca puede
    /// partirse en varias líneas en el cable.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(strip_line_breaks(name), strip_line_breaks(value));
    }

    /// Reemplaza el body sin tocar el Content-Type
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Body JSON (el texto se envía tal cual)
    pub fn json(&mut self, json: &str) {
        self.body = json.as_bytes().to_vec();
        self.set_header("Content-Type", DEFAULT_CONTENT_TYPE);
    }

    /// Body JSON a partir de un valor
    pub fn json_value(&mut self, value: &Value) {
        self.json(&value.to_string());
    }

    /// Body de texto plano
    pub fn text(&mut self, text: &str) {
        self.body = text.as_bytes().to_vec();
        self.set_header("Content-Type", "text/plain; charset=utf-8");
    }

    /// `{"status":"ok","message":"Success"}`
    pub fn success(&mut self) {
        self.json(&status_json("ok", "Success"));
    }

    /// Respuesta exitosa con campos extra
    ///
    /// `status` y `message` siempre quedan en `"ok"` / `"Success"`.
    ///
    /// # Ejemplo
    /// ```
    /// use cbsf_server::http::Response;
    /// use serde_json::{json, Map};
    ///
    /// let mut data = Map::new();
    /// data.insert("user".to_string(), json!({"id": 7}));
    ///
    /// let mut response = Response::new();
    /// response.success_with(data);
    ///
    /// let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    /// assert_eq!(body["status"], "ok");
    /// assert_eq!(body["user"]["id"], 7);
    /// ```
    pub fn success_with(&mut self, data: Map<String, Value>) {
        let mut result = data;
        result.insert("status".to_string(), Value::from("ok"));
        result.insert("message".to_string(), Value::from("Success"));
        self.json_value(&Value::Object(result));
    }

    /// Respuesta de error `{"status":"fail","message":...}`
    ///
    /// # Ejemplo
    /// ```
    /// use cbsf_server::http::{Response, StatusCode};
    ///
    /// let mut response = Response::new();
    /// response.error(400, "Invalid \"id\"");
    ///
    /// assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    /// assert_eq!(response.body(), br#"{"status":"fail","message":"Invalid \"id\""}"#);
    /// ```
    pub fn error(&mut self, code: impl Into<StatusCode>, message: &str) {
        self.status = code.into();
        self.json(&status_json("fail", message));
    }

    /// Convierte la respuesta a bytes listos para el socket
    ///
    /// Orden: status line, headers CORS, headers del handler,
    /// `Content-Length`, línea vacía, body.
    ///
    /// # Ejemplo
    /// ```
    /// use cbsf_server::http::Response;
    ///
    /// let mut response = Response::new();
    /// response.text("Hello");
    ///
    /// let text = String::from_utf8(response.to_bytes()).unwrap();
    /// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    /// assert!(text.ends_with("Content-Length: 5\r\n\r\nHello"));
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = String::with_capacity(256);

        // 1. Status line
        head.push_str(&format!(
            "HTTP/1.1 {} {}\r\n",
            self.status.as_u16(),
            self.status.reason_phrase()
        ));

        // 2. CORS
        for (name, value) in CORS_HEADERS {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }

        // 3. Headers del handler
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("Content-Length") {
                continue;
            }
            head.push_str(&format!("{}: {}\r\n", name, value));
        }

        // 4. Content-Length real y línea vacía
        head.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));

        let mut bytes = Vec::with_capacity(head.len() + self.body.len());
        bytes.extend_from_slice(head.as_bytes());
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Obtiene el código de estado
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Obtiene los headers puestos por el handler
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Obtiene un header sin distinguir mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Obtiene el body
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_line_breaks(text: &str) -> String {
    text.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Serializa `{"status":..,"message":..}` escapando el mensaje
fn status_json(status: &str, message: &str) -> String {
    serde_json::to_string(&StatusBody { status, message })
        .unwrap_or_else(|_| format!(r#"{{"status":"{}"}}"#, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Separa head y body de una respuesta serializada
    fn split_wire(bytes: &[u8]) -> (String, Vec<u8>) {
        let pos = bytes
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("header terminator");
        (
            String::from_utf8(bytes[..pos].to_vec()).unwrap(),
            bytes[pos + 4..].to_vec(),
        )
    }

    fn content_length(head: &str) -> usize {
        head.lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap()
    }

    #[test]
    fn test_new_response_defaults() {
        let response = Response::new();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header("content-type"), Some(DEFAULT_CONTENT_TYPE));
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_text_overrides_content_type() {
        let mut response = Response::new();
        response.text("hola");
        assert_eq!(response.header("Content-Type"), Some("text/plain; charset=utf-8"));
        assert_eq!(response.body(), b"hola");
    }

    #[test]
    fn test_success_bodies() {
        let mut response = Response::new();
        response.success();
        assert_eq!(response.body(), br#"{"status":"ok","message":"Success"}"#);

        let mut data = Map::new();
        data.insert("status".to_string(), Value::from("ignored"));
        data.insert("count".to_string(), Value::from(3));
        response.success_with(data);

        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "Success");
        assert_eq!(body["count"], 3);
    }

    #[test]
    fn test_error_response() {
        let mut response = Response::new();
        response.error(404, "Resource not found");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), br#"{"status":"fail","message":"Resource not found"}"#);
    }

    #[test]
    fn test_to_bytes_layout() {
        let mut response = Response::new();
        response.set_header("X-Custom", "value");
        response.json("{}");

        let (head, body) = split_wire(&response.to_bytes());
        let lines: Vec<&str> = head.split("\r\n").collect();

        assert_eq!(lines[0], "HTTP/1.1 200 OK");
        assert_eq!(lines[1], "Access-Control-Allow-Origin: *");
        assert_eq!(lines[2], "Access-Control-Allow-Methods: GET, POST, PUT, DELETE, OPTIONS");
        assert_eq!(lines[3], "Access-Control-Allow-Headers: Content-Type, Authorization, X-Requested-With");
        assert_eq!(lines[4], "Access-Control-Max-Age: 86400");
        assert!(lines.contains(&"X-Custom: value"));
        assert_eq!(*lines.last().unwrap(), "Content-Length: 2");
        assert_eq!(body, b"{}");
    }

    #[test]
    fn test_content_length_matches_body() {
        let bodies: [&[u8]; 4] = [b"", b"a", "ñandú €".as_bytes(), &[0u8, 1, 2, 255, 13, 10, 13, 10]];

        for body in bodies {
            let mut response = Response::new();
            response.set_body(body.to_vec());

            let (head, wire_body) = split_wire(&response.to_bytes());
            assert_eq!(content_length(&head), body.len());
            assert_eq!(wire_body, body);
        }
    }

    #[test]
    fn test_header_line_breaks_are_stripped() {
        let mut response = Response::new();
        response.set_header("X-Name", "a\r\nSet-Cookie: evil=1");
        response.set_header("X-Bad\r\nName", "v");

        assert_eq!(response.header("X-Name"), Some("aSet-Cookie: evil=1"));
        assert_eq!(response.header("X-BadName"), Some("v"));

        let (head, _) = split_wire(&response.to_bytes());
        assert!(head.split("\r\n").all(|line| !line.starts_with("Set-Cookie")));
        assert!(head.contains("\r\nX-Name: aSet-Cookie: evil=1\r\n"));
    }

    #[test]
    fn test_manual_content_length_ignored() {
        let mut response = Response::new();
        response.set_header("Content-Length", "999");
        response.text("abc");

        let (head, _) = split_wire(&response.to_bytes());
        assert_eq!(head.matches("Content-Length").count(), 1);
        assert_eq!(content_length(&head), 3);
    }

    #[test]
    fn test_unknown_status_reason() {
        let mut response = Response::new();
        response.set_status(299);

        let (head, _) = split_wire(&response.to_bytes());
        assert!(head.starts_with("HTTP/1.1 299 Unknown"));
    }
}
