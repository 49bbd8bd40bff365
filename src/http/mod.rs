//! # Módulo HTTP
//!
//! Implementa el modelo de mensajes HTTP/1.1 desde cero, sin librerías de
//! parsing:
//!
//! - Parsing de requests (request line, headers, body)
//! - Parsing del body según `Content-Type`
//! - Construcción y serialización de responses
//! - Códigos de estado
//!
//! ## Alcance
//!
//! - Un request por conexión, sin keep-alive
//! - Sin chunked transfer encoding
//! - Solo `http://` (sin TLS)

pub mod body;      // Estrategias de parsing del body
pub mod request;   // Parsing de HTTP requests
pub mod response;  // Construcción de HTTP responses
pub mod status;    // Códigos de estado HTTP
pub mod url;       // Decodificación de URLs

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{Method, Request};
pub use response::Response;
pub use status::StatusCode;
