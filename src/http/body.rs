//! # Parsing del Body
//! src/http/body.rs
//!
//! Convierte el body crudo de un request en un mapa plano de parámetros,
//! eligiendo la estrategia según el `Content-Type`:
//!
//! | Content-Type                        | Estrategia                          |
//! |-------------------------------------|-------------------------------------|
//! | `application/x-www-form-urlencoded` | pares `k=v&...` decodificados       |
//! | `application/json`                  | JSON aplanado con claves `a.b.c`    |
//! | `multipart/form-data`               | `name` de cada parte → contenido    |
//! | `text/plain`                        | body completo en `_raw_text`        |
//! | (ausente)                           | detección automática                |
//! | otro                                | body completo en `_raw_data`        |
//!
//! Ningún error escapa de este módulo: un JSON inválido termina en la
//! clave `_invalid_json`.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::url::parse_pairs;

/// Texto plano (o body no reconocido en la detección automática)
pub const RAW_TEXT_KEY: &str = "_raw_text";

/// Body con un Content-Type desconocido
pub const RAW_DATA_KEY: &str = "_raw_data";

/// JSON cuyo valor raíz es un array
pub const JSON_ARRAY_KEY: &str = "_json_array";

/// JSON cuyo valor raíz es un escalar
pub const JSON_VALUE_KEY: &str = "_json_value";

/// Body declarado como JSON que no se pudo parsear
pub const INVALID_JSON_KEY: &str = "_invalid_json";

/// Tipo de contenido normalizado
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    FormUrlEncoded,
    Json,
    Multipart,
    PlainText,
    /// Sin `Content-Type`
    Missing,
    /// Cualquier otro tipo (ya normalizado)
    Other(String),
}

impl ContentKind {
    /// Normaliza el valor de un header `Content-Type`
    ///
    /// Pasa a minúsculas, descarta los parámetros tras `;` (charset,
    /// boundary...) y elimina espacios.
    ///
    /// # Ejemplo
    /// ```
    /// use cbsf_server::http::body::ContentKind;
    ///
    /// let kind = ContentKind::from_header(Some("Application/JSON; charset=UTF-8"));
    /// assert_eq!(kind, ContentKind::Json);
    /// ```
    pub fn from_header(value: Option<&str>) -> Self {
        let value = match value {
            Some(v) => v,
            None => return ContentKind::Missing,
        };

        let media_type = value.split(';').next().unwrap_or("");
        let media_type: String = media_type
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        match media_type.as_str() {
            "" => ContentKind::Missing,
            "application/x-www-form-urlencoded" => ContentKind::FormUrlEncoded,
            "application/json" => ContentKind::Json,
            "multipart/form-data" => ContentKind::Multipart,
            "text/plain" => ContentKind::PlainText,
            _ => ContentKind::Other(media_type),
        }
    }
}

/// Resultado de parsear un body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBody {
    /// Vista plana clave → valor
    pub params: HashMap<String, String>,

    /// Valor JSON completo si el body era JSON válido
    pub json: Option<Value>,
}

/// Parsea el body según el `Content-Type` recibido
///
/// `content_type` es el valor crudo del header (se necesita completo para
/// extraer el `boundary` de multipart).
pub fn parse_body(body: &[u8], content_type: Option<&str>) -> ParsedBody {
    let mut parsed = ParsedBody::default();

    if body.is_empty() {
        return parsed;
    }

    let text = String::from_utf8_lossy(body);

    match ContentKind::from_header(content_type) {
        ContentKind::FormUrlEncoded => {
            parsed.params = parse_pairs(&text);
        }
        ContentKind::Json => {
            parse_json(&text, &mut parsed);
        }
        ContentKind::Multipart => {
            let boundary = content_type.and_then(extract_boundary);
            match boundary {
                Some(boundary) => parsed.params = parse_multipart(&text, &boundary),
                None => warn!("multipart/form-data sin boundary, body ignorado"),
            }
        }
        ContentKind::PlainText => {
            parsed.params.insert(RAW_TEXT_KEY.to_string(), text.into_owned());
        }
        ContentKind::Missing => {
            auto_detect(&text, &mut parsed);
        }
        ContentKind::Other(kind) => {
            debug!("Content-Type desconocido: {}", kind);
            parsed.params.insert(RAW_DATA_KEY.to_string(), text.into_owned());
        }
    }

    parsed
}

/// Parsea un body JSON y lo aplana en `params`
fn parse_json(text: &str, parsed: &mut ParsedBody) {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            match &value {
                Value::Object(_) => flatten_json(&value, "", &mut parsed.params),
                Value::Array(_) => {
                    parsed.params.insert(JSON_ARRAY_KEY.to_string(), value.to_string());
                }
                scalar => {
                    parsed.params.insert(JSON_VALUE_KEY.to_string(), scalar_to_string(scalar));
                }
            }
            parsed.json = Some(value);
        }
        Err(e) => {
            debug!("JSON inválido en el body: {}", e);
            parsed.params.insert(INVALID_JSON_KEY.to_string(), text.to_string());
        }
    }
}

/// Aplana un objeto JSON en claves con puntos
///
/// `{"a":{"b":1},"c":[1,2]}` produce `a.b = "1"` y `c = "[1,2]"`.
pub fn flatten_json(value: &Value, prefix: &str, out: &mut HashMap<String, String>) {
    if let Value::Object(map) = value {
        for (key, child) in map {
            let full_key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            match child {
                Value::Object(_) => flatten_json(child, &full_key, out),
                Value::Array(_) => {
                    out.insert(full_key, child.to_string());
                }
                scalar => {
                    out.insert(full_key, scalar_to_string(scalar));
                }
            }
        }
    }
}

/// Representación en texto de un valor JSON
///
/// Los strings van sin comillas y `null` queda vacío.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Detección automática cuando no hay `Content-Type`
fn auto_detect(text: &str, parsed: &mut ParsedBody) {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            flatten_json(&value, "", &mut parsed.params);
            parsed.json = Some(value);
            return;
        }
    } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            parsed.params.insert(JSON_ARRAY_KEY.to_string(), text.to_string());
            parsed.json = Some(value);
            return;
        }
    }

    if text.contains('=') && (text.contains('&') || text.contains('\n')) {
        parsed.params = parse_pairs(text);
        return;
    }

    parsed.params.insert(RAW_TEXT_KEY.to_string(), text.to_string());
}

/// Extrae el parámetro `boundary` de un Content-Type multipart
fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (name, value) = param.split_once('=')?;
            if name.trim().eq_ignore_ascii_case("boundary") {
                Some(value.trim().trim_matches('"').to_string())
            } else {
                None
            }
        })
        .filter(|b| !b.is_empty())
}

/// Parte un body multipart y mapea `name` → contenido
///
/// El contenido se trata como texto; los archivos no reciben un
/// tratamiento especial.
fn parse_multipart(text: &str, boundary: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let delimiter = format!("--{}", boundary);

    let mut rest = match text.find(&delimiter) {
        Some(pos) => &text[pos + delimiter.len()..],
        None => return params,
    };

    loop {
        // "--" justo después del delimitador marca el final
        if rest.starts_with("--") {
            break;
        }
        rest = skip_leading_break(rest);

        let next = match rest.find(&delimiter) {
            Some(pos) => pos,
            None => break,
        };

        let part = trim_trailing_break(&rest[..next]);

        if let Some((name, content)) = parse_multipart_part(part) {
            params.insert(name, content.to_string());
        }

        rest = &rest[next + delimiter.len()..];
    }

    params
}

fn skip_leading_break(s: &str) -> &str {
    if let Some(stripped) = s.strip_prefix("\r\n") {
        stripped
    } else if let Some(stripped) = s.strip_prefix('\n') {
        stripped
    } else {
        s
    }
}

fn trim_trailing_break(s: &str) -> &str {
    if let Some(stripped) = s.strip_suffix("\r\n") {
        stripped
    } else if let Some(stripped) = s.strip_suffix('\n') {
        stripped
    } else {
        s
    }
}

/// Separa headers y contenido de una parte y extrae su `name`
fn parse_multipart_part(part: &str) -> Option<(String, &str)> {
    let (headers, content) = match part.find("\r\n\r\n") {
        Some(pos) => (&part[..pos], &part[pos + 4..]),
        None => {
            let pos = part.find("\n\n")?;
            (&part[..pos], &part[pos + 2..])
        }
    };

    let disposition = headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-disposition") {
            Some(value)
        } else {
            None
        }
    })?;

    let name = disposition.split(';').map(str::trim).find_map(|param| {
        let value = param.strip_prefix("name=")?;
        Some(value.trim_matches('"').to_string())
    })?;

    if name.is_empty() {
        None
    } else {
        Some((name, content))
    }
}
