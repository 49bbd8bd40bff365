//! # Decodificación de URLs
//! src/http/url.rs
//!
//! Reglas compartidas por el query string y los cuerpos
//! `application/x-www-form-urlencoded`:
//!
//! - `+` se convierte en espacio
//! - `%XX` (hex válido) se convierte en el byte correspondiente
//! - todo lo demás se copia tal cual, incluido un `%` sin dos dígitos hex

use std::collections::HashMap;

/// Decodifica una cadena URL-encoded
///
/// Los bytes decodificados que no formen UTF-8 válido se reemplazan con
/// U+FFFD.
///
/// # Ejemplo
/// ```
/// use cbsf_server::http::url::url_decode;
///
/// assert_eq!(url_decode("hello%20world"), "hello world");
/// assert_eq!(url_decode("a+b"), "a b");
/// assert_eq!(url_decode("100%"), "100%");
/// ```
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                match (hex_value(bytes.get(i + 1)), hex_value(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: Option<&u8>) -> Option<u8> {
    match byte? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parsea pares `k1=v1&k2=v2` decodificando claves y valores
///
/// Un par sin `=` se guarda con valor vacío; los segmentos vacíos se
/// ignoran. Si una clave se repite, gana la última.
///
/// # Ejemplo
/// ```
/// use cbsf_server::http::url::parse_pairs;
///
/// let params = parse_pairs("q=hello%20world&debug");
/// assert_eq!(params["q"], "hello world");
/// assert_eq!(params["debug"], "");
/// ```
pub fn parse_pairs(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for pair in input.split('&') {
        if pair.is_empty() {
            continue;
        }

        match pair.find('=') {
            Some(eq_pos) => {
                let key = url_decode(&pair[..eq_pos]);
                let value = url_decode(&pair[eq_pos + 1..]);
                params.insert(key, value);
            }
            None => {
                params.insert(url_decode(pair), String::new());
            }
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_percent_and_plus() {
        assert_eq!(url_decode("Alice%20B"), "Alice B");
        assert_eq!(url_decode("a+b+c"), "a b c");
        assert_eq!(url_decode("%41%62c"), "Abc");
    }

    #[test]
    fn test_decode_utf8_sequence() {
        assert_eq!(url_decode("caf%C3%A9"), "café");
    }

    #[test]
    fn test_decode_invalid_escape_is_verbatim() {
        assert_eq!(url_decode("50%"), "50%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%4"), "%4");
    }

    #[test]
    fn test_parse_pairs() {
        let params = parse_pairs("k1=v1&k2=hello%20world&&k3=");
        assert_eq!(params.len(), 3);
        assert_eq!(params["k1"], "v1");
        assert_eq!(params["k2"], "hello world");
        assert_eq!(params["k3"], "");
    }

    #[test]
    fn test_parse_pairs_value_with_equals() {
        let params = parse_pairs("token=a=b");
        assert_eq!(params["token"], "a=b");
    }

    #[test]
    fn test_decode_recovers_plaintext() {
        let cases = [
            ("hello%20world", "hello world"),
            ("a%26b%3Dc", "a&b=c"),
            ("%2Fpath%2Fto", "/path/to"),
            ("plain", "plain"),
        ];
        for (encoded, plain) in cases {
            let params = parse_pairs(&format!("v={}", encoded));
            assert_eq!(params["v"], plain, "decoding {}", encoded);
        }
    }
}
