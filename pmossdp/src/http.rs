//! Mise en forme des messages SSDP (HTTPU).
//!
//! SSDP réutilise la syntaxe HTTP/1.1 sur UDP : une ligne de début, des
//! en-têtes `NOM: valeur` terminés par CRLF, puis une ligne vide. Il n'y a
//! jamais de corps.

use std::collections::HashMap;

use crate::errors::SsdpError;

/// Requête HTTPU entrante (M-SEARCH, NOTIFY...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleHttpRequest {
    /// Méthode (ex: `M-SEARCH`)
    pub method: String,

    /// Cible de la requête (ex: `*`)
    pub param: String,

    /// Version HTTP (ex: `HTTP/1.1`)
    pub http_version: String,

    // Clés en majuscules
    headers: HashMap<String, String>,
}

impl SimpleHttpRequest {
    /// Analyse un datagramme reçu.
    ///
    /// Le bloc d'en-têtes se termine à la première ligne vide ; les noms
    /// d'en-têtes sont insensibles à la casse.
    pub fn parse(data: &[u8]) -> Result<Self, SsdpError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| SsdpError::MalformedRequest("request is not valid UTF-8".to_string()))?;

        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let request_line = lines
            .next()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| SsdpError::MalformedRequest("empty request".to_string()))?;

        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(param), Some(http_version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SsdpError::MalformedRequest(format!(
                "invalid request line '{}'",
                request_line
            )));
        };
        if !http_version.starts_with("HTTP/1.") {
            return Err(SsdpError::MalformedRequest(format!(
                "unsupported protocol '{}'",
                http_version
            )));
        }

        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                SsdpError::MalformedRequest(format!("invalid header line '{}'", line))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(SsdpError::MalformedRequest(format!(
                    "empty header name in '{}'",
                    line
                )));
            }
            headers.insert(name.to_ascii_uppercase(), value.trim().to_string());
        }

        Ok(Self {
            method: method.to_string(),
            param: param.to_string(),
            http_version: http_version.to_string(),
            headers,
        })
    }

    /// Retourne la valeur d'un en-tête (nom insensible à la casse).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }
}

/// Message SSDP sortant avec des en-têtes ordonnés.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpMessage {
    start_line: String,
    headers: Vec<(String, String)>,
}

impl SsdpMessage {
    /// Message `NOTIFY * HTTP/1.1` (annonces multicast).
    pub fn notify() -> Self {
        Self {
            start_line: "NOTIFY * HTTP/1.1".to_string(),
            headers: Vec::new(),
        }
    }

    /// Réponse `HTTP/1.1 200 OK` (réponse à un M-SEARCH).
    pub fn ok_response() -> Self {
        Self {
            start_line: "HTTP/1.1 200 OK".to_string(),
            headers: Vec::new(),
        }
    }

    /// Ajoute un en-tête ; l'ordre d'ajout est conservé.
    pub fn header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn start_line(&self) -> &str {
        &self.start_line
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Sérialise le message (CRLF, ligne vide finale).
    pub fn to_wire(&self) -> String {
        let mut out = String::with_capacity(256);
        out.push_str(&self.start_line);
        out.push_str("\r\n");
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push(':');
            if !value.is_empty() {
                out.push(' ');
                out.push_str(value);
            }
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}
