//! Erreurs du moteur SSDP.

use std::net::SocketAddr;

use thiserror::Error;

/// Erreurs liées au traitement SSDP.
#[derive(Error, Debug)]
pub enum SsdpError {
    /// Requête mal formée (ligne de requête, en-têtes, MAN, MX, ST...)
    #[error("Malformed SSDP request: {0}")]
    MalformedRequest(String),

    /// Version UPnP annoncée dans USER-AGENT non supportée
    #[error("Unsupported UPnP version: {0}")]
    UnsupportedVersion(String),

    /// Le contrôleur est déjà démarré
    #[error("SSDP controller is already active")]
    AlreadyActive,

    /// Échec de liaison d'une socket
    #[error("Failed to bind SSDP socket on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Erreur d'entrée/sortie réseau
    #[error("SSDP I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Erreurs liées aux devices annoncés.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeviceError {
    /// Version invalide
    #[error("Device or service version must be > 0")]
    InvalidVersion,

    /// URN de type mal formée
    #[error("Invalid type URN '{0}'")]
    InvalidType(String),
}
