//! Utilitaires système et réseau partagés par les crates PMOSsdp.
//!
//! # Fonctions principales
//!
//! - [`list_upnp_addresses`] : liste les adresses locales sur lesquelles UPnP doit être actif
//! - [`get_os_string`] : chaîne `OS/version` utilisée dans l'en-tête `SERVER`
//! - [`find_udp_port_holder`] : identifie le processus qui occupe un port UDP
//!
//! # Examples
//!
//! ```no_run
//! use pmoutils::list_upnp_addresses;
//!
//! for iface in list_upnp_addresses(true, false, &[]) {
//!     println!("{} ({}) index={}", iface.ip, iface.name, iface.index);
//! }
//! ```
mod ip_utils;
mod process;

pub use ip_utils::{InterfaceAddress, list_upnp_addresses};
pub use process::{PortHolder, find_udp_port_holder};

/// Retourne une chaîne décrivant le système d'exploitation et sa version.
///
/// Utilise la crate `os_info` pour obtenir de manière portable et fiable
/// les informations sur le système d'exploitation courant.
///
/// # Format
/// - macOS: "macOS/15.1" ou "Mac OS/10.15.7"
/// - Linux: "Linux/6.5.0" ou "Ubuntu/22.04"
/// - Windows: "Windows/10.0.19045"
/// - Autre: "{OS}/Unknown"
///
/// Les espaces sont remplacés par des `_` : l'en-tête `SERVER` d'SSDP
/// sépare ses trois jetons par des espaces.
///
/// # Exemples
///
/// ```
/// use pmoutils::get_os_string;
///
/// let os = get_os_string();
/// assert!(os.contains('/'));
/// ```
pub fn get_os_string() -> String {
    let info = os_info::get();
    let os_type = format!("{:?}", info.os_type()).replace(' ', "_");

    // Obtenir la version si disponible
    let version = info.version();
    if version != &os_info::Version::Unknown {
        format!("{}/{}", os_type, version.to_string().replace(' ', "_"))
    } else {
        format!("{}/Unknown", os_type)
    }
}
