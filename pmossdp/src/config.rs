//! Réglages du moteur SSDP.
//!
//! Les réglages sont passés explicitement au contrôleur : plusieurs instances
//! indépendantes peuvent cohabiter (tests, multi-serveurs).

use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_ADVERTISEMENT_EXPIRATION_TIME, MIN_ADVERTISEMENT_INTERVAL, SSDP_PORT,
};

/// Réglages SSDP, lus depuis `host.ssdp` dans la configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsdpSettings {
    /// Activer UPnP sur les adresses IPv4
    pub use_ipv4: bool,

    /// Activer UPnP sur les adresses IPv6
    pub use_ipv6: bool,

    /// Durée de validité des annonces (secondes, `CACHE-CONTROL: max-age`)
    pub advertisement_expiration_time: u32,

    /// Intervalle minimal entre deux ré-annonces (secondes)
    pub min_advertisement_interval: u32,

    /// TTL des datagrammes multicast IPv4
    pub ttl_v4: u32,

    /// Hop limit des datagrammes multicast IPv6
    pub hop_limit_v6: u32,

    pub product_name: String,
    pub product_version: String,

    /// Accepter les en-têtes USER-AGENT non conformes
    pub lax_user_agent_parsing: bool,

    /// Utiliser FF05::C même sur des adresses IPv6 globales
    pub site_local_operation: bool,

    /// Port du serveur HTTP de description (pour LOCATION)
    pub http_port: u16,

    /// Adresses IP à utiliser ; vide = toutes
    pub address_filters: Vec<String>,

    /// Nombre d'envois de chaque NOTIFY multicast
    pub notify_repeat: u32,

    /// Attente maximale du verrou par le timer d'annonce (ms)
    pub timer_lock_timeout_ms: u64,

    pub multicast_port: u16,

    /// Port de recherche unicast préféré
    pub search_port: u16,

    /// Période de vérification des interfaces réseau (secondes, daemon)
    pub interface_check_interval_secs: u64,
}

impl Default for SsdpSettings {
    fn default() -> Self {
        Self {
            use_ipv4: true,
            use_ipv6: true,
            advertisement_expiration_time: DEFAULT_ADVERTISEMENT_EXPIRATION_TIME,
            min_advertisement_interval: MIN_ADVERTISEMENT_INTERVAL,
            ttl_v4: 2,
            hop_limit_v6: 2,
            product_name: "PMOSsdp".to_string(),
            product_version: env!("CARGO_PKG_VERSION").to_string(),
            lax_user_agent_parsing: true,
            site_local_operation: false,
            http_port: 8080,
            address_filters: Vec::new(),
            notify_repeat: 2,
            timer_lock_timeout_ms: 5000,
            multicast_port: SSDP_PORT,
            search_port: SSDP_PORT,
            interface_check_interval_secs: 30,
        }
    }
}

impl SsdpSettings {
    /// Valeur de l'en-tête `SERVER` : `<os>/<version> UPnP/1.1 <product>/<version>`.
    pub fn server_header(&self) -> String {
        format!(
            "{} UPnP/1.1 {}/{}",
            pmoutils::get_os_string(),
            self.product_name,
            self.product_version
        )
    }
}
