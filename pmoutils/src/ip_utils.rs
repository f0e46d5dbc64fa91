//! Énumération des adresses locales utilisables par UPnP.
//!
//! Les adresses de loopback des interfaces sont écartées, puis seule la
//! loopback IPv4 est rajoutée. `::1` n'est jamais annoncée : les control
//! points locaux passent par `127.0.0.1`, et un endpoint IPv6 sur loopback
//! n'aurait aucun groupe multicast SSDP joignable.

use get_if_addrs::get_if_addrs;
use std::net::{IpAddr, Ipv4Addr};
use tracing::warn;

/// Adresse locale d'une interface réseau sur laquelle UPnP peut être activé.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceAddress {
    /// Nom de l'interface (ex: `"eth0"`, `"lo"`)
    pub name: String,

    /// Adresse IP de l'interface
    pub ip: IpAddr,

    /// Index système de l'interface, `0` s'il est inconnu.
    ///
    /// Nécessaire pour rejoindre les groupes multicast IPv6.
    pub index: u32,
}

impl InterfaceAddress {
    /// Construit l'adresse de loopback IPv4, toujours ajoutée à la liste UPnP.
    pub fn loopback_v4() -> Self {
        Self {
            name: "lo".to_string(),
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            index: interface_index("lo"),
        }
    }
}

/// Liste les adresses locales sur lesquelles le système UPnP doit être actif.
///
/// Parcourt toutes les interfaces réseau, garde les familles d'adresses demandées
/// et écarte les adresses de loopback, puis applique `filters`.
/// L'adresse de loopback IPv4 est toujours ajoutée en fin de liste lorsque
/// IPv4 est activé, pour que les control points locaux trouvent nos devices.
/// Il n'y a pas d'équivalent IPv6 : `::1` n'est jamais retournée.
///
/// # Arguments
///
/// * `use_ipv4` - Inclure les adresses IPv4
/// * `use_ipv6` - Inclure les adresses IPv6
/// * `filters` - Adresses IP (texte) à conserver ; vide = toutes
///
/// Un filtre qui ne correspond à aucune adresse disponible est signalé par un
/// warning : c'est souvent le signe d'une adresse DHCP qui a changé.
pub fn list_upnp_addresses(
    use_ipv4: bool,
    use_ipv6: bool,
    filters: &[String],
) -> Vec<InterfaceAddress> {
    let mut result = Vec::new();

    match get_if_addrs() {
        Ok(interfaces) => {
            for iface in interfaces {
                let ip = iface.ip();
                if ip.is_loopback() {
                    continue;
                }
                if (ip.is_ipv4() && !use_ipv4) || (ip.is_ipv6() && !use_ipv6) {
                    continue;
                }
                let index = interface_index(&iface.name);
                result.push(InterfaceAddress {
                    name: iface.name,
                    ip,
                    index,
                });
            }
        }
        Err(e) => warn!("❌ Failed to list network interfaces: {}", e),
    }

    let mut result = filter_addresses(result, filters);

    if use_ipv4 && !result.iter().any(|a| a.ip == IpAddr::V4(Ipv4Addr::LOCALHOST)) {
        result.push(InterfaceAddress::loopback_v4());
    }

    result
}

/// Ne garde que les adresses présentes dans `filters` (comparaison insensible à la casse).
fn filter_addresses(available: Vec<InterfaceAddress>, filters: &[String]) -> Vec<InterfaceAddress> {
    if filters.is_empty() {
        return available;
    }

    for filter in filters {
        let Ok(ip) = filter.parse::<IpAddr>() else {
            warn!("Ignoring invalid IP address filter '{}'", filter);
            continue;
        };
        if !ip.is_loopback() && !available.iter().any(|a| a.ip == ip) {
            warn!(
                "The IP address filter contains '{}' which is not available, check your IP configuration",
                ip
            );
        }
    }

    available
        .into_iter()
        .filter(|a| {
            let ip = a.ip.to_string();
            filters.iter().any(|f| f.eq_ignore_ascii_case(&ip))
        })
        .collect()
}

#[cfg(unix)]
fn interface_index(name: &str) -> u32 {
    match std::ffi::CString::new(name) {
        // SAFETY: `c_name` est une chaîne C valide terminée par NUL pendant l'appel.
        Ok(c_name) => unsafe { libc::if_nametoindex(c_name.as_ptr()) },
        Err(_) => 0,
    }
}

#[cfg(not(unix))]
fn interface_index(_name: &str) -> u32 {
    0
}
