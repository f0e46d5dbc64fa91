//! Endpoints SSDP et requêtes de recherche en attente.

use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use pmoutils::InterfaceAddress;
use tracing::{info, warn};

use crate::{
    RECEIVE_POLL_INTERVAL, SSDP_PORT,
    config::SsdpSettings,
    errors::SsdpError,
    network::{
        bind_and_configure_multicast_socket, bind_unicast_socket, host_for_url,
        leave_multicast_groups, ssdp_multicast_address_for_interface,
    },
};

/// État SSDP d'une adresse locale.
///
/// Un endpoint possède une socket unicast (toujours présente : elle sert à
/// l'envoi de tous les messages) et, si la liaison a réussi, une socket de
/// réception multicast.
#[derive(Debug)]
pub struct EndpointConfiguration {
    interface: InterfaceAddress,
    multicast_address: IpAddr,
    search_port: u16,
    multicast_socket: Option<Arc<UdpSocket>>,
    unicast_socket: Arc<UdpSocket>,
    config_id: u32,
    shutdown: Arc<AtomicBool>,
    receive_threads: Vec<JoinHandle<()>>,
}

impl EndpointConfiguration {
    /// Lie les sockets SSDP d'une interface.
    ///
    /// L'échec de la socket multicast est seulement journalisé ; l'échec de la
    /// socket unicast rend l'endpoint inutilisable et est retourné.
    pub fn bind(interface: &InterfaceAddress, settings: &SsdpSettings) -> Result<Self, SsdpError> {
        let multicast_address =
            ssdp_multicast_address_for_interface(interface.ip, settings.site_local_operation);

        let multicast_socket = match bind_and_configure_multicast_socket(
            interface,
            settings.multicast_port,
            RECEIVE_POLL_INTERVAL,
        ) {
            Ok(socket) => Some(Arc::new(socket)),
            Err(e) => {
                info!(
                    "❌ Unable to bind to multicast address(es) for endpoint {}: {}",
                    interface.ip, e
                );
                log_port_holder(settings.multicast_port);
                None
            }
        };

        let (unicast_socket, search_port) = bind_unicast_socket(
            interface,
            settings.search_port,
            settings.ttl_v4,
            settings.hop_limit_v6,
            RECEIVE_POLL_INTERVAL,
        )
        .map_err(|source| SsdpError::Bind {
            address: SocketAddr::new(interface.ip, settings.search_port),
            source,
        })?;

        if settings.search_port != 0 && search_port != settings.search_port {
            log_port_holder(settings.search_port);
        }
        info!(
            "✅ SSDP enabled for IP endpoint {}, search port is {}",
            interface.ip, search_port
        );

        Ok(Self {
            interface: interface.clone(),
            multicast_address,
            search_port,
            multicast_socket,
            unicast_socket: Arc::new(unicast_socket),
            config_id: 0,
            shutdown: Arc::new(AtomicBool::new(false)),
            receive_threads: Vec::new(),
        })
    }

    pub fn interface(&self) -> &InterfaceAddress {
        &self.interface
    }

    pub fn ip(&self) -> IpAddr {
        self.interface.ip
    }

    pub fn is_ipv6(&self) -> bool {
        self.interface.ip.is_ipv6()
    }

    /// Groupe multicast vers lequel les NOTIFY de cet endpoint sont envoyés.
    pub fn multicast_address(&self) -> IpAddr {
        self.multicast_address
    }

    /// Redirige les NOTIFY vers une autre adresse (tests sur loopback).
    pub fn set_multicast_address(&mut self, address: IpAddr) {
        self.multicast_address = address;
    }

    /// Port unicast effectivement obtenu.
    pub fn search_port(&self) -> u16 {
        self.search_port
    }

    /// Vrai si le port unicast n'est pas le port SSDP standard
    /// (l'en-tête `SEARCHPORT.UPNP.ORG` doit alors être ajouté).
    pub fn has_custom_search_port(&self) -> bool {
        self.search_port != SSDP_PORT
    }

    pub fn config_id(&self) -> u32 {
        self.config_id
    }

    pub(crate) fn set_config_id(&mut self, config_id: u32) {
        self.config_id = config_id;
    }

    pub fn unicast_socket(&self) -> &Arc<UdpSocket> {
        &self.unicast_socket
    }

    pub fn multicast_socket(&self) -> Option<&Arc<UdpSocket>> {
        self.multicast_socket.as_ref()
    }

    pub(crate) fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub(crate) fn push_receive_thread(&mut self, handle: JoinHandle<()>) {
        self.receive_threads.push(handle);
    }

    /// URL de la description d'un device racine, vue depuis cet endpoint.
    pub fn description_url(&self, http_port: u16, description_path: &str) -> String {
        format!(
            "http://{}:{}{}",
            host_for_url(self.interface.ip),
            http_port,
            description_path
        )
    }

    /// Ferme l'endpoint : arrête et attend les boucles de réception, quitte
    /// les groupes multicast si demandé, puis libère les sockets.
    ///
    /// `exit_multicast_group` doit être faux si l'interface a disparu.
    pub fn close(mut self, exit_multicast_group: bool) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.receive_threads.drain(..) {
            if handle.join().is_err() {
                warn!("❌ SSDP receive thread for {} panicked", self.interface.ip);
            }
        }
        if let Some(socket) = self.multicast_socket.take() {
            info!("👋 SSDP disabled for IP endpoint {}", self.interface.ip);
            if exit_multicast_group {
                leave_multicast_groups(&socket, &self.interface);
            }
        }
    }
}

impl Drop for EndpointConfiguration {
    fn drop(&mut self) {
        // Les boucles de réception s'arrêtent d'elles-mêmes
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn log_port_holder(port: u16) {
    if let Some(holder) = pmoutils::find_udp_port_holder(port) {
        info!(
            "UDP port {} is held by {} (pid {}, user {})",
            holder.port, holder.process_name, holder.pid, holder.owner
        );
    }
}

/// Requête M-SEARCH acceptée, en attente de réponse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSearchRequest {
    /// Cible de la recherche (en-tête `ST`)
    pub st: String,

    /// Adresse de l'endpoint qui a reçu la requête
    pub endpoint: IpAddr,

    /// Émetteur de la requête, destinataire de la réponse
    pub requester: SocketAddr,
}

impl PendingSearchRequest {
    pub fn new(st: &str, endpoint: IpAddr, requester: SocketAddr) -> Self {
        Self {
            st: st.to_string(),
            endpoint,
            requester,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_settings() -> SsdpSettings {
        SsdpSettings {
            multicast_port: 0,
            search_port: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_bind_loopback_endpoint() {
        let endpoint =
            EndpointConfiguration::bind(&InterfaceAddress::loopback_v4(), &loopback_settings())
                .unwrap();

        assert_eq!(endpoint.ip(), "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(
            endpoint.multicast_address(),
            "239.255.255.250".parse::<IpAddr>().unwrap()
        );
        assert_ne!(endpoint.search_port(), 0);
        assert!(endpoint.has_custom_search_port());
        assert_eq!(
            endpoint.description_url(8080, "/desc.xml"),
            "http://127.0.0.1:8080/desc.xml"
        );

        endpoint.close(false);
    }
}
