//! Émetteurs de messages SSDP.
//!
//! Chaque émetteur transforme un triplet `(NT, USN, device racine)` en
//! datagrammes. Les datagrammes sont construits sous le verrou du contrôleur
//! dans un [`Outbox`], puis envoyés une fois le verrou relâché.

use std::net::{IpAddr, SocketAddr, SocketAddrV6, UdpSocket};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    config::SsdpSettings, device::SsdpDevice, endpoint::EndpointConfiguration,
    http::SsdpMessage, network::host_for_url,
};

/// Valeur de l'en-tête `OPT` pour IPv6 (extension de nommage UPnP).
const OPT_HEADER_VALUE: &str = "\"http://schemas.upnp.org/upnp/1/0/\"; ns=01";

/// Paramètres communs à tous les messages d'une émission.
#[derive(Debug, Clone, Copy)]
pub struct MessageContext<'a> {
    pub settings: &'a SsdpSettings,
    pub server_header: &'a str,
    pub boot_id: u32,
    pub expiration: u32,
}

/// Les quatre types de messages émis par un device SSDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSender {
    /// `NOTIFY ssdp:alive`, multicast
    Alive,
    /// `NOTIFY ssdp:byebye`, multicast
    ByeBye,
    /// `NOTIFY ssdp:update`, multicast
    Update { next_boot_id: u32 },
    /// `HTTP/1.1 200 OK`, unicast vers l'auteur d'un M-SEARCH
    SearchResult {
        endpoint: IpAddr,
        requester: SocketAddr,
    },
}

impl MessageSender {
    fn nts(&self) -> Option<&'static str> {
        match self {
            Self::Alive => Some("ssdp:alive"),
            Self::ByeBye => Some("ssdp:byebye"),
            Self::Update { .. } => Some("ssdp:update"),
            Self::SearchResult { .. } => None,
        }
    }

    /// Construit le message pour un endpoint donné.
    pub fn build_message(
        &self,
        ctx: &MessageContext<'_>,
        endpoint: &EndpointConfiguration,
        nt: &str,
        usn: &str,
        root: &SsdpDevice,
    ) -> SsdpMessage {
        let location = endpoint.description_url(ctx.settings.http_port, root.description_path());
        let host = format!(
            "{}:{}",
            host_for_url(endpoint.multicast_address()),
            ctx.settings.multicast_port
        );
        let nts = self.nts().unwrap_or_default();

        let mut message = match self {
            Self::Alive => SsdpMessage::notify()
                .header("HOST", host)
                .header("CACHE-CONTROL", format!("max-age={}", ctx.expiration))
                .header("LOCATION", location)
                .header("NT", nt)
                .header("NTS", nts)
                .header("SERVER", ctx.server_header)
                .header("USN", usn)
                .header("BOOTID.UPNP.ORG", ctx.boot_id)
                .header("CONFIGID.UPNP.ORG", endpoint.config_id()),
            Self::ByeBye => SsdpMessage::notify()
                .header("HOST", host)
                .header("NT", nt)
                .header("NTS", nts)
                .header("USN", usn)
                .header("BOOTID.UPNP.ORG", ctx.boot_id)
                .header("CONFIGID.UPNP.ORG", endpoint.config_id()),
            Self::Update { next_boot_id } => SsdpMessage::notify()
                .header("HOST", host)
                .header("LOCATION", location)
                .header("NT", nt)
                .header("NTS", nts)
                .header("USN", usn)
                .header("BOOTID.UPNP.ORG", ctx.boot_id)
                .header("CONFIGID.UPNP.ORG", endpoint.config_id())
                .header("NEXTBOOTID.UPNP.ORG", next_boot_id),
            Self::SearchResult { .. } => SsdpMessage::ok_response()
                .header("CACHE-CONTROL", format!("max-age={}", ctx.expiration))
                .header(
                    "DATE",
                    chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT"),
                )
                .header("EXT", "")
                .header("LOCATION", location)
                .header("SERVER", ctx.server_header)
                .header("ST", nt)
                .header("USN", usn)
                .header("BOOTID.UPNP.ORG", ctx.boot_id)
                .header("CONFIGID.UPNP.ORG", endpoint.config_id()),
        };

        if !matches!(self, Self::ByeBye) && endpoint.has_custom_search_port() {
            message = message.header("SEARCHPORT.UPNP.ORG", endpoint.search_port());
        }
        if endpoint.is_ipv6() {
            message = message
                .header("OPT", OPT_HEADER_VALUE)
                .header("01-NLS", ctx.boot_id);
        }
        message
    }

    /// Ajoute à `outbox` les datagrammes d'un triplet `(NT, USN, racine)`.
    ///
    /// Les messages multicast partent de tous les endpoints ; une réponse de
    /// recherche ne part que de l'endpoint qui a reçu la requête.
    pub fn queue_message(
        &self,
        ctx: &MessageContext<'_>,
        endpoints: &[EndpointConfiguration],
        nt: &str,
        usn: &str,
        root: &SsdpDevice,
        outbox: &mut Outbox,
    ) {
        match self {
            Self::SearchResult {
                endpoint,
                requester,
            } => {
                let Some(config) = endpoints.iter().find(|e| e.ip() == *endpoint) else {
                    debug!("SSDP endpoint {} vanished, dropping search result", endpoint);
                    return;
                };
                let message = self.build_message(ctx, config, nt, usn, root);
                outbox.push(OutboundDatagram {
                    socket: Arc::clone(config.unicast_socket()),
                    destination: *requester,
                    payload: message.to_wire().into_bytes(),
                    repeat: 1,
                });
            }
            _ => {
                for config in endpoints {
                    let message = self.build_message(ctx, config, nt, usn, root);
                    outbox.push(OutboundDatagram {
                        socket: Arc::clone(config.unicast_socket()),
                        destination: multicast_destination(config, ctx.settings.multicast_port),
                        payload: message.to_wire().into_bytes(),
                        repeat: ctx.settings.notify_repeat.max(1),
                    });
                }
            }
        }
    }
}

fn multicast_destination(endpoint: &EndpointConfiguration, port: u16) -> SocketAddr {
    match endpoint.multicast_address() {
        IpAddr::V6(group) => {
            // FF01::C et FF02::C exigent l'interface de sortie
            let scope = if (group.segments()[0] & 0x000f) <= 2 {
                endpoint.interface().index
            } else {
                0
            };
            SocketAddr::V6(SocketAddrV6::new(group, port, 0, scope))
        }
        ip => SocketAddr::new(ip, port),
    }
}

/// Datagramme prêt à être envoyé.
#[derive(Debug)]
pub struct OutboundDatagram {
    pub socket: Arc<UdpSocket>,
    pub destination: SocketAddr,
    pub payload: Vec<u8>,
    pub repeat: u32,
}

/// File de datagrammes construite sous verrou, envoyée hors verrou.
#[derive(Debug, Default)]
pub struct Outbox {
    datagrams: Vec<OutboundDatagram>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, datagram: OutboundDatagram) {
        self.datagrams.push(datagram);
    }

    pub fn len(&self) -> usize {
        self.datagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datagrams.is_empty()
    }

    pub fn datagrams(&self) -> &[OutboundDatagram] {
        &self.datagrams
    }

    /// Envoie tous les datagrammes.
    ///
    /// Un échec est journalisé et n'interrompt pas les envois suivants.
    /// Retourne le nombre de datagrammes envoyés avec succès.
    pub fn flush(self) -> usize {
        let mut sent = 0;
        for datagram in self.datagrams {
            let mut ok = true;
            for _ in 0..datagram.repeat {
                if let Err(e) = datagram.socket.send_to(&datagram.payload, datagram.destination) {
                    warn!("❌ Failed to send SSDP message to {}: {}", datagram.destination, e);
                    ok = false;
                    break;
                }
            }
            if ok {
                sent += 1;
            }
        }
        sent
    }
}
