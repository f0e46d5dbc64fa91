//! Utilitaires réseau SSDP : adresses multicast, création et configuration
//! des sockets UDP.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket};
use std::time::Duration;

use pmoutils::InterfaceAddress;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::warn;

use crate::{
    SSDP_MULTICAST_ADDRESS_V4, SSDP_MULTICAST_ADDRESS_V6_GLOBAL,
    SSDP_MULTICAST_ADDRESS_V6_LINK_LOCAL, SSDP_MULTICAST_ADDRESS_V6_NODE_LOCAL,
    SSDP_MULTICAST_ADDRESS_V6_SITE_LOCAL,
};

/// Groupes IPv6 rejoints par la socket multicast.
const SSDP_V6_GROUPS: [Ipv6Addr; 4] = [
    SSDP_MULTICAST_ADDRESS_V6_NODE_LOCAL,
    SSDP_MULTICAST_ADDRESS_V6_LINK_LOCAL,
    SSDP_MULTICAST_ADDRESS_V6_SITE_LOCAL,
    SSDP_MULTICAST_ADDRESS_V6_GLOBAL,
];

fn is_ipv6_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

fn is_ipv6_site_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfec0
}

/// Groupe multicast SSDP à utiliser pour une adresse d'interface.
///
/// - IPv4 → `239.255.255.250`
/// - IPv6 lien local → `FF02::C`
/// - IPv6 site local (ou `site_local_operation`) → `FF05::C`
/// - autre IPv6 → `FF0E::C`
pub fn ssdp_multicast_address_for_interface(ip: IpAddr, site_local_operation: bool) -> IpAddr {
    match ip {
        IpAddr::V4(_) => IpAddr::V4(SSDP_MULTICAST_ADDRESS_V4),
        IpAddr::V6(v6) if is_ipv6_link_local(&v6) => {
            IpAddr::V6(SSDP_MULTICAST_ADDRESS_V6_LINK_LOCAL)
        }
        IpAddr::V6(v6) if is_ipv6_site_local(&v6) || site_local_operation => {
            IpAddr::V6(SSDP_MULTICAST_ADDRESS_V6_SITE_LOCAL)
        }
        IpAddr::V6(_) => IpAddr::V6(SSDP_MULTICAST_ADDRESS_V6_GLOBAL),
    }
}

/// Forme de l'adresse dans une URL (`1.2.3.4` ou `[fe80::1]`).
pub fn host_for_url(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    }
}

fn new_udp_socket(ip: IpAddr) -> io::Result<Socket> {
    let domain = if ip.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    if ip.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    Ok(socket)
}

fn interface_socket_addr(interface: &InterfaceAddress, port: u16) -> SocketAddr {
    match interface.ip {
        IpAddr::V6(v6) if is_ipv6_link_local(&v6) => {
            SocketAddr::V6(SocketAddrV6::new(v6, port, 0, interface.index))
        }
        ip => SocketAddr::new(ip, port),
    }
}

/// Crée la socket de réception multicast d'une interface.
///
/// La socket est liée à l'adresse non spécifiée sur `port` (les datagrammes
/// multicast ne sont pas délivrés à une socket liée à une adresse unicast)
/// puis rejoint le groupe IPv4 ou les quatre groupes IPv6 SSDP. Un échec
/// d'adhésion est signalé mais n'empêche pas l'utilisation de la socket.
///
/// Toutes les sockets multicast partagent le même port : chacune ne doit
/// recevoir que les datagrammes arrivés sur sa propre interface, sinon un
/// M-SEARCH serait traité par tous les endpoints.
pub fn bind_and_configure_multicast_socket(
    interface: &InterfaceAddress,
    port: u16,
    read_timeout: Duration,
) -> io::Result<UdpSocket> {
    let socket = new_udp_socket(interface.ip)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    restrict_to_joined_groups(&socket, interface.ip)?;

    let bind_addr = match interface.ip {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
    };
    socket.bind(&bind_addr.into())?;

    match interface.ip {
        IpAddr::V4(v4) => {
            if let Err(e) = socket.join_multicast_v4(&SSDP_MULTICAST_ADDRESS_V4, &v4) {
                warn!(
                    "❌ Could not join SSDP multicast group {} on {}: {}",
                    SSDP_MULTICAST_ADDRESS_V4, v4, e
                );
            }
        }
        IpAddr::V6(v6) => {
            for group in &SSDP_V6_GROUPS {
                if let Err(e) = socket.join_multicast_v6(group, interface.index) {
                    warn!(
                        "❌ Could not join SSDP multicast group {} on {}: {}",
                        group, v6, e
                    );
                }
            }
        }
    }

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(read_timeout))?;
    Ok(socket)
}

/// Limite la réception aux couples (groupe, interface) rejoints par la socket.
///
/// Linux délivre par défaut à une socket liée à l'adresse non spécifiée les
/// datagrammes de tout groupe rejoint par n'importe quelle socket de l'hôte
/// (`IP_MULTICAST_ALL`). Les autres systèmes filtrent déjà par interface.
#[cfg(target_os = "linux")]
fn restrict_to_joined_groups(socket: &Socket, ip: IpAddr) -> io::Result<()> {
    match ip {
        IpAddr::V4(_) => socket.set_multicast_all_v4(false),
        IpAddr::V6(_) => socket.set_multicast_all_v6(false),
    }
}

#[cfg(not(target_os = "linux"))]
fn restrict_to_joined_groups(_socket: &Socket, _ip: IpAddr) -> io::Result<()> {
    Ok(())
}

/// Crée la socket unicast (réception des M-SEARCH unicast, envoi de tous
/// les messages) d'une interface.
///
/// Essaie d'abord `preferred_port` ; si ce port est occupé, se rabat sur un
/// port éphémère. Le port effectivement obtenu est retourné avec la socket.
pub fn bind_unicast_socket(
    interface: &InterfaceAddress,
    preferred_port: u16,
    ttl_v4: u32,
    hop_limit_v6: u32,
    read_timeout: Duration,
) -> io::Result<(UdpSocket, u16)> {
    let socket = new_udp_socket(interface.ip)?;

    let preferred = interface_socket_addr(interface, preferred_port);
    if let Err(e) = socket.bind(&preferred.into()) {
        if e.kind() != io::ErrorKind::AddrInUse {
            return Err(e);
        }
        let fallback = interface_socket_addr(interface, 0);
        socket.bind(&fallback.into())?;
    }

    let port = socket
        .local_addr()?
        .as_socket()
        .map(|a| a.port())
        .unwrap_or(preferred_port);

    match interface.ip {
        IpAddr::V4(v4) => {
            if let Err(e) = socket.set_multicast_ttl_v4(ttl_v4) {
                warn!("❌ Could not set IPv4 multicast TTL on {}: {}", v4, e);
            }
            if !v4.is_loopback() {
                if let Err(e) = socket.set_multicast_if_v4(&v4) {
                    warn!("❌ Could not set IPv4 multicast interface {}: {}", v4, e);
                }
            }
        }
        IpAddr::V6(v6) => {
            if let Err(e) = socket.set_multicast_hops_v6(hop_limit_v6) {
                warn!("❌ Could not set IPv6 hop limit on {}: {}", v6, e);
            }
            if interface.index != 0 {
                if let Err(e) = socket.set_multicast_if_v6(interface.index) {
                    warn!("❌ Could not set IPv6 multicast interface {}: {}", v6, e);
                }
            }
        }
    }

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(read_timeout))?;
    Ok((socket, port))
}

/// Quitte les groupes multicast SSDP rejoints par
/// [`bind_and_configure_multicast_socket`].
pub fn leave_multicast_groups(socket: &UdpSocket, interface: &InterfaceAddress) {
    match interface.ip {
        IpAddr::V4(v4) => {
            if let Err(e) = socket.leave_multicast_v4(&SSDP_MULTICAST_ADDRESS_V4, &v4) {
                warn!("❌ Could not leave SSDP multicast group on {}: {}", v4, e);
            }
        }
        IpAddr::V6(v6) => {
            for group in &SSDP_V6_GROUPS {
                if let Err(e) = socket.leave_multicast_v6(group, interface.index) {
                    warn!("❌ Could not leave SSDP multicast group {} on {}: {}", group, v6, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multicast_address_selection() {
        let v4: IpAddr = "192.168.1.10".parse().unwrap();
        let link: IpAddr = "fe80::1".parse().unwrap();
        let site: IpAddr = "fec0::1".parse().unwrap();
        let global: IpAddr = "2001:db8::1".parse().unwrap();

        assert_eq!(
            ssdp_multicast_address_for_interface(v4, false),
            "239.255.255.250".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            ssdp_multicast_address_for_interface(link, true),
            "ff02::c".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            ssdp_multicast_address_for_interface(site, false),
            "ff05::c".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            ssdp_multicast_address_for_interface(global, false),
            "ff0e::c".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            ssdp_multicast_address_for_interface(global, true),
            "ff05::c".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_host_for_url() {
        assert_eq!(host_for_url("10.0.0.1".parse().unwrap()), "10.0.0.1");
        assert_eq!(host_for_url("fe80::1".parse().unwrap()), "[fe80::1]");
    }

    fn free_udp_port() -> u16 {
        UdpSocket::bind("0.0.0.0:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn first_external_v4() -> Option<InterfaceAddress> {
        pmoutils::list_upnp_addresses(true, false, &[])
            .into_iter()
            .find(|i| !i.ip.is_loopback())
    }

    #[test]
    fn test_multicast_socket_only_receives_on_its_interface() {
        let Some(external) = first_external_v4() else {
            return;
        };
        let IpAddr::V4(external_v4) = external.ip else {
            unreachable!()
        };
        let port = free_udp_port();
        let timeout = Duration::from_millis(300);

        let on_external = bind_and_configure_multicast_socket(&external, port, timeout).unwrap();
        let on_loopback =
            bind_and_configure_multicast_socket(&InterfaceAddress::loopback_v4(), port, timeout)
                .unwrap();

        let sender = UdpSocket::bind(SocketAddr::new(external.ip, 0)).unwrap();
        socket2::SockRef::from(&sender).set_multicast_if_v4(&external_v4).unwrap();
        sender.set_multicast_loop_v4(true).unwrap();
        sender
            .send_to(b"M-SEARCH * HTTP/1.1\r\n\r\n", (SSDP_MULTICAST_ADDRESS_V4, port))
            .unwrap();

        let mut buf = [0u8; 512];
        assert!(on_external.recv_from(&mut buf).is_ok());
        assert!(
            on_loopback.recv_from(&mut buf).is_err(),
            "datagram from {} leaked to the loopback endpoint",
            external.name
        );
    }

    #[test]
    fn test_unicast_fallback_when_port_taken() {
        let holder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let taken = holder.local_addr().unwrap().port();

        let (socket, port) = bind_unicast_socket(
            &InterfaceAddress::loopback_v4(),
            taken,
            2,
            2,
            Duration::from_millis(100),
        )
        .unwrap();

        assert_ne!(port, taken);
        assert_eq!(socket.local_addr().unwrap().port(), port);
    }
}
