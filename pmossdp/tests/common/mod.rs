#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pmossdp::{
    DeviceRegistry, DeviceTree, EndpointConfiguration, SsdpDevice, SsdpServerController,
    SsdpService, SsdpSettings,
};
use pmoutils::InterfaceAddress;

pub const ROOT_UDN: &str = "uuid:abc";
pub const MEDIA_SERVER: &str = "urn:schemas-upnp-org:device:MediaServer";
pub const CONTENT_DIRECTORY: &str = "urn:schemas-upnp-org:service:ContentDirectory";

pub const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Un contrôleur actif sur loopback dont les NOTIFY arrivent sur `listener`.
pub struct Harness {
    pub controller: SsdpServerController,
    pub listener: UdpSocket,
    pub search_addr: SocketAddr,
}

pub fn media_server() -> SsdpDevice {
    SsdpDevice::new(ROOT_UDN, MEDIA_SERVER, 1, "/desc.xml")
        .unwrap()
        .with_service(SsdpService::new(CONTENT_DIRECTORY, 2).unwrap())
}

pub fn registry() -> Arc<DeviceRegistry> {
    let registry = DeviceRegistry::new();
    registry.add_root_device(media_server());
    Arc::new(registry)
}

pub fn settings(notify_port: u16) -> SsdpSettings {
    SsdpSettings {
        use_ipv6: false,
        multicast_port: notify_port,
        search_port: 0,
        notify_repeat: 1,
        ..Default::default()
    }
}

pub fn start(tree: Arc<dyn DeviceTree>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pmossdp=debug")
        .with_test_writer()
        .try_init();

    let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
    let settings = settings(listener.local_addr().unwrap().port());
    let controller = SsdpServerController::new(settings.clone(), tree);

    let mut endpoint =
        EndpointConfiguration::bind(&InterfaceAddress::loopback_v4(), &settings).unwrap();
    endpoint.set_multicast_address(LOOPBACK);
    controller.add_endpoint(endpoint).unwrap();
    controller.start().unwrap();

    let search_port = controller.search_port(LOOPBACK).unwrap();
    Harness {
        controller,
        listener,
        search_addr: SocketAddr::new(LOOPBACK, search_port),
    }
}

/// Démarre un contrôleur et consomme la première salve d'annonces.
pub fn start_and_drain(tree: Arc<dyn DeviceTree>, initial: usize) -> Harness {
    let harness = start(tree);
    let first = receive(&harness.listener, initial, Duration::from_secs(3));
    assert_eq!(first.len(), initial, "initial advertisement");
    harness
}

/// Lit au plus `count` datagrammes avant `timeout`.
pub fn receive(socket: &UdpSocket, count: usize, timeout: Duration) -> Vec<String> {
    let deadline = Instant::now() + timeout;
    let mut messages = Vec::new();
    let mut buf = [0u8; 4096];
    while messages.len() < count {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        socket.set_read_timeout(Some(deadline - now)).unwrap();
        match socket.recv_from(&mut buf) {
            Ok((len, _)) => messages.push(String::from_utf8_lossy(&buf[..len]).into_owned()),
            Err(_) => break,
        }
    }
    messages
}

pub fn header(message: &str, name: &str) -> Option<String> {
    message.split("\r\n").find_map(|line| {
        let (n, v) = line.split_once(':')?;
        n.eq_ignore_ascii_case(name).then(|| v.trim().to_string())
    })
}

pub fn msearch(st: &str, mx: Option<u32>) -> String {
    let mut request = String::from(
        "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\n",
    );
    if let Some(mx) = mx {
        request.push_str(&format!("MX: {}\r\n", mx));
    }
    request.push_str(&format!("ST: {}\r\n\r\n", st));
    request
}

/// Envoie un M-SEARCH depuis une nouvelle socket et retourne cette socket.
pub fn search(harness: &Harness, request: &str) -> UdpSocket {
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client
        .send_to(request.as_bytes(), harness.search_addr)
        .unwrap();
    client
}
