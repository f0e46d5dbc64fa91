mod common;

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use common::*;
use pmossdp::{SsdpError, SsdpServer};
use pmoutils::InterfaceAddress;

fn free_port() -> u16 {
    UdpSocket::bind("0.0.0.0:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn unbindable_address_is_skipped() {
    let mut server = SsdpServer::new(settings(free_port()), registry());
    let absent = InterfaceAddress {
        name: "absent".to_string(),
        ip: "192.0.2.123".parse().unwrap(),
        index: 0,
    };

    server
        .bind_on(&[absent, InterfaceAddress::loopback_v4()])
        .unwrap();

    assert!(server.controller().is_active());
    assert_eq!(server.controller().endpoint_addresses(), vec![LOOPBACK]);

    let search_port = server.controller().search_port(LOOPBACK).unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client
        .send_to(
            msearch("upnp:rootdevice", Some(1)).as_bytes(),
            SocketAddr::new(LOOPBACK, search_port),
        )
        .unwrap();

    let responses = receive(&client, 2, Duration::from_secs(2));
    assert_eq!(responses.len(), 1);
    assert_eq!(
        header(&responses[0], "USN").as_deref(),
        Some("uuid:abc::upnp:rootdevice")
    );

    server.close();
}

#[test]
fn second_bind_is_rejected() {
    let mut server = SsdpServer::new(settings(free_port()), registry());
    server.bind_on(&[InterfaceAddress::loopback_v4()]).unwrap();

    let again = server.bind_on(&[InterfaceAddress::loopback_v4()]);

    assert!(matches!(again, Err(SsdpError::AlreadyActive)));
    server.close();
}
