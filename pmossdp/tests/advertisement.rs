mod common;

use std::time::Duration;

use common::*;
use pmossdp::{SsdpDevice, SsdpError};

const WAIT: Duration = Duration::from_secs(2);

fn pairs(messages: &[String]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = messages
        .iter()
        .map(|m| (header(m, "NT").unwrap(), header(m, "USN").unwrap()))
        .collect();
    pairs.sort();
    pairs
}

#[test]
fn initial_advertisement_is_sent_after_start() {
    let harness = start(registry());
    let messages = receive(&harness.listener, 5, WAIT);

    assert_eq!(messages.len(), 4);
    let boot_id = harness.controller.boot_id().to_string();
    for message in &messages {
        assert!(message.starts_with("NOTIFY * HTTP/1.1\r\n"));
        assert_eq!(header(message, "NTS").as_deref(), Some("ssdp:alive"));
        assert_eq!(header(message, "CACHE-CONTROL").as_deref(), Some("max-age=1800"));
        assert_eq!(header(message, "BOOTID.UPNP.ORG"), Some(boot_id.clone()));
        assert!(header(message, "SERVER").unwrap().contains(" UPnP/1.1 PMOSsdp/"));
    }
}

#[test]
fn advertise_is_idempotent() {
    let harness = start_and_drain(registry(), 4);

    harness.controller.advertise();
    let first = receive(&harness.listener, 4, WAIT);
    harness.controller.advertise();
    let second = receive(&harness.listener, 4, WAIT);

    assert_eq!(first.len(), 4);
    assert_eq!(pairs(&first), pairs(&second));
}

#[test]
fn update_bumps_boot_id() {
    let harness = start_and_drain(registry(), 4);
    let old = harness.controller.boot_id();

    harness.controller.update();
    let updates = receive(&harness.listener, 4, WAIT);
    assert_eq!(updates.len(), 4);
    for message in &updates {
        assert_eq!(header(message, "NTS").as_deref(), Some("ssdp:update"));
        assert_eq!(header(message, "BOOTID.UPNP.ORG"), Some(old.to_string()));
        assert_eq!(
            header(message, "NEXTBOOTID.UPNP.ORG"),
            Some((old + 1).to_string())
        );
    }
    assert_eq!(harness.controller.boot_id(), old + 1);

    harness.controller.advertise();
    for message in receive(&harness.listener, 4, WAIT) {
        assert_eq!(header(&message, "BOOTID.UPNP.ORG"), Some((old + 1).to_string()));
    }
}

#[test]
fn revoke_sends_byebye_for_every_notification() {
    let harness = start_and_drain(registry(), 4);

    harness.controller.revoke_advertisements();
    let messages = receive(&harness.listener, 5, WAIT);

    assert_eq!(messages.len(), 4);
    for message in &messages {
        assert_eq!(header(message, "NTS").as_deref(), Some("ssdp:byebye"));
        assert!(header(message, "LOCATION").is_none());
    }
}

#[test]
fn update_configuration_changes_config_id() {
    let registry = registry();
    let harness = start_and_drain(registry.clone(), 4);

    harness.controller.advertise();
    let before = receive(&harness.listener, 4, WAIT);
    let old_id = header(&before[0], "CONFIGID.UPNP.ORG").unwrap();

    registry.add_root_device(
        SsdpDevice::new("def", "urn:schemas-upnp-org:device:MediaRenderer", 1, "/r.xml").unwrap(),
    );
    harness.controller.update_configuration();
    let after = receive(&harness.listener, 8, WAIT);

    assert_eq!(after.len(), 7);
    let new_id = header(&after[0], "CONFIGID.UPNP.ORG").unwrap();
    assert_ne!(old_id, new_id);
}

#[test]
fn expiration_time_is_advertised() {
    let harness = start_and_drain(registry(), 4);

    harness.controller.set_advertisement_expiration_time(3600);
    assert_eq!(harness.controller.advertisement_expiration_time(), 3600);
    harness.controller.advertise();

    for message in receive(&harness.listener, 4, WAIT) {
        assert_eq!(header(&message, "CACHE-CONTROL").as_deref(), Some("max-age=3600"));
    }
}

#[test]
fn start_twice_fails() {
    let harness = start_and_drain(registry(), 4);

    assert!(matches!(
        harness.controller.start(),
        Err(SsdpError::AlreadyActive)
    ));
}
