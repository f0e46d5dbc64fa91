//! Énumération des couples NT/USN à annoncer (UPnP DA 1.1, §1.1.2).
//!
//! Pour chaque device racine :
//! - `upnp:rootdevice` / `<udn>::upnp:rootdevice`
//!
//! Pour chaque device (racine puis embarqués, en profondeur d'abord) :
//! - `<udn>` / `<udn>`
//! - `<type:v>` / `<udn>::<type:v>`
//!
//! Pour chaque type de service distinct d'un device :
//! - `<stype:v>` / `<udn>::<stype:v>`

use std::collections::HashSet;
use std::sync::Arc;

use crate::device::SsdpDevice;

/// Appelle `visit(nt, usn, root)` pour chaque annonce requise par l'arbre.
pub fn for_each_notification<F>(roots: &[Arc<SsdpDevice>], mut visit: F)
where
    F: FnMut(&str, &str, &Arc<SsdpDevice>),
{
    for root in roots {
        let udn = root.udn();
        visit(
            "upnp:rootdevice",
            &format!("{}::upnp:rootdevice", udn),
            root,
        );
        for device in root.iter_devices() {
            notify_device(device, root, &mut visit);
        }
    }
}

fn notify_device<F>(device: &SsdpDevice, root: &Arc<SsdpDevice>, visit: &mut F)
where
    F: FnMut(&str, &str, &Arc<SsdpDevice>),
{
    let udn = device.udn();
    visit(udn, udn, root);

    let device_urn = device.device_type_version_urn();
    visit(&device_urn, &format!("{}::{}", udn, device_urn), root);

    let mut seen = HashSet::new();
    for service in device.services() {
        let service_urn = service.service_type_version_urn();
        if seen.insert(service_urn.clone()) {
            visit(&service_urn, &format!("{}::{}", udn, service_urn), root);
        }
    }
}

/// Nombre d'annonces produites pour `roots`.
pub fn notification_count(roots: &[Arc<SsdpDevice>]) -> usize {
    let mut count = 0;
    for_each_notification(roots, |_, _, _| count += 1);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SsdpService;

    fn root_with_service() -> SsdpDevice {
        SsdpDevice::new("abc", "urn:schemas-upnp-org:device:MediaServer", 1, "/desc.xml")
            .unwrap()
            .with_service(SsdpService::new("urn:schemas:service:Foo", 1).unwrap())
    }

    #[test]
    fn test_root_with_one_service_yields_four_pairs() {
        let roots = vec![Arc::new(root_with_service())];

        let mut pairs = Vec::new();
        for_each_notification(&roots, |nt, usn, root| {
            assert_eq!(root.udn(), "uuid:abc");
            pairs.push((nt.to_string(), usn.to_string()));
        });

        assert_eq!(
            pairs,
            vec![
                (
                    "upnp:rootdevice".to_string(),
                    "uuid:abc::upnp:rootdevice".to_string()
                ),
                ("uuid:abc".to_string(), "uuid:abc".to_string()),
                (
                    "urn:schemas-upnp-org:device:MediaServer:1".to_string(),
                    "uuid:abc::urn:schemas-upnp-org:device:MediaServer:1".to_string()
                ),
                (
                    "urn:schemas:service:Foo:1".to_string(),
                    "uuid:abc::urn:schemas:service:Foo:1".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_embedded_device_and_duplicate_services() {
        let embedded = SsdpDevice::new(
            "def",
            "urn:schemas-upnp-org:device:MediaRenderer",
            1,
            "/r.xml",
        )
        .unwrap();
        let root = root_with_service()
            .with_service(SsdpService::new("urn:schemas:service:Foo", 1).unwrap())
            .with_embedded_device(embedded);

        assert_eq!(notification_count(&[Arc::new(root)]), 6);
    }
}
