//! # PMOSsdp - moteur SSDP (Simple Service Discovery Protocol)
//!
//! Cette crate implémente la partie « device » de SSDP pour UPnP : annonce
//! périodique des devices et services en multicast, réponses aux requêtes
//! M-SEARCH, révocation à l'arrêt.
//!
//! ## Fonctionnalités
//!
//! - ✅ NOTIFY `ssdp:alive`, `ssdp:byebye` et `ssdp:update` en multicast (IPv4 et IPv6)
//! - ✅ Réponses M-SEARCH différées aléatoirement selon MX
//! - ✅ Ré-annonces avant expiration du `max-age`
//! - ✅ BOOTID / CONFIGID / SEARCHPORT (UPnP DA 1.1)
//! - ✅ Arrêt en deux phases : byebye puis libération des timers et sockets
//!
//! ## Architecture
//!
//! - [`SsdpServer`] : façade, gère les interfaces réseau
//! - [`SsdpServerController`] : cœur du protocole (timers, endpoints, recherches)
//! - [`MessageSender`] : les quatre types de messages émis
//! - [`DeviceTree`] : source des devices annoncés
//!
//! ## Exemple
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pmossdp::{DeviceRegistry, SsdpDevice, SsdpServer, SsdpService, SsdpSettings};
//!
//! let registry = Arc::new(DeviceRegistry::new());
//! registry.add_root_device(
//!     SsdpDevice::new("1234", "urn:schemas-upnp-org:device:MediaServer", 1, "/desc.xml")?
//!         .with_service(SsdpService::new("urn:schemas-upnp-org:service:ContentDirectory", 1)?),
//! );
//!
//! let mut server = SsdpServer::new(SsdpSettings::default(), registry);
//! server.bind()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

pub mod config;
pub mod config_ext;
pub mod controller;
pub mod device;
pub mod endpoint;
pub mod errors;
pub mod http;
pub mod network;
pub mod parser;
pub mod producer;
pub mod senders;
pub mod server;
pub mod timer;
pub mod tree;

pub use config::SsdpSettings;
pub use config_ext::SsdpConfigExt;
pub use controller::{SsdpServerController, advertisement_repetition_time, search_response_delay};
pub use device::{SsdpDevice, SsdpService};
pub use endpoint::{EndpointConfiguration, PendingSearchRequest};
pub use errors::{DeviceError, SsdpError};
pub use http::{SimpleHttpRequest, SsdpMessage};
pub use senders::{MessageSender, Outbox};
pub use server::SsdpServer;
pub use tree::{DeviceRegistry, DeviceTree};

/// Adresse multicast SSDP IPv4
pub const SSDP_MULTICAST_ADDRESS_V4: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Adresse multicast SSDP IPv6, portée nœud (`FF01::C`)
pub const SSDP_MULTICAST_ADDRESS_V6_NODE_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff01, 0, 0, 0, 0, 0, 0, 0xc);

/// Adresse multicast SSDP IPv6, portée lien (`FF02::C`)
pub const SSDP_MULTICAST_ADDRESS_V6_LINK_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xc);

/// Adresse multicast SSDP IPv6, portée site (`FF05::C`)
pub const SSDP_MULTICAST_ADDRESS_V6_SITE_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff05, 0, 0, 0, 0, 0, 0, 0xc);

/// Adresse multicast SSDP IPv6, portée globale (`FF0E::C`)
pub const SSDP_MULTICAST_ADDRESS_V6_GLOBAL: Ipv6Addr = Ipv6Addr::new(0xff0e, 0, 0, 0, 0, 0, 0, 0xc);

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// Durée de validité des annonces par défaut (en secondes)
pub const DEFAULT_ADVERTISEMENT_EXPIRATION_TIME: u32 = 1800;

/// Intervalle minimal entre deux ré-annonces (en secondes)
pub const MIN_ADVERTISEMENT_INTERVAL: u32 = 600;

/// Délai maximal avant la première annonce (UPnP DA 1.1, §1.2.2)
pub const INITIAL_ADVERTISEMENT_MAX_WAIT_MS: u64 = 100;

/// Taille du tampon de réception UDP
pub const UDP_SSDP_RECEIVE_BUFFER_SIZE: usize = 4096;

/// Période de scrutation des boucles de réception
pub const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(500);
