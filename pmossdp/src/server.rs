//! Serveur SSDP

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use pmoutils::{InterfaceAddress, list_upnp_addresses};
use tracing::{info, warn};

use crate::{
    config::SsdpSettings, controller::SsdpServerController, errors::SsdpError, tree::DeviceTree,
};

/// Serveur SSDP : associe le contrôleur aux interfaces réseau de la machine.
#[derive(Debug)]
pub struct SsdpServer {
    controller: SsdpServerController,
}

impl SsdpServer {
    /// Crée un serveur SSDP pour l'arbre de devices `tree`.
    pub fn new(settings: SsdpSettings, tree: Arc<dyn DeviceTree>) -> Self {
        Self {
            controller: SsdpServerController::new(settings, tree),
        }
    }

    pub fn controller(&self) -> &SsdpServerController {
        &self.controller
    }

    fn upnp_addresses(&self) -> Vec<InterfaceAddress> {
        let settings = self.controller.settings();
        list_upnp_addresses(
            settings.use_ipv4,
            settings.use_ipv6,
            &settings.address_filters,
        )
    }

    fn start_endpoint(&self, interface: &InterfaceAddress) -> bool {
        match self.controller.start_ssdp_endpoint(interface) {
            Ok(()) => true,
            Err(e) => {
                warn!("❌ Skipping SSDP endpoint {} ({}): {}", interface.ip, interface.name, e);
                false
            }
        }
    }

    /// Démarre un endpoint par adresse UPnP puis le contrôleur.
    pub fn bind(&mut self) -> Result<(), SsdpError> {
        let addresses = self.upnp_addresses();
        self.bind_on(&addresses)
    }

    /// Comme [`bind`](Self::bind), sur une liste d'adresses explicite.
    ///
    /// Une adresse qui ne peut pas être liée est ignorée.
    pub fn bind_on(&mut self, addresses: &[InterfaceAddress]) -> Result<(), SsdpError> {
        if self.controller.is_active() {
            return Err(SsdpError::AlreadyActive);
        }

        let started = addresses
            .iter()
            .filter(|interface| self.start_endpoint(interface))
            .count();
        if started == 0 {
            warn!("❌ No SSDP endpoint could be started");
        }

        self.controller.start()?;
        info!("✅ SSDP server bound on {} endpoint(s)", started);
        Ok(())
    }

    /// Révoque les annonces et libère timers et sockets.
    pub fn close(&mut self) {
        self.controller.stop();
        self.controller.close_ssdp_endpoints();
    }

    /// À appeler quand l'arbre des devices a changé.
    pub fn update_configuration(&self) {
        self.controller.update_configuration();
    }

    /// Synchronise les endpoints avec les interfaces réseau actuelles.
    ///
    /// Les endpoints dont l'adresse a disparu sont fermés sans quitter le
    /// groupe multicast ; les nouvelles adresses sont démarrées. Si l'ensemble
    /// a changé, envoie `ssdp:update` puis une annonce complète.
    ///
    /// Retourne `true` si l'ensemble des endpoints a changé.
    pub fn refresh_interfaces(&self) -> bool {
        if !self.controller.is_active() {
            return false;
        }

        let current: HashSet<IpAddr> = self.controller.endpoint_addresses().into_iter().collect();
        let wanted = self.upnp_addresses();
        let wanted_ips: HashSet<IpAddr> = wanted.iter().map(|i| i.ip).collect();

        let mut changed = false;
        for ip in current.difference(&wanted_ips) {
            info!("👋 Network address {} disappeared", ip);
            changed |= self.controller.close_ssdp_endpoint(*ip, false);
        }
        for interface in wanted.iter().filter(|i| !current.contains(&i.ip)) {
            info!("📡 New network address {} on {}", interface.ip, interface.name);
            changed |= self.start_endpoint(interface);
        }

        if changed {
            self.controller.update();
            self.controller.advertise();
        }
        changed
    }
}

impl Drop for SsdpServer {
    fn drop(&mut self) {
        self.close();
    }
}
