//! Arbre des devices annoncés.
//!
//! Le moteur SSDP ne possède pas l'arbre : il l'interroge à chaque annonce
//! ou réponse via le trait [`DeviceTree`].

use std::sync::{Arc, RwLock};

use crate::device::SsdpDevice;

/// Source des devices racines annoncés.
pub trait DeviceTree: Send + Sync {
    /// Retourne un instantané des devices racines.
    fn root_devices(&self) -> Vec<Arc<SsdpDevice>>;
}

/// Registre simple de devices racines.
///
/// # Examples
///
/// ```rust,ignore
/// let registry = DeviceRegistry::new();
/// registry.add_root_device(device);
/// let server = SsdpServer::new(settings, Arc::new(registry));
/// ```
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    roots: RwLock<Vec<Arc<SsdpDevice>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute un device racine ; remplace celui de même UDN s'il existe.
    pub fn add_root_device(&self, device: SsdpDevice) {
        let mut roots = self.roots.write().unwrap_or_else(|e| e.into_inner());
        roots.retain(|d| d.udn() != device.udn());
        roots.push(Arc::new(device));
    }

    /// Retire un device racine par UDN.
    pub fn remove_root_device(&self, udn: &str) -> Option<Arc<SsdpDevice>> {
        let mut roots = self.roots.write().unwrap_or_else(|e| e.into_inner());
        let index = roots.iter().position(|d| d.udn() == udn)?;
        Some(roots.remove(index))
    }

    pub fn count(&self) -> usize {
        self.roots.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl DeviceTree for DeviceRegistry {
    fn root_devices(&self) -> Vec<Arc<SsdpDevice>> {
        self.roots.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
