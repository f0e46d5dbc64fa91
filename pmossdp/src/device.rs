//! Représentation des devices et services annoncés par SSDP.
//!
//! Seules les informations nécessaires à la découverte sont modélisées :
//! identité (UDN), type et version, chemin de la description, services et
//! devices embarqués. La génération des descriptions XML reste hors du moteur.

use std::sync::Arc;

use crate::errors::DeviceError;

/// Service annoncé par un device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpService {
    /// Type sans version (ex: `urn:schemas-upnp-org:service:ContentDirectory`)
    service_type: String,
    version: u32,
}

impl SsdpService {
    pub fn new(service_type: &str, version: u32) -> Result<Self, DeviceError> {
        if version == 0 {
            return Err(DeviceError::InvalidVersion);
        }
        if !service_type.starts_with("urn:") || !service_type.contains(":service:") {
            return Err(DeviceError::InvalidType(service_type.to_string()));
        }
        Ok(Self {
            service_type: service_type.to_string(),
            version,
        })
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// URN complète `type:version`, utilisée dans NT et ST.
    pub fn service_type_version_urn(&self) -> String {
        format!("{}:{}", self.service_type, self.version)
    }

    /// Vrai si le service est du type demandé, en version égale ou
    /// supérieure lorsque `compatible` est vrai.
    pub fn matches(&self, service_type: &str, version: u32, compatible: bool) -> bool {
        self.service_type == service_type
            && (self.version == version || (compatible && self.version > version))
    }
}

/// Device annoncé (racine ou embarqué).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpDevice {
    /// UDN complet, avec le préfixe `uuid:`
    udn: String,
    /// Type sans version (ex: `urn:schemas-upnp-org:device:MediaServer`)
    device_type: String,
    version: u32,
    /// Chemin de la description XML sur le serveur HTTP (ex: `/device/desc.xml`)
    description_path: String,
    services: Vec<SsdpService>,
    embedded_devices: Vec<SsdpDevice>,
}

impl SsdpDevice {
    /// Crée un device.
    ///
    /// # Arguments
    ///
    /// * `udn` - UUID du device, avec ou sans le préfixe `uuid:`
    /// * `device_type` - URN du type, sans version
    /// * `version` - Version du type (> 0)
    /// * `description_path` - Chemin de la description XML
    pub fn new(
        udn: &str,
        device_type: &str,
        version: u32,
        description_path: &str,
    ) -> Result<Self, DeviceError> {
        if version == 0 {
            return Err(DeviceError::InvalidVersion);
        }
        if !device_type.starts_with("urn:") || !device_type.contains(":device:") {
            return Err(DeviceError::InvalidType(device_type.to_string()));
        }
        let udn = if udn.starts_with("uuid:") {
            udn.to_string()
        } else {
            format!("uuid:{}", udn)
        };
        let description_path = if description_path.starts_with('/') {
            description_path.to_string()
        } else {
            format!("/{}", description_path)
        };
        Ok(Self {
            udn,
            device_type: device_type.to_string(),
            version,
            description_path,
            services: Vec::new(),
            embedded_devices: Vec::new(),
        })
    }

    /// Ajoute un service (builder).
    pub fn with_service(mut self, service: SsdpService) -> Self {
        self.services.push(service);
        self
    }

    /// Ajoute un device embarqué (builder).
    pub fn with_embedded_device(mut self, device: SsdpDevice) -> Self {
        self.embedded_devices.push(device);
        self
    }

    pub fn udn(&self) -> &str {
        &self.udn
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn description_path(&self) -> &str {
        &self.description_path
    }

    pub fn services(&self) -> &[SsdpService] {
        &self.services
    }

    pub fn embedded_devices(&self) -> &[SsdpDevice] {
        &self.embedded_devices
    }

    /// URN complète `type:version`, utilisée dans NT et ST.
    pub fn device_type_version_urn(&self) -> String {
        format!("{}:{}", self.device_type, self.version)
    }

    /// Ce device puis tous ses descendants, en profondeur d'abord.
    pub fn iter_devices(&self) -> Vec<&SsdpDevice> {
        let mut result = vec![self];
        for embedded in &self.embedded_devices {
            result.extend(embedded.iter_devices());
        }
        result
    }

    /// Cherche un device par UDN dans ce sous-arbre.
    pub fn find_device_by_udn(&self, udn: &str) -> Option<&SsdpDevice> {
        self.iter_devices().into_iter().find(|d| d.udn == udn)
    }

    /// Cherche les devices d'un type donné dans ce sous-arbre.
    ///
    /// Avec `compatible`, les versions supérieures correspondent aussi.
    pub fn find_devices_by_type_and_version(
        &self,
        device_type: &str,
        version: u32,
        compatible: bool,
    ) -> Vec<&SsdpDevice> {
        self.iter_devices()
            .into_iter()
            .filter(|d| {
                d.device_type == device_type
                    && (d.version == version || (compatible && d.version > version))
            })
            .collect()
    }

    /// Cherche les services d'un type donné dans ce sous-arbre.
    ///
    /// Retourne les couples `(device parent, service)`.
    pub fn find_services_by_type_and_version(
        &self,
        service_type: &str,
        version: u32,
        compatible: bool,
    ) -> Vec<(&SsdpDevice, &SsdpService)> {
        let mut result = Vec::new();
        for device in self.iter_devices() {
            for service in &device.services {
                if service.matches(service_type, version, compatible) {
                    result.push((device, service));
                }
            }
        }
        result
    }
}

/// Cherche un device par UDN parmi des devices racines.
///
/// Retourne le device trouvé et sa racine.
pub fn find_device_by_udn<'a>(
    roots: &'a [Arc<SsdpDevice>],
    udn: &str,
) -> Option<(&'a SsdpDevice, &'a Arc<SsdpDevice>)> {
    roots
        .iter()
        .find_map(|root| root.find_device_by_udn(udn).map(|d| (d, root)))
}
