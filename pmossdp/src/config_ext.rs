//! Extension pour intégrer la configuration SSDP dans pmoconfig
//!
//! Ce module fournit le trait `SsdpConfigExt` qui ajoute à `pmoconfig::Config`
//! la lecture du sous-arbre `host.ssdp` sous forme de [`SsdpSettings`].

use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::{Number, Value};

use crate::config::SsdpSettings;

/// Trait d'extension pour ajouter la configuration SSDP à pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::Config;
/// use pmossdp::SsdpConfigExt;
///
/// let config = Config::load_config("")?;
/// let settings = config.get_ssdp_settings()?;
/// ```
pub trait SsdpConfigExt {
    /// Construit les réglages SSDP depuis `host.ssdp`
    ///
    /// Les clés absentes prennent leur valeur par défaut ; `http_port` est
    /// repris de `host.http_port`.
    fn get_ssdp_settings(&self) -> Result<SsdpSettings>;

    /// Récupère la durée de validité des annonces (secondes)
    fn get_ssdp_advertisement_expiration_time(&self) -> Result<u32>;

    /// Définit la durée de validité des annonces (secondes)
    fn set_ssdp_advertisement_expiration_time(&self, seconds: u32) -> Result<()>;

    /// Indique si SSDP est actif sur IPv6
    fn get_ssdp_use_ipv6(&self) -> Result<bool>;

    /// Active ou désactive SSDP sur IPv6
    fn set_ssdp_use_ipv6(&self, enabled: bool) -> Result<()>;
}

impl SsdpConfigExt for Config {
    fn get_ssdp_settings(&self) -> Result<SsdpSettings> {
        let mut settings = match self.get_value(&["host", "ssdp"]) {
            Ok(value @ Value::Mapping(_)) => serde_yaml::from_value::<SsdpSettings>(value)?,
            _ => SsdpSettings::default(),
        };
        settings.http_port = self.get_http_port();
        Ok(settings)
    }

    fn get_ssdp_advertisement_expiration_time(&self) -> Result<u32> {
        match self.get_value(&["host", "ssdp", "advertisement_expiration_time"]) {
            Ok(Value::Number(n)) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(v) if v > 0 => Ok(v),
                _ => Ok(SsdpSettings::default().advertisement_expiration_time),
            },
            _ => Ok(SsdpSettings::default().advertisement_expiration_time),
        }
    }

    fn set_ssdp_advertisement_expiration_time(&self, seconds: u32) -> Result<()> {
        self.set_value(
            &["host", "ssdp", "advertisement_expiration_time"],
            Value::Number(Number::from(seconds)),
        )
    }

    fn get_ssdp_use_ipv6(&self) -> Result<bool> {
        match self.get_value(&["host", "ssdp", "use_ipv6"]) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => Ok(SsdpSettings::default().use_ipv6),
        }
    }

    fn set_ssdp_use_ipv6(&self, enabled: bool) -> Result<()> {
        self.set_value(&["host", "ssdp", "use_ipv6"], Value::Bool(enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "host:\n  http_port: 9000\n  ssdp:\n    notify_repeat: 3\n    address_filters: [\"192.168.1.10\"]\n",
        )
        .unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        let settings = config.get_ssdp_settings().unwrap();
        assert_eq!(settings.http_port, 9000);
        assert_eq!(settings.notify_repeat, 3);
        assert_eq!(settings.address_filters, vec!["192.168.1.10".to_string()]);
        assert_eq!(settings.min_advertisement_interval, 600);
        assert_eq!(settings.product_name, "PMOSsdp");
    }

    #[test]
    fn test_typed_accessors() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(config.get_ssdp_advertisement_expiration_time().unwrap(), 1800);
        config.set_ssdp_advertisement_expiration_time(3600).unwrap();
        assert_eq!(config.get_ssdp_advertisement_expiration_time().unwrap(), 3600);

        assert!(config.get_ssdp_use_ipv6().unwrap());
        config.set_ssdp_use_ipv6(false).unwrap();
        assert!(!config.get_ssdp_settings().unwrap().use_ipv6);
    }
}
