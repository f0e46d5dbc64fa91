mod logs;

use std::sync::Arc;
use std::time::Duration;

use pmoconfig::Config;
use pmossdp::{DeviceRegistry, SsdpConfigExt, SsdpDevice, SsdpServer, SsdpService};
use tokio::signal;
use tracing::{info, warn};

const MEDIA_SERVER: &str = "urn:schemas-upnp-org:device:MediaServer";
const CONTENT_DIRECTORY: &str = "urn:schemas-upnp-org:service:ContentDirectory";
const CONNECTION_MANAGER: &str = "urn:schemas-upnp-org:service:ConnectionManager";

/// MediaServer annoncé par le démon, avec un UDN persistant.
fn media_server(config: &Config) -> anyhow::Result<SsdpDevice> {
    let udn = config.get_device_udn("mediaserver", "PMOSsdp")?;
    let device = SsdpDevice::new(&udn, MEDIA_SERVER, 1, "/device/MediaServer/desc.xml")?
        .with_service(SsdpService::new(CONTENT_DIRECTORY, 1)?)
        .with_service(SsdpService::new(CONNECTION_MANAGER, 1)?);
    Ok(device)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Premier argument : répertoire de configuration
    let config_dir = std::env::args().nth(1).unwrap_or_default();
    let config = Config::load_config(&config_dir)?;
    logs::init_logging(&config);

    let settings = config.get_ssdp_settings()?;
    let check_interval = Duration::from_secs(settings.interface_check_interval_secs.max(1));

    info!("📡 Registering SSDP devices...");
    let registry = Arc::new(DeviceRegistry::new());
    let device = media_server(&config)?;
    info!("✅ {} ({})", device.device_type_version_urn(), device.udn());
    registry.add_root_device(device);

    let mut server = SsdpServer::new(settings, registry);
    server.bind()?;
    info!(
        "✅ SSDP server ready, BOOTID={}",
        server.controller().boot_id()
    );

    let mut ticker = tokio::time::interval(check_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let changed = tokio::task::block_in_place(|| server.refresh_interfaces());
                if changed {
                    info!(
                        "📡 Network configuration changed, {} endpoint(s) active",
                        server.controller().endpoint_addresses().len()
                    );
                }
            }
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("❌ Unable to listen for Ctrl+C: {}", e);
                    server.close();
                    return Err(e.into());
                }
                info!("Ctrl+C reçu, arrêt gracieux");
                break;
            }
        }
    }

    tokio::task::block_in_place(|| server.close());
    info!("👋 SSDP server stopped");
    Ok(())
}
