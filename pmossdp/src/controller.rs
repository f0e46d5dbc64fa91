//! Contrôleur SSDP côté device.
//!
//! Le contrôleur possède les endpoints, les deux timers (annonces et réponses
//! de recherche) et la file des recherches en attente. Tout l'état partagé vit
//! dans [`ServerData`], protégé par un unique verrou.
//!
//! Les datagrammes sont préparés sous le verrou puis envoyés après sa
//! libération ; les threads (timers, réception) ne sont jamais attendus en
//! tenant le verrou.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pmoutils::InterfaceAddress;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::{
    INITIAL_ADVERTISEMENT_MAX_WAIT_MS, RECEIVE_POLL_INTERVAL, UDP_SSDP_RECEIVE_BUFFER_SIZE,
    config::SsdpSettings,
    device::{SsdpDevice, find_device_by_udn},
    endpoint::{EndpointConfiguration, PendingSearchRequest},
    errors::SsdpError,
    http::SimpleHttpRequest,
    parser::{parse_mx, parse_type_version_urn, parse_user_agent_upnp1_minor_version},
    producer::for_each_notification,
    senders::{MessageContext, MessageSender, Outbox},
    timer::ReconfigurableTimer,
    tree::DeviceTree,
};

const ADVERTISEMENT_TIMER_NAME: &str = "ssdp-advertisement";
const SEARCH_RESPONSE_TIMER_NAME: &str = "ssdp-search-response";

/// Délai aléatoire avant la prochaine ré-annonce.
///
/// Tiré dans `[min, expiration/2)` ; si la moitié de la durée de validité est
/// inférieure à `min_interval`, tiré dans `[0, expiration/2)`.
pub fn advertisement_repetition_time(expiration: u32, min_interval: u32) -> Duration {
    let half_ms = u64::from(expiration / 2) * 1000;
    let min_ms = u64::from(min_interval) * 1000;
    let mut rng = rand::rng();
    let ms = if half_ms < min_ms {
        if half_ms == 0 { 0 } else { rng.random_range(0..half_ms) }
    } else if half_ms == min_ms {
        min_ms
    } else {
        min_ms + rng.random_range(0..half_ms - min_ms)
    };
    Duration::from_millis(ms)
}

/// Délai aléatoire avant de répondre à un M-SEARCH : `[0, mx)` secondes,
/// immédiat si `mx == 0`.
pub fn search_response_delay(mx: u32) -> Duration {
    if mx == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..u64::from(mx) * 1000))
}

/// CONFIGID.UPNP.ORG : empreinte sur 24 bits de l'arbre annoncé et de l'endpoint.
fn compute_config_id(roots: &[Arc<SsdpDevice>], endpoint: &EndpointConfiguration, http_port: u16) -> u32 {
    fn hash_device(device: &SsdpDevice, hasher: &mut DefaultHasher) {
        device.udn().hash(hasher);
        device.device_type().hash(hasher);
        device.version().hash(hasher);
        device.description_path().hash(hasher);
        for service in device.services() {
            service.service_type().hash(hasher);
            service.version().hash(hasher);
        }
        for embedded in device.embedded_devices() {
            hash_device(embedded, hasher);
        }
    }

    let mut hasher = DefaultHasher::new();
    for root in roots {
        hash_device(root, &mut hasher);
    }
    endpoint.ip().hash(&mut hasher);
    http_port.hash(&mut hasher);
    (hasher.finish() & 0x00ff_ffff) as u32
}

fn initial_boot_id() -> u32 {
    // BOOTID.UPNP.ORG tient sur 31 bits
    u32::try_from(chrono::Utc::now().timestamp() & 0x7fff_ffff).unwrap_or(1)
}

/// État partagé du serveur SSDP.
#[derive(Debug)]
pub struct ServerData {
    is_active: bool,
    endpoints: Vec<EndpointConfiguration>,
    pending_searches: Vec<PendingSearchRequest>,
    advertisement_expiration_time: u32,
    boot_id: u32,
    advertisement_timer: Option<ReconfigurableTimer>,
    search_response_timer: Option<ReconfigurableTimer>,
}

struct ControllerInner {
    settings: SsdpSettings,
    server_header: String,
    tree: Arc<dyn DeviceTree>,
    data: Mutex<ServerData>,
}

/// Contrôleur SSDP : annonces, réponses aux recherches, endpoints.
pub struct SsdpServerController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for SsdpServerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsdpServerController")
            .field("settings", &self.inner.settings)
            .finish()
    }
}

impl SsdpServerController {
    /// Crée un contrôleur inactif, sans endpoint.
    pub fn new(settings: SsdpSettings, tree: Arc<dyn DeviceTree>) -> Self {
        let server_header = settings.server_header();
        let data = ServerData {
            is_active: false,
            endpoints: Vec::new(),
            pending_searches: Vec::new(),
            advertisement_expiration_time: settings.advertisement_expiration_time,
            boot_id: initial_boot_id(),
            advertisement_timer: None,
            search_response_timer: None,
        };
        Self {
            inner: Arc::new(ControllerInner {
                settings,
                server_header,
                tree,
                data: Mutex::new(data),
            }),
        }
    }

    pub fn settings(&self) -> &SsdpSettings {
        &self.inner.settings
    }

    /// Démarre les timers ; la première annonce part après 0 à 100 ms.
    pub fn start(&self) -> Result<(), SsdpError> {
        let mut data = self.inner.data.lock();
        if data.is_active {
            return Err(SsdpError::AlreadyActive);
        }

        let weak = Arc::downgrade(&self.inner);
        let search_response_timer = ReconfigurableTimer::new(SEARCH_RESPONSE_TIMER_NAME, move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_search_response_timer_elapsed();
            }
            None
        })?;

        let weak = Arc::downgrade(&self.inner);
        let advertisement_timer = ReconfigurableTimer::new(ADVERTISEMENT_TIMER_NAME, move || {
            weak.upgrade()
                .and_then(|inner| inner.on_advertisement_timer_elapsed())
        })?;
        let initial_wait = rand::rng().random_range(0..INITIAL_ADVERTISEMENT_MAX_WAIT_MS);
        advertisement_timer.change(Duration::from_millis(initial_wait));

        data.search_response_timer = Some(search_response_timer);
        data.advertisement_timer = Some(advertisement_timer);
        data.is_active = true;
        info!("✅ SSDP controller started");
        Ok(())
    }

    /// Arrête le contrôleur en deux phases.
    ///
    /// 1. Envoie les byebye tant que les endpoints sont ouverts, puis
    ///    désactive le contrôleur.
    /// 2. Libère les timers en attendant un éventuel callback en cours, puis
    ///    ferme les endpoints.
    pub fn stop(&self) {
        let mut outbox = Outbox::new();
        let (advertisement_timer, search_response_timer) = {
            let mut data = self.inner.data.lock();
            if !data.is_active {
                return;
            }
            self.inner
                .queue_notifications(&data, &MessageSender::ByeBye, &mut outbox);
            data.is_active = false;
            data.pending_searches.clear();
            (
                data.advertisement_timer.take(),
                data.search_response_timer.take(),
            )
        };

        let sent = outbox.flush();
        info!("👋 SSDP advertisements revoked ({} datagrams)", sent);

        for timer in [advertisement_timer, search_response_timer].into_iter().flatten() {
            timer.dispose();
        }

        self.close_ssdp_endpoints();
        info!("✅ SSDP controller stopped");
    }

    pub fn is_active(&self) -> bool {
        self.inner.data.lock().is_active
    }

    /// Envoie un jeu complet d'annonces `ssdp:alive`.
    pub fn advertise(&self) {
        self.send_notifications(&MessageSender::Alive);
    }

    /// Envoie `ssdp:update` avec le BOOTID courant et le suivant, puis
    /// incrémente le BOOTID.
    pub fn update(&self) {
        let mut outbox = Outbox::new();
        {
            let mut data = self.inner.data.lock();
            let next_boot_id = data.boot_id.wrapping_add(1) & 0x7fff_ffff;
            self.inner.queue_notifications(
                &data,
                &MessageSender::Update { next_boot_id },
                &mut outbox,
            );
            data.boot_id = next_boot_id;
        }
        outbox.flush();
    }

    /// Envoie un jeu complet de `ssdp:byebye`.
    pub fn revoke_advertisements(&self) {
        self.send_notifications(&MessageSender::ByeBye);
    }

    fn send_notifications(&self, sender: &MessageSender) {
        let mut outbox = Outbox::new();
        {
            let data = self.inner.data.lock();
            self.inner.queue_notifications(&data, sender, &mut outbox);
        }
        outbox.flush();
    }

    /// Recalcule le CONFIGID de chaque endpoint et ré-annonce.
    ///
    /// À appeler quand l'arbre des devices a changé.
    pub fn update_configuration(&self) {
        let mut outbox = Outbox::new();
        {
            let mut data = self.inner.data.lock();
            let roots = self.inner.tree.root_devices();
            let http_port = self.inner.settings.http_port;
            for endpoint in data.endpoints.iter_mut() {
                let config_id = compute_config_id(&roots, endpoint, http_port);
                endpoint.set_config_id(config_id);
            }
            if data.is_active {
                self.inner
                    .queue_notifications(&data, &MessageSender::Alive, &mut outbox);
            }
        }
        outbox.flush();
    }

    pub fn advertisement_expiration_time(&self) -> u32 {
        self.inner.data.lock().advertisement_expiration_time
    }

    pub fn set_advertisement_expiration_time(&self, seconds: u32) {
        self.inner.data.lock().advertisement_expiration_time = seconds;
    }

    pub fn boot_id(&self) -> u32 {
        self.inner.data.lock().boot_id
    }

    /// Lie les sockets d'une interface et l'ajoute aux endpoints.
    pub fn start_ssdp_endpoint(&self, interface: &InterfaceAddress) -> Result<(), SsdpError> {
        let endpoint = EndpointConfiguration::bind(interface, &self.inner.settings)?;
        self.add_endpoint(endpoint)
    }

    /// Ajoute un endpoint déjà lié et démarre ses boucles de réception.
    ///
    /// Un endpoint existant pour la même adresse est remplacé.
    pub fn add_endpoint(&self, mut endpoint: EndpointConfiguration) -> Result<(), SsdpError> {
        let ip = endpoint.ip();
        let shutdown = endpoint.shutdown_flag();

        let mut sockets = vec![Arc::clone(endpoint.unicast_socket())];
        if let Some(socket) = endpoint.multicast_socket() {
            sockets.push(Arc::clone(socket));
        }
        for socket in sockets {
            let weak = Arc::downgrade(&self.inner);
            let shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("ssdp-recv-{}", ip))
                .spawn(move || receive_loop(weak, socket, ip, shutdown))?;
            endpoint.push_receive_thread(handle);
        }

        let roots = self.inner.tree.root_devices();
        endpoint.set_config_id(compute_config_id(&roots, &endpoint, self.inner.settings.http_port));

        let replaced = {
            let mut data = self.inner.data.lock();
            let replaced = take_endpoints(&mut data.endpoints, |e| e.ip() == ip);
            data.endpoints.push(endpoint);
            replaced
        };
        for old in replaced {
            old.close(true);
        }
        Ok(())
    }

    /// Ferme l'endpoint d'une adresse. Retourne `false` s'il n'existait pas.
    ///
    /// `exit_multicast_group` doit être faux si l'interface a disparu.
    pub fn close_ssdp_endpoint(&self, ip: IpAddr, exit_multicast_group: bool) -> bool {
        let removed = {
            let mut data = self.inner.data.lock();
            take_endpoints(&mut data.endpoints, |e| e.ip() == ip)
        };
        let found = !removed.is_empty();
        for endpoint in removed {
            endpoint.close(exit_multicast_group);
        }
        found
    }

    /// Ferme tous les endpoints.
    pub fn close_ssdp_endpoints(&self) {
        let endpoints = std::mem::take(&mut self.inner.data.lock().endpoints);
        for endpoint in endpoints {
            endpoint.close(true);
        }
    }

    pub fn endpoint_addresses(&self) -> Vec<IpAddr> {
        self.inner.data.lock().endpoints.iter().map(|e| e.ip()).collect()
    }

    /// Port de recherche unicast de l'endpoint `ip`.
    pub fn search_port(&self, ip: IpAddr) -> Option<u16> {
        self.inner
            .data
            .lock()
            .endpoints
            .iter()
            .find(|e| e.ip() == ip)
            .map(|e| e.search_port())
    }

    pub fn pending_search_count(&self) -> usize {
        self.inner.data.lock().pending_searches.len()
    }

    /// Traite une requête SSDP reçue par l'endpoint `endpoint`.
    ///
    /// Seul M-SEARCH est traité ; les autres méthodes sont ignorées.
    pub fn handle_ssdp_request(
        &self,
        request: &SimpleHttpRequest,
        endpoint: IpAddr,
        requester: SocketAddr,
    ) -> Result<(), SsdpError> {
        self.inner.handle_ssdp_request(request, endpoint, requester)
    }

    /// Point d'entrée des datagrammes reçus.
    pub fn on_ssdp_receive(&self, data: &[u8], endpoint: IpAddr, requester: SocketAddr) {
        self.inner.on_ssdp_receive(data, endpoint, requester);
    }
}

impl Drop for SsdpServerController {
    fn drop(&mut self) {
        self.stop();
        self.close_ssdp_endpoints();
    }
}

fn take_endpoints<F>(endpoints: &mut Vec<EndpointConfiguration>, pred: F) -> Vec<EndpointConfiguration>
where
    F: Fn(&EndpointConfiguration) -> bool,
{
    let mut taken = Vec::new();
    let mut index = 0;
    while index < endpoints.len() {
        if pred(&endpoints[index]) {
            taken.push(endpoints.remove(index));
        } else {
            index += 1;
        }
    }
    taken
}

impl ControllerInner {
    fn message_context<'a>(&'a self, data: &ServerData) -> MessageContext<'a> {
        MessageContext {
            settings: &self.settings,
            server_header: &self.server_header,
            boot_id: data.boot_id,
            expiration: data.advertisement_expiration_time,
        }
    }

    fn queue_notifications(&self, data: &ServerData, sender: &MessageSender, outbox: &mut Outbox) {
        let roots = self.tree.root_devices();
        let ctx = self.message_context(data);
        for_each_notification(&roots, |nt, usn, root| {
            sender.queue_message(&ctx, &data.endpoints, nt, usn, root, outbox);
        });
    }

    fn on_advertisement_timer_elapsed(&self) -> Option<Duration> {
        let timeout = Duration::from_millis(self.settings.timer_lock_timeout_ms);
        let Some(data) = self.data.try_lock_for(timeout) else {
            error!("❌ Cannot acquire synchronization lock. Maybe a deadlock happened.");
            return Some(advertisement_repetition_time(
                self.settings.advertisement_expiration_time,
                self.settings.min_advertisement_interval,
            ));
        };
        if !data.is_active {
            return None;
        }

        let mut outbox = Outbox::new();
        self.queue_notifications(&data, &MessageSender::Alive, &mut outbox);
        let next = advertisement_repetition_time(
            data.advertisement_expiration_time,
            self.settings.min_advertisement_interval,
        );
        drop(data);

        let sent = outbox.flush();
        debug!("📡 SSDP advertisement sent ({} datagrams), next in {:?}", sent, next);
        Some(next)
    }

    fn on_search_response_timer_elapsed(&self) {
        let mut outbox = Outbox::new();
        {
            let mut data = self.data.lock();
            if !data.is_active {
                return;
            }
            let pending = std::mem::take(&mut data.pending_searches);
            if pending.is_empty() {
                return;
            }
            let roots = self.tree.root_devices();
            for search in &pending {
                self.process_search_request(&data, &roots, search, &mut outbox);
            }
        }
        outbox.flush();
    }

    fn process_search_request(
        &self,
        data: &ServerData,
        roots: &[Arc<SsdpDevice>],
        search: &PendingSearchRequest,
        outbox: &mut Outbox,
    ) {
        if !data.endpoints.iter().any(|e| e.ip() == search.endpoint) {
            debug!(
                "SSDP endpoint {} closed, dropping search '{}' from {}",
                search.endpoint, search.st, search.requester
            );
            return;
        }

        let sender = MessageSender::SearchResult {
            endpoint: search.endpoint,
            requester: search.requester,
        };
        let ctx = self.message_context(data);
        let mut send = |nt: &str, usn: &str, root: &SsdpDevice| {
            sender.queue_message(&ctx, &data.endpoints, nt, usn, root, outbox);
        };

        let st = search.st.as_str();
        if st == "ssdp:all" {
            for_each_notification(roots, |nt, usn, root| send(nt, usn, root.as_ref()));
        } else if st == "upnp:rootdevice" {
            for root in roots {
                let usn = format!("{}::upnp:rootdevice", root.udn());
                send("upnp:rootdevice", &usn, root.as_ref());
            }
        } else if st.starts_with("uuid:") {
            if let Some((device, root)) = find_device_by_udn(roots, st) {
                send(device.udn(), device.udn(), root.as_ref());
            }
        } else if st.starts_with("urn:") && (st.contains(":device:") || st.contains(":service:")) {
            let Some((search_type, version)) = parse_type_version_urn(st) else {
                debug!("Problem parsing UPnP device or service search query '{}'", st);
                return;
            };
            if search_type.contains(":device:") {
                for root in roots {
                    for device in root.find_devices_by_type_and_version(&search_type, version, true) {
                        let urn = device.device_type_version_urn();
                        let usn = format!("{}::{}", device.udn(), urn);
                        send(&urn, &usn, root.as_ref());
                    }
                }
            } else {
                for root in roots {
                    for (device, service) in
                        root.find_services_by_type_and_version(&search_type, version, true)
                    {
                        let urn = service.service_type_version_urn();
                        let usn = format!("{}::{}", device.udn(), urn);
                        send(&urn, &usn, root.as_ref());
                    }
                }
            }
        }
    }

    fn handle_ssdp_request(
        &self,
        request: &SimpleHttpRequest,
        endpoint: IpAddr,
        requester: SocketAddr,
    ) -> Result<(), SsdpError> {
        if request.method != "M-SEARCH" {
            return Ok(());
        }
        if request.param != "*" || request.header("MAN") != Some("\"ssdp:discover\"") {
            return Err(SsdpError::MalformedRequest(
                "unsupported M-SEARCH request".to_string(),
            ));
        }

        // Pas de distinction multicast / unicast : MX absent = réponse immédiate
        let mx = parse_mx(request.header("MX"))?;
        let st = request
            .header("ST")
            .filter(|st| !st.is_empty())
            .ok_or_else(|| SsdpError::MalformedRequest("missing ST header".to_string()))?;
        if let Some(user_agent) = request.header("USER-AGENT") {
            parse_user_agent_upnp1_minor_version(user_agent, self.settings.lax_user_agent_parsing)?;
        }

        self.delay_search_response(PendingSearchRequest::new(st, endpoint, requester), mx);
        Ok(())
    }

    fn delay_search_response(&self, search: PendingSearchRequest, mx: u32) {
        let mut data = self.data.lock();
        if !data.is_active {
            return;
        }
        debug!(
            "📡 M-SEARCH from {} for ST={} queued (MX={})",
            search.requester, search.st, mx
        );
        data.pending_searches.push(search);
        if let Some(timer) = &data.search_response_timer {
            timer.change(search_response_delay(mx));
        }
    }

    fn on_ssdp_receive(&self, data: &[u8], endpoint: IpAddr, requester: SocketAddr) {
        if !self.data.lock().is_active {
            return;
        }
        let result = SimpleHttpRequest::parse(data)
            .and_then(|request| self.handle_ssdp_request(&request, endpoint, requester));
        if let Err(e) = result {
            debug!(
                "Problem handling incoming SSDP packet at IP endpoint {} from {}: {}",
                endpoint, requester, e
            );
        }
    }
}

fn receive_loop(
    inner: Weak<ControllerInner>,
    socket: Arc<UdpSocket>,
    endpoint: IpAddr,
    shutdown: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; UDP_SSDP_RECEIVE_BUFFER_SIZE];
    while !shutdown.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, requester)) => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.on_ssdp_receive(&buf[..len], endpoint, requester);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                warn!("❌ SSDP read error at IP endpoint {}: {}", endpoint, e);
                thread::sleep(RECEIVE_POLL_INTERVAL);
            }
        }
    }
    info!("Stopping listening for SSDP messages at IP endpoint {}", endpoint);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DeviceRegistry;

    #[test]
    fn test_advertisement_repetition_time_default_range() {
        for _ in 0..100 {
            let delay = advertisement_repetition_time(1800, 600);
            assert!(delay >= Duration::from_secs(600));
            assert!(delay < Duration::from_secs(900));
        }
    }

    #[test]
    fn test_advertisement_repetition_time_short_expiration() {
        for _ in 0..100 {
            assert!(advertisement_repetition_time(100, 600) < Duration::from_secs(50));
        }
        assert_eq!(advertisement_repetition_time(1, 600), Duration::ZERO);
        assert_eq!(
            advertisement_repetition_time(1200, 600),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_search_response_delay() {
        assert_eq!(search_response_delay(0), Duration::ZERO);
        for _ in 0..100 {
            assert!(search_response_delay(5) < Duration::from_secs(5));
            assert!(search_response_delay(1) < Duration::from_secs(1));
        }
    }

    #[test]
    fn test_search_response_delay_is_clamped_for_large_mx() {
        let mx = parse_mx(Some("120")).unwrap();
        for _ in 0..100 {
            assert!(search_response_delay(mx) < Duration::from_secs(5));
        }
    }

    fn loopback_controller(listener: &UdpSocket) -> SsdpServerController {
        let settings = SsdpSettings {
            use_ipv6: false,
            multicast_port: listener.local_addr().unwrap().port(),
            search_port: 0,
            notify_repeat: 1,
            timer_lock_timeout_ms: 50,
            ..Default::default()
        };
        let registry = DeviceRegistry::new();
        registry.add_root_device(
            SsdpDevice::new("abc", "urn:schemas-upnp-org:device:MediaServer", 1, "/desc.xml")
                .unwrap(),
        );
        let controller = SsdpServerController::new(settings.clone(), Arc::new(registry));

        let mut endpoint =
            EndpointConfiguration::bind(&InterfaceAddress::loopback_v4(), &settings).unwrap();
        endpoint.set_multicast_address(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
        controller.add_endpoint(endpoint).unwrap();
        controller
    }

    #[test]
    fn test_advertisement_tick_skipped_while_lock_is_held() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let controller = loopback_controller(&listener);
        // actif sans timers : les ticks sont déclenchés à la main
        controller.inner.data.lock().is_active = true;

        let guard = controller.inner.data.lock();
        let inner = Arc::clone(&controller.inner);
        let next = thread::spawn(move || inner.on_advertisement_timer_elapsed())
            .join()
            .unwrap()
            .expect("timer must re-arm after a lock timeout");
        drop(guard);

        assert!(next >= Duration::from_secs(600));
        assert!(next < Duration::from_secs(900));
        let mut buf = [0u8; 2048];
        assert!(listener.recv_from(&mut buf).is_err(), "no NOTIFY on a skipped tick");

        // le tick suivant annonce normalement
        assert!(controller.inner.on_advertisement_timer_elapsed().is_some());
        let mut alive = 0;
        while let Ok((len, _)) = listener.recv_from(&mut buf) {
            assert!(buf[..len].starts_with(b"NOTIFY * HTTP/1.1\r\n"));
            alive += 1;
        }
        assert_eq!(alive, 3);
    }

    #[test]
    fn test_unbindable_endpoint_leaves_others_serving() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        let controller = loopback_controller(&listener);
        let absent = InterfaceAddress {
            name: "absent".to_string(),
            ip: "192.0.2.123".parse().unwrap(),
            index: 0,
        };

        let result = controller.start_ssdp_endpoint(&absent);

        assert!(matches!(result, Err(SsdpError::Bind { .. })));
        assert_eq!(
            controller.endpoint_addresses(),
            vec![IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)]
        );
    }

    #[test]
    fn test_config_id_fits_24_bits_and_tracks_tree() {
        let settings = SsdpSettings {
            multicast_port: 0,
            search_port: 0,
            ..Default::default()
        };
        let endpoint =
            EndpointConfiguration::bind(&InterfaceAddress::loopback_v4(), &settings).unwrap();
        let a = vec![Arc::new(
            SsdpDevice::new("a", "urn:schemas-upnp-org:device:MediaServer", 1, "/a.xml").unwrap(),
        )];
        let b = vec![Arc::new(
            SsdpDevice::new("b", "urn:schemas-upnp-org:device:MediaServer", 1, "/a.xml").unwrap(),
        )];

        let id_a = compute_config_id(&a, &endpoint, 8080);
        assert!(id_a <= 0x00ff_ffff);
        assert_eq!(id_a, compute_config_id(&a, &endpoint, 8080));
        assert_ne!(id_a, compute_config_id(&b, &endpoint, 8080));
    }
}
