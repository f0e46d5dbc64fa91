use netstat2::{AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, get_sockets_info};
use sysinfo::{Pid, System};

/// Processus qui occupe un port UDP local.
#[derive(Debug, Clone)]
pub struct PortHolder {
    pub pid: u32,
    pub process_name: String,
    pub owner: String,
    pub port: u16,
}

/// Tente de trouver le processus lié au port UDP `port`.
///
/// Sert à diagnostiquer un port SSDP déjà pris (souvent un autre stack UPnP
/// comme minidlna ou le service SSDP de l'OS) quand on doit se replier sur un
/// port de recherche aléatoire.
///
/// Retourne `Some(PortHolder)` si un processus a pu être identifié, sinon `None`.
pub fn find_udp_port_holder(port: u16) -> Option<PortHolder> {
    let sockets = get_sockets_info(
        AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6,
        ProtocolFlags::UDP,
    )
    .ok()?;

    // Préparer l'inspection des processus.
    let mut system = System::new_all();
    system.refresh_all();

    sockets.into_iter().find_map(|socket| match socket.protocol_socket_info {
        ProtocolSocketInfo::Udp(ref udp_info) if udp_info.local_port == port => {
            build_port_holder(&system, port, socket.associated_pids.first())
        }
        _ => None,
    })
}

fn build_port_holder(system: &System, port: u16, pid_opt: Option<&u32>) -> Option<PortHolder> {
    let pid = *pid_opt?;
    let process = system.process(Pid::from_u32(pid))?;
    let process_name = process.name().to_string();

    let owner = process
        .user_id()
        .and_then(|uid| {
            users::get_user_by_uid(**uid).map(|user| user.name().to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown".to_string());

    Some(PortHolder {
        pid,
        process_name,
        owner,
        port,
    })
}
