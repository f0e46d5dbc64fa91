//! Analyse des valeurs d'en-têtes SSDP (MX, URN type:version, USER-AGENT).

use crate::errors::SsdpError;

/// Valeur maximale de MX prise en compte (UPnP DA 1.1, §1.3.2).
pub const MAX_MX: u32 = 5;

/// Analyse l'en-tête `MX` d'une requête M-SEARCH.
///
/// - absent → `0` (réponse immédiate)
/// - non numérique ou `< 1` → [`SsdpError::MalformedRequest`]
/// - `> 5` → ramené à `5`
pub fn parse_mx(value: Option<&str>) -> Result<u32, SsdpError> {
    let Some(value) = value else {
        return Ok(0);
    };
    let mx: u32 = value
        .trim()
        .parse()
        .map_err(|_| SsdpError::MalformedRequest(format!("invalid MX value '{}'", value)))?;
    if mx < 1 {
        return Err(SsdpError::MalformedRequest(format!(
            "MX value must be >= 1, got {}",
            mx
        )));
    }
    Ok(mx.min(MAX_MX))
}

/// Sépare une URN `urn:domain:device:Type:ver` en `(urn:domain:device:Type, ver)`.
///
/// Retourne `None` si la version est absente, non numérique ou nulle.
pub fn parse_type_version_urn(urn: &str) -> Option<(String, u32)> {
    if !urn.starts_with("urn:") {
        return None;
    }
    let (type_urn, version) = urn.rsplit_once(':')?;
    let version: u32 = version.parse().ok()?;
    if version == 0 || type_urn.len() <= "urn:".len() {
        return None;
    }
    Some((type_urn.to_string(), version))
}

/// Extrait la version mineure UPnP 1.x d'un en-tête `USER-AGENT`.
///
/// En mode strict, l'en-tête doit avoir exactement la forme
/// `OS/version UPnP/1.x product/version`. En mode laxiste, n'importe quel
/// jeton `UPnP/1.x` séparé par des espaces ou des virgules est accepté, et un
/// en-tête sans jeton UPnP est traité comme UPnP 1.0.
pub fn parse_user_agent_upnp1_minor_version(
    user_agent: &str,
    lax: bool,
) -> Result<u32, SsdpError> {
    let tokens: Vec<&str> = if lax {
        user_agent
            .split([' ', ','])
            .filter(|t| !t.is_empty())
            .collect()
    } else {
        let tokens: Vec<&str> = user_agent.split(' ').collect();
        if tokens.len() != 3 || tokens.iter().any(|t| !t.contains('/')) {
            return Err(SsdpError::MalformedRequest(format!(
                "USER-AGENT '{}' is not of the form 'OS/version UPnP/1.x product/version'",
                user_agent
            )));
        }
        vec![tokens[1]]
    };

    let upnp_token = tokens.iter().find_map(|t| {
        let (name, version) = t.split_once('/')?;
        name.eq_ignore_ascii_case("upnp").then_some(version)
    });

    match upnp_token {
        Some(version) => parse_upnp1_version(version, user_agent),
        None if lax => Ok(0),
        None => Err(SsdpError::MalformedRequest(format!(
            "USER-AGENT '{}' has no UPnP version token",
            user_agent
        ))),
    }
}

fn parse_upnp1_version(version: &str, user_agent: &str) -> Result<u32, SsdpError> {
    let unsupported = || SsdpError::UnsupportedVersion(user_agent.to_string());
    let (major, minor) = version.split_once('.').ok_or_else(unsupported)?;
    match (major.parse::<u32>(), minor.parse::<u32>()) {
        (Ok(1), Ok(minor)) => Ok(minor),
        _ => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mx() {
        assert_eq!(parse_mx(None).unwrap(), 0);
        assert_eq!(parse_mx(Some("3")).unwrap(), 3);
        assert_eq!(parse_mx(Some(" 2 ")).unwrap(), 2);
        assert_eq!(parse_mx(Some("5")).unwrap(), 5);
        assert_eq!(parse_mx(Some("6")).unwrap(), 5);
        assert_eq!(parse_mx(Some("120")).unwrap(), 5);
        assert!(matches!(
            parse_mx(Some("0")),
            Err(SsdpError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_mx(Some("-1")),
            Err(SsdpError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_mx(Some("soon")),
            Err(SsdpError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_parse_type_version_urn() {
        assert_eq!(
            parse_type_version_urn("urn:schemas-upnp-org:device:MediaServer:1"),
            Some(("urn:schemas-upnp-org:device:MediaServer".to_string(), 1))
        );
        assert_eq!(
            parse_type_version_urn("urn:schemas-upnp-org:service:ContentDirectory:3"),
            Some(("urn:schemas-upnp-org:service:ContentDirectory".to_string(), 3))
        );
        assert_eq!(parse_type_version_urn("urn:schemas-upnp-org:device:MediaServer"), None);
        assert_eq!(parse_type_version_urn("urn:schemas-upnp-org:device:MediaServer:0"), None);
        assert_eq!(parse_type_version_urn("uuid:abc:1"), None);
    }

    #[test]
    fn test_user_agent_strict() {
        assert_eq!(
            parse_user_agent_upnp1_minor_version("Linux/6.1 UPnP/1.1 VLC/3.0", false).unwrap(),
            1
        );
        assert!(matches!(
            parse_user_agent_upnp1_minor_version("Linux/6.1, UPnP/1.1, VLC/3.0", false),
            Err(SsdpError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_user_agent_upnp1_minor_version("Linux/6.1 UPnP/2.0 VLC/3.0", false),
            Err(SsdpError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_user_agent_lax() {
        assert_eq!(
            parse_user_agent_upnp1_minor_version("Windows/10, UPnP/1.0, Foo/1", true).unwrap(),
            0
        );
        assert_eq!(
            parse_user_agent_upnp1_minor_version("Mozilla/5.0 (X11)", true).unwrap(),
            0
        );
        assert!(matches!(
            parse_user_agent_upnp1_minor_version("Foo/1 UPnP/2.0", true),
            Err(SsdpError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            parse_user_agent_upnp1_minor_version("Foo/1 UPnP/one", true),
            Err(SsdpError::UnsupportedVersion(_))
        ));
    }
}
