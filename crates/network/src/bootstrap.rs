//! Bootstrap address utilities
//!
//! Parsing of relay multiaddr strings into the pieces the bridge needs: the
//! relay's peer id, the dialable address, and the websocket URL of its
//! client endpoint.

use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};

use crate::error::NetworkError;

/// Parse a single bootstrap address.
///
/// Expected format: `/<dns4|ip4|...>/<HOST>/tcp/<PORT>[/ws|/wss]/p2p/<PEER_ID>`
///
/// Returns `(PeerId, dial_addr)` where `dial_addr` has the `/p2p/...` suffix removed.
pub fn parse_bootstrap_addr(addr_str: &str) -> Result<(PeerId, Multiaddr), NetworkError> {
    let addr: Multiaddr = addr_str
        .parse()
        .map_err(|e: libp2p::multiaddr::Error| NetworkError::InvalidMultiaddr {
            addr: addr_str.to_string(),
            reason: e.to_string(),
        })?;

    let peer_id =
        peer_id_of(&addr).ok_or_else(|| NetworkError::MissingPeerId(addr_str.to_string()))?;

    let dial_addr: Multiaddr = addr
        .iter()
        .filter(|proto| !matches!(proto, Protocol::P2p(_)))
        .collect();

    Ok((peer_id, dial_addr))
}

/// Parse multiple bootstrap addresses, skipping any that fail to parse.
pub fn parse_bootstrap_nodes(addrs: &[&str]) -> Vec<(PeerId, Multiaddr)> {
    addrs
        .iter()
        .filter_map(|addr_str| parse_bootstrap_addr(addr_str).ok())
        .collect()
}

/// The `/p2p/<id>` component of an address, if present.
pub fn peer_id_of(addr: &Multiaddr) -> Option<PeerId> {
    addr.iter().find_map(|proto| match proto {
        Protocol::P2p(peer_id) => Some(peer_id),
        _ => None,
    })
}

/// Map a websocket multiaddr to the URL a websocket client dials.
///
/// `/dns4/host/tcp/443/wss/p2p/..` becomes `wss://host:443`.
pub fn multiaddr_to_ws_url(addr: &Multiaddr) -> Result<String, NetworkError> {
    let mut host: Option<String> = None;
    let mut port: Option<u16> = None;
    let mut scheme: Option<(&'static str, String)> = None;

    for proto in addr.iter() {
        match proto {
            Protocol::Dns(h) | Protocol::Dns4(h) | Protocol::Dns6(h) => host = Some(h.to_string()),
            Protocol::Ip4(ip) => host = Some(ip.to_string()),
            Protocol::Ip6(ip) => host = Some(format!("[{}]", ip)),
            Protocol::Tcp(p) => port = Some(p),
            Protocol::Ws(path) => scheme = Some(("ws", path.to_string())),
            Protocol::Wss(path) => scheme = Some(("wss", path.to_string())),
            _ => {}
        }
    }

    match (scheme, host, port) {
        (Some((scheme, path)), Some(host), Some(port)) => {
            let path = if path == "/" { String::new() } else { path };
            Ok(format!("{}://{}:{}{}", scheme, host, port, path))
        }
        _ => Err(NetworkError::NotWebSocket(addr.to_string())),
    }
}

/// Construct a websocket relay multiaddr string from components.
pub fn make_relay_addr(host: &str, port: u16, secure: bool, peer_id: &str) -> String {
    let ws = if secure { "wss" } else { "ws" };
    format!("/dns4/{}/tcp/{}/{}/p2p/{}", host, port, ws, peer_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: &str = "12D3KooWDpJ7As7BWAwRMfu1VU2WCqNjvq387JEYKDBj4kx6nXTN";

    #[test]
    fn test_parse_bootstrap_addr() {
        let addr = format!("/ip4/127.0.0.1/tcp/9000/p2p/{}", PEER);
        let (peer_id, dial_addr) = parse_bootstrap_addr(&addr).unwrap();
        assert_eq!(dial_addr.to_string(), "/ip4/127.0.0.1/tcp/9000");
        assert_eq!(peer_id.to_string(), PEER);
    }

    #[test]
    fn test_parse_invalid_addr() {
        assert!(matches!(
            parse_bootstrap_addr("invalid"),
            Err(NetworkError::InvalidMultiaddr { .. })
        ));
        assert!(matches!(
            parse_bootstrap_addr("/ip4/127.0.0.1/tcp/9000"),
            Err(NetworkError::MissingPeerId(_))
        ));
    }

    #[test]
    fn test_parse_bootstrap_nodes_skips_bad() {
        let good = format!("/ip4/127.0.0.1/tcp/9000/p2p/{}", PEER);
        let peers = parse_bootstrap_nodes(&[good.as_str(), "garbage"]);
        assert_eq!(peers.len(), 1);
        assert!(parse_bootstrap_nodes(&[]).is_empty());
    }

    #[test]
    fn test_wss_url() {
        let addr: Multiaddr = make_relay_addr("kras-00.fluence.dev", 19001, true, PEER)
            .parse()
            .unwrap();
        assert_eq!(multiaddr_to_ws_url(&addr).unwrap(), "wss://kras-00.fluence.dev:19001");
    }

    #[test]
    fn test_ws_url_ip() {
        let addr: Multiaddr = format!("/ip4/127.0.0.1/tcp/9999/ws/p2p/{}", PEER).parse().unwrap();
        assert_eq!(multiaddr_to_ws_url(&addr).unwrap(), "ws://127.0.0.1:9999");
    }

    #[test]
    fn test_tcp_only_is_not_websocket() {
        let addr: Multiaddr = "/ip4/127.0.0.1/tcp/7777".parse().unwrap();
        assert!(matches!(multiaddr_to_ws_url(&addr), Err(NetworkError::NotWebSocket(_))));
    }

    #[test]
    fn test_make_relay_addr() {
        assert_eq!(
            make_relay_addr("stage.fluence.dev", 19001, false, PEER),
            format!("/dns4/stage.fluence.dev/tcp/19001/ws/p2p/{}", PEER)
        );
    }
}
