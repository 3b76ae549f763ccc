//! Preset networks
//!
//! Hardcoded bootstrap relays of the public networks, as published by the
//! network operators. Order matters: callers address relays by index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// One bootstrap relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub multiaddr: &'static str,
    pub peer_id: &'static str,
}

const fn node(multiaddr: &'static str, peer_id: &'static str) -> Node {
    Node { multiaddr, peer_id }
}

pub const KRASNODAR: &[Node] = &[
    node(
        "/dns4/kras-00.fluence.dev/tcp/19990/wss/p2p/12D3KooWSD5PToNiLQwKDXsu8JSysCwUt8BVUJEqCHcDe7P5h45e",
        "12D3KooWSD5PToNiLQwKDXsu8JSysCwUt8BVUJEqCHcDe7P5h45e",
    ),
    node(
        "/dns4/kras-00.fluence.dev/tcp/19001/wss/p2p/12D3KooWR4cv1a8tv7pps4HH6wePNaK6gf1Hww5wcCMzeWxyNw51",
        "12D3KooWR4cv1a8tv7pps4HH6wePNaK6gf1Hww5wcCMzeWxyNw51",
    ),
    node(
        "/dns4/kras-01.fluence.dev/tcp/19001/wss/p2p/12D3KooWKnEqMfYo9zvfHmqTLpLdiHXPe4SVqUWcWHDJdFGrSmcA",
        "12D3KooWKnEqMfYo9zvfHmqTLpLdiHXPe4SVqUWcWHDJdFGrSmcA",
    ),
    node(
        "/dns4/kras-02.fluence.dev/tcp/19001/wss/p2p/12D3KooWHLxVhUQyAuZe6AHMB29P7wkvTNMn7eDMcsqimJYLKREf",
        "12D3KooWHLxVhUQyAuZe6AHMB29P7wkvTNMn7eDMcsqimJYLKREf",
    ),
    node(
        "/dns4/kras-03.fluence.dev/tcp/19001/wss/p2p/12D3KooWJd3HaMJ1rpLY1kQvcjRPEvnDwcXrH8mJvk7ypcZXqXGE",
        "12D3KooWJd3HaMJ1rpLY1kQvcjRPEvnDwcXrH8mJvk7ypcZXqXGE",
    ),
    node(
        "/dns4/kras-04.fluence.dev/tcp/19001/wss/p2p/12D3KooWFEwNWcHqi9rtsmDhsYcDbRUCDXH84RC4FW6UfsFWaoHi",
        "12D3KooWFEwNWcHqi9rtsmDhsYcDbRUCDXH84RC4FW6UfsFWaoHi",
    ),
    node(
        "/dns4/kras-05.fluence.dev/tcp/19001/wss/p2p/12D3KooWCMr9mU894i8JXAFqpgoFtx6qnV1LFPSfVc3Y34N4h4LS",
        "12D3KooWCMr9mU894i8JXAFqpgoFtx6qnV1LFPSfVc3Y34N4h4LS",
    ),
    node(
        "/dns4/kras-06.fluence.dev/tcp/19001/wss/p2p/12D3KooWDUszU2NeWyUVjCXhGEt1MoZrhvdmaQQwtZUriuGN1jTr",
        "12D3KooWDUszU2NeWyUVjCXhGEt1MoZrhvdmaQQwtZUriuGN1jTr",
    ),
    node(
        "/dns4/kras-07.fluence.dev/tcp/19001/wss/p2p/12D3KooWEFFCZnar1cUJQ3rMWjvPQg6yMV2aXWs2DkJNSRbduBWn",
        "12D3KooWEFFCZnar1cUJQ3rMWjvPQg6yMV2aXWs2DkJNSRbduBWn",
    ),
    node(
        "/dns4/kras-08.fluence.dev/tcp/19001/wss/p2p/12D3KooWFtf3rfCDAfWwt6oLZYZbDfn9Vn7bv7g6QjjQxUUEFVBt",
        "12D3KooWFtf3rfCDAfWwt6oLZYZbDfn9Vn7bv7g6QjjQxUUEFVBt",
    ),
    node(
        "/dns4/kras-09.fluence.dev/tcp/19001/wss/p2p/12D3KooWD7CvsYcpF9HE9CCV9aY3SJ317tkXVykjtZnht2EbzDPm",
        "12D3KooWD7CvsYcpF9HE9CCV9aY3SJ317tkXVykjtZnht2EbzDPm",
    ),
];

pub const STAGE: &[Node] = &[
    node(
        "/dns4/stage.fluence.dev/tcp/19001/wss/p2p/12D3KooWDcpWuyrMTDinqNgmXAuRdfd2mTdY9VoXZSAet2pDzh6r",
        "12D3KooWDcpWuyrMTDinqNgmXAuRdfd2mTdY9VoXZSAet2pDzh6r",
    ),
    node(
        "/dns4/stage.fluence.dev/tcp/19002/wss/p2p/12D3KooWHCJbJKGDfCgHSoCuK9q4STyRnVveqLoXAPBbXHTZx9Cv",
        "12D3KooWHCJbJKGDfCgHSoCuK9q4STyRnVveqLoXAPBbXHTZx9Cv",
    ),
    node(
        "/dns4/stage.fluence.dev/tcp/19003/wss/p2p/12D3KooWMigkP4jkVyufq5JnDJL6nXvyjeaDNpRfEZqQhsG3sYCU",
        "12D3KooWMigkP4jkVyufq5JnDJL6nXvyjeaDNpRfEZqQhsG3sYCU",
    ),
    node(
        "/dns4/stage.fluence.dev/tcp/19004/wss/p2p/12D3KooWMMGdfVEJ1rWe1nH1nehYDzNEHhg5ogdfiGk88AupCMnf",
        "12D3KooWMMGdfVEJ1rWe1nH1nehYDzNEHhg5ogdfiGk88AupCMnf",
    ),
    node(
        "/dns4/stage.fluence.dev/tcp/19005/wss/p2p/12D3KooWJ4bTHirdTFNZpCS72TAzwtdmavTBkkEXtzo6wHL25CtE",
        "12D3KooWJ4bTHirdTFNZpCS72TAzwtdmavTBkkEXtzo6wHL25CtE",
    ),
    node(
        "/dns4/stage.fluence.dev/tcp/19006/wss/p2p/12D3KooWAKNos2KogexTXhrkMZzFYpLHuWJ4PgoAhurSAv7o5CWA",
        "12D3KooWAKNos2KogexTXhrkMZzFYpLHuWJ4PgoAhurSAv7o5CWA",
    ),
];

pub const TESTNET: &[Node] = &[
    node(
        "/dns4/net01.fluence.dev/tcp/19001/wss/p2p/12D3KooWEXNUbCXooUwHrHBbrmjsrpHXoEphPwbjQXEGyzbqKnE9",
        "12D3KooWEXNUbCXooUwHrHBbrmjsrpHXoEphPwbjQXEGyzbqKnE9",
    ),
    node(
        "/dns4/net01.fluence.dev/tcp/19990/wss/p2p/12D3KooWMhVpgfQxBLkQkJed8VFNvgN4iE6MD7xCybb1ZYWW2Gtz",
        "12D3KooWMhVpgfQxBLkQkJed8VFNvgN4iE6MD7xCybb1ZYWW2Gtz",
    ),
    node(
        "/dns4/net02.fluence.dev/tcp/19001/wss/p2p/12D3KooWHk9BjDQBUqnavciRPhAYFvqKBe4ZiPPvde7vDaqgn5er",
        "12D3KooWHk9BjDQBUqnavciRPhAYFvqKBe4ZiPPvde7vDaqgn5er",
    ),
    node(
        "/dns4/net03.fluence.dev/tcp/19001/wss/p2p/12D3KooWBUJifCTgaxAUrcM9JysqCcS4CS8tiYH5hExbdWCAoNwb",
        "12D3KooWBUJifCTgaxAUrcM9JysqCcS4CS8tiYH5hExbdWCAoNwb",
    ),
    node(
        "/dns4/net04.fluence.dev/tcp/19001/wss/p2p/12D3KooWJbJFaZ3k5sNd8DjQgg3aERoKtBAnirEvPV8yp76kEXHB",
        "12D3KooWJbJFaZ3k5sNd8DjQgg3aERoKtBAnirEvPV8yp76kEXHB",
    ),
    node(
        "/dns4/net05.fluence.dev/tcp/19001/wss/p2p/12D3KooWCKCeqLPSgMnDjyFsJuWqREDtKNHx1JEBiwaMXhCLNTRb",
        "12D3KooWCKCeqLPSgMnDjyFsJuWqREDtKNHx1JEBiwaMXhCLNTRb",
    ),
    node(
        "/dns4/net06.fluence.dev/tcp/19001/wss/p2p/12D3KooWKnRcsTpYx9axkJ6d69LPfpPXrkVLe96skuPTAo76LLVH",
        "12D3KooWKnRcsTpYx9axkJ6d69LPfpPXrkVLe96skuPTAo76LLVH",
    ),
];

/// A named public network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Krasnodar,
    Stage,
    Testnet,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Krasnodar, Network::Stage, Network::Testnet];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Krasnodar => "krasnodar",
            Self::Stage => "stage",
            Self::Testnet => "testnet",
        }
    }

    pub fn nodes(&self) -> &'static [Node] {
        match self {
            Self::Krasnodar => KRASNODAR,
            Self::Stage => STAGE,
            Self::Testnet => TESTNET,
        }
    }

    pub fn multiaddrs(&self) -> Vec<&'static str> {
        self.nodes().iter().map(|n| n.multiaddr).collect()
    }

    /// Relay at `index`, as chosen in configuration.
    pub fn relay(&self, index: usize) -> Result<&'static Node, NetworkError> {
        let nodes = self.nodes();
        nodes.get(index).ok_or(NetworkError::RelayIndexOutOfRange {
            network: self.name().to_string(),
            index,
            len: nodes.len(),
        })
    }

    /// Comma-separated list of every network name.
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|n| n.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|n| n.name() == s)
            .ok_or_else(|| NetworkError::UnknownNetwork(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("krasnodar".parse::<Network>().unwrap(), Network::Krasnodar);
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert!(matches!(
            "mainnet".parse::<Network>(),
            Err(NetworkError::UnknownNetwork(_))
        ));
        // Names are exact, not case-folded.
        assert!("Stage".parse::<Network>().is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(Network::names(), "krasnodar, stage, testnet");
    }

    #[test]
    fn test_node_lists_are_consistent() {
        for network in Network::ALL {
            assert!(!network.nodes().is_empty());
            for node in network.nodes() {
                assert!(node.multiaddr.ends_with(&format!("/p2p/{}", node.peer_id)));
                assert!(node.multiaddr.contains("/wss/"));
            }
        }
    }

    #[test]
    fn test_multiaddrs_order() {
        let addrs = Network::Krasnodar.multiaddrs();
        assert_eq!(addrs.len(), KRASNODAR.len());
        assert_eq!(addrs[0], KRASNODAR[0].multiaddr);
    }

    #[test]
    fn test_relay_index() {
        assert_eq!(Network::Stage.relay(0).unwrap(), &STAGE[0]);
        assert!(matches!(
            Network::Stage.relay(100),
            Err(NetworkError::RelayIndexOutOfRange { index: 100, .. })
        ));
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&Network::Krasnodar).unwrap();
        assert_eq!(json, "\"krasnodar\"");
    }
}
