//! `default-peers <network>`: print the preset relay multiaddrs of a network.

use std::process::ExitCode;

use aquabridge_logging::LogLevel;
use aquabridge_network::Network;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "default-peers")]
#[command(version, about = "Print the bootstrap relays of a public network", long_about = None)]
struct Cli {
    /// Network name (krasnodar, stage, testnet)
    network: Option<String>,
}

fn resolve(network: Option<&str>) -> Result<Network, String> {
    let names = Network::names();
    let name = network.ok_or_else(|| format!("Expected at least one argument ({})", names))?;
    name.parse()
        .map_err(|_| format!("Invalid argument. Expected one of: {}", names))
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprint!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let _ = aquabridge_logging::try_init(LogLevel::Warn);

    match resolve(cli.network.as_deref()) {
        Ok(network) => {
            debug!("Listing {} relays of {}", network.nodes().len(), network);
            for addr in network.multiaddrs() {
                println!("{}", addr);
            }
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_networks() {
        assert_eq!(resolve(Some("krasnodar")), Ok(Network::Krasnodar));
        assert_eq!(resolve(Some("stage")), Ok(Network::Stage));
        assert_eq!(resolve(Some("testnet")), Ok(Network::Testnet));
    }

    #[test]
    fn test_resolve_missing() {
        assert_eq!(
            resolve(None).unwrap_err(),
            "Expected at least one argument (krasnodar, stage, testnet)"
        );
    }

    #[test]
    fn test_resolve_unknown() {
        assert_eq!(
            resolve(Some("mainnet")).unwrap_err(),
            "Invalid argument. Expected one of: krasnodar, stage, testnet"
        );
        assert!(resolve(Some("Krasnodar")).is_err());
    }

    #[test]
    fn test_cli_parses_single_positional() {
        let cli = Cli::try_parse_from(["default-peers", "stage"]).unwrap();
        assert_eq!(cli.network.as_deref(), Some("stage"));

        let cli = Cli::try_parse_from(["default-peers"]).unwrap();
        assert!(cli.network.is_none());

        assert!(Cli::try_parse_from(["default-peers", "stage", "extra"]).is_err());
    }
}
