//! Target network matching
//!
//! Classifies observed addresses against the configured target CIDR list.
//! Matching is pure: the engine owns all bookkeeping and stop policy.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use tracing::warn;

/// First network in the ordered list containing `addr`
pub fn first_containing(addr: Ipv4Addr, networks: &[Ipv4Net]) -> Option<Ipv4Net> {
    networks.iter().copied().find(|net| net.contains(&addr))
}

/// Parse `addr` and return the first network containing it.
///
/// Returns `None` for malformed addresses as well as unmatched ones.
pub fn match_network(addr: &str, networks: &[Ipv4Net]) -> Option<Ipv4Net> {
    let addr: Ipv4Addr = addr.parse().ok()?;
    first_containing(addr, networks)
}

/// The /24 subnet containing `addr`
pub fn subnet_of(addr: Ipv4Addr) -> Ipv4Net {
    Ipv4Net::new(addr, 24).expect("/24 is a valid prefix length").trunc()
}

/// Parse configured CIDR strings, skipping malformed entries with a warning
pub fn parse_cidrs(cidrs: &[String]) -> Vec<Ipv4Net> {
    let mut networks = Vec::with_capacity(cidrs.len());
    for cidr in cidrs {
        match cidr.parse::<Ipv4Net>() {
            Ok(net) => networks.push(net),
            Err(e) => warn!("ignoring malformed CIDR {cidr}: {e}"),
        }
    }
    networks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nets(cidrs: &[&str]) -> Vec<Ipv4Net> {
        cidrs.iter().map(|c| c.parse().unwrap()).collect()
    }

    #[test]
    fn matches_first_containing_network() {
        let networks = nets(&["10.0.0.0/24", "10.0.0.0/16"]);
        let hit = match_network("10.0.0.5", &networks).unwrap();
        assert_eq!(hit, "10.0.0.0/24".parse::<Ipv4Net>().unwrap());

        let hit = match_network("10.0.9.5", &networks).unwrap();
        assert_eq!(hit, "10.0.0.0/16".parse::<Ipv4Net>().unwrap());
    }

    #[test]
    fn unmatched_address_returns_none() {
        let networks = nets(&["10.0.0.0/24"]);
        assert_eq!(match_network("11.0.0.1", &networks), None);
    }

    #[test]
    fn malformed_address_returns_none() {
        let networks = nets(&["10.0.0.0/24"]);
        assert_eq!(match_network("not-an-address", &networks), None);
        assert_eq!(match_network("10.0.0.999", &networks), None);
        assert_eq!(match_network("", &networks), None);
    }

    #[test]
    fn subnet_of_truncates_to_slash_24() {
        let subnet = subnet_of("79.174.91.200".parse().unwrap());
        assert_eq!(subnet.to_string(), "79.174.91.0/24");
    }

    #[test]
    fn parse_cidrs_skips_malformed_entries() {
        let parsed = parse_cidrs(&[
            "10.0.0.0/24".to_string(),
            "garbage".to_string(),
            "10.1.0.0/16".to_string(),
        ]);
        assert_eq!(parsed.len(), 2);
    }
}
