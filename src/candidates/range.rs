//! Range spec parsing

use crate::error::{AppError, Result};
use ipnet::IpNet;
use std::net::IpAddr;

/// Parse a CIDR range or a bare address into a network
///
/// A bare IPv4 address becomes a /32 and a bare IPv6 address a /128. Host
/// bits in a CIDR spec are cleared.
pub fn parse_range_spec(spec: &str) -> Result<IpNet> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_range(spec, "empty range"));
    }

    if trimmed.contains('/') {
        trimmed
            .parse::<IpNet>()
            .map(|net| net.trunc())
            .map_err(|e| AppError::invalid_range(trimmed, e.to_string()))
    } else {
        trimmed
            .parse::<IpAddr>()
            .map(IpNet::from)
            .map_err(|e| AppError::invalid_range(trimmed, e.to_string()))
    }
}

/// Split inline text into specs; commas, whitespace and newlines all separate
pub fn split_inline_specs(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

/// Specs in a range file: one per line, blank lines and `#` comments skipped
pub fn file_specs(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
}

/// Number of candidates a range yields in the given mode
pub fn candidate_count(net: &IpNet, enumerate_all: bool) -> u64 {
    match net {
        IpNet::V4(v4) => {
            let start = u32::from(v4.network());
            let end = u32::from(v4.broadcast());
            if enumerate_all {
                u64::from(end - start) + 1
            } else {
                u64::from((end >> 8) - (start >> 8)) + 1
            }
        }
        IpNet::V6(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr() {
        let net = parse_range_spec("104.16.0.0/13").unwrap();
        assert_eq!(net.to_string(), "104.16.0.0/13");
    }

    #[test]
    fn test_parse_cidr_clears_host_bits() {
        let net = parse_range_spec(" 1.1.1.77/24 ").unwrap();
        assert_eq!(net.to_string(), "1.1.1.0/24");
    }

    #[test]
    fn test_parse_bare_addresses() {
        assert_eq!(parse_range_spec("1.0.0.1").unwrap().prefix_len(), 32);
        assert_eq!(parse_range_spec("2606:4700::1").unwrap().prefix_len(), 128);
    }

    #[test]
    fn test_parse_invalid_specs() {
        for spec in ["", "not-an-ip", "1.2.3.4/33", "300.1.1.1", "1.2.3/24"] {
            match parse_range_spec(spec) {
                Err(AppError::InvalidRangeSyntax { .. }) => {}
                other => panic!("expected InvalidRangeSyntax for {:?}, got {:?}", spec, other),
            }
        }
    }

    #[test]
    fn test_split_inline_specs() {
        let specs: Vec<_> = split_inline_specs("1.1.1.1, 1.0.0.0/24,\n2606:4700::/32 ").collect();
        assert_eq!(specs, vec!["1.1.1.1", "1.0.0.0/24", "2606:4700::/32"]);
    }

    #[test]
    fn test_file_specs_skip_comments_and_blanks() {
        let content = "# cloudflare\n\n173.245.48.0/20\n  103.21.244.0/22 # trailing\n   \n";
        let specs: Vec<_> = file_specs(content).collect();
        assert_eq!(specs, vec!["173.245.48.0/20", "103.21.244.0/22"]);
    }

    #[test]
    fn test_candidate_count() {
        let net = parse_range_spec("10.0.0.0/22").unwrap();
        assert_eq!(candidate_count(&net, false), 4);
        assert_eq!(candidate_count(&net, true), 1024);

        let host = parse_range_spec("10.0.0.9").unwrap();
        assert_eq!(candidate_count(&host, false), 1);
        assert_eq!(candidate_count(&host, true), 1);

        let small = parse_range_spec("10.0.0.128/26").unwrap();
        assert_eq!(candidate_count(&small, false), 1);
        assert_eq!(candidate_count(&small, true), 64);

        let v6 = parse_range_spec("2606:4700::/32").unwrap();
        assert_eq!(candidate_count(&v6, true), 1);
    }
}
