//! Candidate expansion from address ranges
//!
//! Every range spec is parsed up front so a bad spec fails the run before a
//! single candidate is produced. Expansion itself is lazy.

pub mod range;

pub use range::parse_range_spec;

use crate::error::{AppError, Result};
use crate::models::{Candidate, Config, RangeSource};
use crate::types::ExpandMode;
use ipnet::IpNet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Turns range specs into a finite stream of candidates
#[derive(Debug, Clone)]
pub struct CandidateExpander {
    ranges: Vec<IpNet>,
    mode: ExpandMode,
    seed: Option<u64>,
}

impl CandidateExpander {
    /// Parse every spec; fails on the first one that is not a CIDR range or address
    pub fn new<I, S>(specs: I, mode: ExpandMode) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ranges = specs
            .into_iter()
            .map(|spec| parse_range_spec(spec.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            ranges,
            mode,
            seed: None,
        })
    }

    /// Read specs from files and inline text, in source order
    pub fn from_sources(sources: &[RangeSource], mode: ExpandMode) -> Result<Self> {
        if sources.is_empty() {
            return Err(AppError::config(
                "No address ranges configured; set ip_file or ip_text",
            ));
        }

        let mut specs = Vec::new();
        for source in sources {
            match source {
                RangeSource::File(path) => {
                    let content = std::fs::read_to_string(path).map_err(|e| {
                        AppError::io(format!("Failed to read range file {}: {}", path.display(), e))
                    })?;
                    specs.extend(range::file_specs(&content).map(str::to_string));
                }
                RangeSource::Inline(text) => {
                    specs.extend(range::split_inline_specs(text).map(str::to_string));
                }
            }
        }

        if specs.is_empty() {
            return Err(AppError::config("Configured range sources contain no ranges"));
        }

        Self::new(specs, mode)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_sources(&config.range_sources(), config.expand_mode())
    }

    /// Fix the random source so sampling is reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn ranges(&self) -> &[IpNet] {
        &self.ranges
    }

    pub fn mode(&self) -> ExpandMode {
        self.mode
    }

    /// Exact number of candidates the expansion will yield
    pub fn candidate_count(&self) -> u64 {
        let enumerate_all = self.mode == ExpandMode::EnumerateAll;
        self.ranges
            .iter()
            .map(|net| range::candidate_count(net, enumerate_all))
            .sum()
    }

    /// Consume the expander into a lazy candidate iterator
    pub fn into_candidates(self) -> Candidates {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Candidates {
            ranges: self.ranges.into_iter(),
            cursor: None,
            mode: self.mode,
            rng,
            seq: 0,
        }
    }
}

impl IntoIterator for CandidateExpander {
    type Item = Candidate;
    type IntoIter = Candidates;

    fn into_iter(self) -> Self::IntoIter {
        self.into_candidates()
    }
}

/// Position inside the range currently being expanded
#[derive(Debug)]
enum Cursor {
    /// Next unvisited IPv4 address and the last address of the range
    V4 { next: u64, end: u64 },
    /// IPv6 range that still has to yield its single sample
    V6(ipnet::Ipv6Net),
}

/// Lazy, non-restartable candidate sequence
#[derive(Debug)]
pub struct Candidates {
    ranges: std::vec::IntoIter<IpNet>,
    cursor: Option<Cursor>,
    mode: ExpandMode,
    rng: StdRng,
    seq: u64,
}

impl Candidates {
    fn next_address(&mut self) -> Option<IpAddr> {
        loop {
            match self.cursor.take() {
                Some(Cursor::V4 { next, end }) if next <= end => {
                    let (address, following) = match self.mode {
                        ExpandMode::EnumerateAll => (next, next + 1),
                        ExpandMode::SampleOnePerBlock => {
                            let block_end = (next | 0xFF).min(end);
                            (self.rng.random_range(next..=block_end), block_end + 1)
                        }
                    };
                    self.cursor = Some(Cursor::V4 { next: following, end });
                    return Some(IpAddr::V4(Ipv4Addr::from(address as u32)));
                }
                Some(Cursor::V6(net)) => {
                    let hostmask = u128::from(net.hostmask());
                    let host = self.rng.random::<u128>() & hostmask;
                    let address = u128::from(net.network()) | host;
                    return Some(IpAddr::V6(Ipv6Addr::from(address)));
                }
                _ => {
                    let net = self.ranges.next()?;
                    self.cursor = Some(match net {
                        IpNet::V4(v4) => Cursor::V4 {
                            next: u64::from(u32::from(v4.network())),
                            end: u64::from(u32::from(v4.broadcast())),
                        },
                        IpNet::V6(v6) => Cursor::V6(v6),
                    });
                }
            }
        }
    }
}

impl Iterator for Candidates {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        let address = self.next_address()?;
        let candidate = Candidate::new(address, self.seq);
        self.seq += 1;
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    fn expand(specs: &[&str], mode: ExpandMode) -> Vec<Candidate> {
        CandidateExpander::new(specs, mode)
            .unwrap()
            .with_seed(7)
            .into_candidates()
            .collect()
    }

    #[test]
    fn test_sample_one_per_block() {
        let candidates = expand(&["10.1.0.0/22"], ExpandMode::SampleOnePerBlock);
        assert_eq!(candidates.len(), 4);

        let blocks: HashSet<_> = candidates
            .iter()
            .map(|c| match c.address {
                IpAddr::V4(v4) => v4.octets()[2],
                IpAddr::V6(_) => panic!("unexpected IPv6 candidate"),
            })
            .collect();
        assert_eq!(blocks, HashSet::from([0, 1, 2, 3]));
    }

    #[test]
    fn test_sample_stays_inside_small_range() {
        let net: ipnet::Ipv4Net = "10.0.0.128/26".parse().unwrap();
        for seed in 0..50 {
            let candidates: Vec<_> = CandidateExpander::new(["10.0.0.128/26"], ExpandMode::SampleOnePerBlock)
                .unwrap()
                .with_seed(seed)
                .into_candidates()
                .collect();
            assert_eq!(candidates.len(), 1);
            match candidates[0].address {
                IpAddr::V4(v4) => assert!(net.contains(&v4)),
                IpAddr::V6(_) => panic!("unexpected IPv6 candidate"),
            }
        }
    }

    #[test]
    fn test_enumerate_all() {
        let candidates = expand(&["192.168.1.0/30", "10.0.0.1"], ExpandMode::EnumerateAll);
        let addrs: Vec<String> = candidates.iter().map(|c| c.address.to_string()).collect();
        assert_eq!(
            addrs,
            vec!["192.168.1.0", "192.168.1.1", "192.168.1.2", "192.168.1.3", "10.0.0.1"]
        );
    }

    #[test]
    fn test_sequence_numbers_follow_output_order() {
        let candidates = expand(&["10.0.0.0/23", "10.9.9.9"], ExpandMode::SampleOnePerBlock);
        let seqs: Vec<u64> = candidates.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(candidates[2].address.to_string(), "10.9.9.9");
    }

    #[test]
    fn test_ipv6_sampled_once_per_range() {
        let net: ipnet::Ipv6Net = "2606:4700::/32".parse().unwrap();
        for mode in [ExpandMode::SampleOnePerBlock, ExpandMode::EnumerateAll] {
            let candidates = expand(&["2606:4700::/32"], mode);
            assert_eq!(candidates.len(), 1);
            match candidates[0].address {
                IpAddr::V6(v6) => assert!(net.contains(&v6)),
                IpAddr::V4(_) => panic!("unexpected IPv4 candidate"),
            }
        }
    }

    #[test]
    fn test_top_of_address_space() {
        let candidates = expand(&["255.255.255.254/31"], ExpandMode::EnumerateAll);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].address.to_string(), "255.255.255.255");
    }

    #[test]
    fn test_candidate_count_matches_output() {
        let specs = ["1.0.0.0/20", "8.8.8.8", "2400:cb00::/32"];
        for mode in [ExpandMode::SampleOnePerBlock, ExpandMode::EnumerateAll] {
            let expander = CandidateExpander::new(specs, mode).unwrap();
            let expected = expander.candidate_count();
            assert_eq!(expander.into_candidates().count() as u64, expected);
        }
    }

    #[test]
    fn test_invalid_spec_fails_before_expansion() {
        let result = CandidateExpander::new(["1.1.1.0/24", "bogus"], ExpandMode::SampleOnePerBlock);
        match result {
            Err(AppError::InvalidRangeSyntax { spec, .. }) => assert_eq!(spec, "bogus"),
            other => panic!("expected InvalidRangeSyntax, got {:?}", other),
        }
    }

    #[test]
    fn test_from_sources_combines_file_and_inline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# ranges\n10.0.0.0/24\n\n10.0.1.0/24").unwrap();

        let sources = vec![
            RangeSource::File(file.path().to_path_buf()),
            RangeSource::Inline("1.1.1.1,1.0.0.1".to_string()),
        ];
        let expander = CandidateExpander::from_sources(&sources, ExpandMode::SampleOnePerBlock).unwrap();
        assert_eq!(expander.ranges().len(), 4);
        assert_eq!(expander.candidate_count(), 4);
    }

    #[test]
    fn test_from_sources_errors() {
        assert!(matches!(
            CandidateExpander::from_sources(&[], ExpandMode::SampleOnePerBlock),
            Err(AppError::Config(_))
        ));

        let missing = vec![RangeSource::File("/nonexistent/ip.txt".into())];
        assert!(matches!(
            CandidateExpander::from_sources(&missing, ExpandMode::SampleOnePerBlock),
            Err(AppError::Io(_))
        ));

        let blank = vec![RangeSource::Inline(" , ".to_string())];
        assert!(matches!(
            CandidateExpander::from_sources(&blank, ExpandMode::SampleOnePerBlock),
            Err(AppError::Config(_))
        ));
    }
}
