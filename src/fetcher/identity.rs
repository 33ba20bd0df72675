//! Per-attempt browser identity rotation.
//!
//! Every attempt presents a fresh combination of user agent, referer, and a spoofed
//! forwarded-for address, so repeated requests do not share a recognizable signature.

use rand::Rng;
use rand::seq::SliceRandom;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.2420.81",
];

const REFERERS: &[&str] = &[
    "https://www.google.com/",
    "https://www.bing.com/",
    "https://duckduckgo.com/",
    "https://search.yahoo.com/",
    "https://www.ecosia.org/",
];

/// Identity presented by one fetch attempt.
#[derive(Debug, Clone)]
pub(crate) struct Identity {
    /// User agent header value.
    pub user_agent: &'static str,
    /// Referer header value.
    pub referer: &'static str,
    /// Spoofed `X-Forwarded-For` address.
    pub forwarded_for: String,
}

impl Identity {
    /// Draw a random identity from the pools.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            user_agent: USER_AGENTS
                .choose(&mut rng)
                .copied()
                .unwrap_or(USER_AGENTS[0]),
            referer: REFERERS.choose(&mut rng).copied().unwrap_or(REFERERS[0]),
            forwarded_for: spoofed_forwarded_for(&mut rng),
        }
    }
}

/// Synthesize a plausible public IPv4 address.
fn spoofed_forwarded_for<R: Rng>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.gen_range(11..=200u8),
        rng.gen_range(0..=255u8),
        rng.gen_range(0..=255u8),
        rng.gen_range(1..=254u8)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_identity_draws_from_pools() {
        let identity = Identity::random();
        assert!(USER_AGENTS.contains(&identity.user_agent));
        assert!(REFERERS.contains(&identity.referer));
    }

    #[test]
    fn forwarded_for_is_a_valid_ipv4() {
        let identity = Identity::random();
        let parsed: std::net::Ipv4Addr = identity
            .forwarded_for
            .parse()
            .expect("forwarded-for parses as IPv4");
        assert!(!parsed.is_loopback());
    }
}
