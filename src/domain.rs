//! Primary-domain extraction.
//!
//! The admission filter compares hosts by their registrable suffix, e.g.
//! `a.b.example.co.uk` reduces to `example.co.uk`. IP literals pass through
//! unchanged. The multi-label suffix table covers the registries the
//! crawler is pointed at in practice; unknown hosts fall back to their last
//! two labels.

use crate::error::{Error, Result};

// Registrable suffixes that span two labels.
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "ac.uk", "co.uk", "gov.uk", "me.uk", "org.uk", "com.cn", "edu.cn", "gov.cn", "net.cn",
    "org.cn", "com.au", "net.au", "org.au", "co.jp", "ne.jp", "or.jp", "com.br", "com.hk",
    "com.mx", "com.sg", "com.tw", "co.in", "co.kr", "co.nz",
];

/// Reduces a host (optionally `host:port`) to its primary domain.
pub fn primary_domain(host: &str) -> Result<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::illegal_parameter("host is empty"));
    }
    let bare = strip_port(host)?.to_ascii_lowercase();
    if bare.parse::<std::net::IpAddr>().is_ok() {
        return Ok(bare);
    }
    let labels: Vec<&str> = bare.split('.').collect();
    if labels.iter().any(|l| l.is_empty()) {
        return Err(Error::illegal_parameter(format!("host is invalid: {host}")));
    }
    if labels.len() <= 2 {
        return Ok(bare);
    }
    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if MULTI_LABEL_SUFFIXES.contains(&last_two.as_str()) {
        3
    } else {
        2
    };
    Ok(labels[labels.len() - keep..].join("."))
}

fn strip_port(host: &str) -> Result<&str> {
    // Bracketed IPv6 literal, with or without a port.
    if let Some(rest) = host.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| Error::illegal_parameter(format!("host is invalid: {host}")))?;
        return Ok(&rest[..end]);
    }
    // At most one colon means an optional port; more means a raw IPv6.
    if host.bytes().filter(|&b| b == b':').count() > 1 {
        return Ok(host);
    }
    Ok(host.split(':').next().unwrap_or(host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_domains() {
        assert_eq!(primary_domain("example.com").unwrap(), "example.com");
        assert_eq!(primary_domain("www.example.com").unwrap(), "example.com");
        assert_eq!(
            primary_domain("deep.sub.example.com").unwrap(),
            "example.com"
        );
        assert_eq!(primary_domain("a.test").unwrap(), "a.test");
    }

    #[test]
    fn multi_label_suffixes() {
        assert_eq!(
            primary_domain("a.b.example.co.uk").unwrap(),
            "example.co.uk"
        );
        assert_eq!(primary_domain("shop.example.com.cn").unwrap(), "example.com.cn");
    }

    #[test]
    fn ports_are_stripped() {
        assert_eq!(primary_domain("www.example.com:8080").unwrap(), "example.com");
        assert_eq!(primary_domain("a.test:443").unwrap(), "a.test");
    }

    #[test]
    fn ip_literals_pass_through() {
        assert_eq!(primary_domain("127.0.0.1").unwrap(), "127.0.0.1");
        assert_eq!(primary_domain("127.0.0.1:80").unwrap(), "127.0.0.1");
        assert_eq!(primary_domain("[::1]:80").unwrap(), "::1");
    }

    #[test]
    fn case_is_normalized() {
        assert_eq!(primary_domain("WWW.Example.COM").unwrap(), "example.com");
    }

    #[test]
    fn invalid_hosts_rejected() {
        assert!(primary_domain("").is_err());
        assert!(primary_domain("bad..host").is_err());
        assert!(primary_domain(".leading").is_err());
    }
}
