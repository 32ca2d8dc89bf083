use crate::errors::TransportError;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Default port for DNS-over-HTTPS (RFC 8484).
pub const DEFAULT_DOH_PORT: u16 = 443;

/// Well-known query path used when the nameserver address gives none.
pub const DEFAULT_DOH_PATH: &str = "/dns-query";

/// HTTP request method used to carry the DNS message (RFC 8484 §4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl FromStr for HttpMethod {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("get") {
            Ok(HttpMethod::Get)
        } else if s.eq_ignore_ascii_case("post") {
            Ok(HttpMethod::Post)
        } else {
            Err(TransportError::InvalidMethod(s.to_string()))
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// A validated, canonical DoH endpoint.
///
/// Built once from the raw nameserver string at executor construction
/// and immutable afterwards. The canonical form is always
/// `https://<host>:<port>/<path>` with the port defaulting to 443 and
/// the path to `/dns-query` when the input supplied none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DohEndpoint {
    host: String,
    port: u16,
    ipv6: Option<Ipv6Addr>,
    url: String,
}

impl DohEndpoint {
    /// Parse and normalize a nameserver address.
    ///
    /// Accepts a bare host (`dns.google`), `host:port`, a bare or
    /// bracketed IPv6 literal, or a full `https://` URL. Anything with
    /// a non-`https` scheme is rejected.
    pub fn parse(nameserver: &str) -> Result<Self, TransportError> {
        let raw = nameserver.trim();
        if raw.is_empty() {
            return Err(TransportError::InvalidEndpoint(
                "empty nameserver address".to_string(),
            ));
        }

        // Several colons, not enclosed in square brackets and not a URL
        // => bare IPv6 literal, enclose it in square brackets first.
        let bracketed;
        let raw = if !raw.contains("://") && !raw.contains('[') && raw.matches(':').count() >= 2 {
            bracketed = format!("[{raw}]");
            bracketed.as_str()
        } else {
            raw
        };

        let (scheme, rest) = match raw.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => ("https", raw),
        };
        if !scheme.eq_ignore_ascii_case("https") {
            return Err(TransportError::InvalidEndpoint(format!(
                "'{nameserver}': scheme must be https"
            )));
        }

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        let (host, port, ipv6) = Self::parse_authority(nameserver, authority)?;

        let path = if path.is_empty() {
            DEFAULT_DOH_PATH
        } else {
            path
        };

        let url = if ipv6.is_some() {
            format!("https://[{host}]:{port}{path}")
        } else {
            format!("https://{host}:{port}{path}")
        };

        Ok(Self {
            host,
            port,
            ipv6,
            url,
        })
    }

    fn parse_authority(
        original: &str,
        authority: &str,
    ) -> Result<(String, u16, Option<Ipv6Addr>), TransportError> {
        let invalid =
            |detail: &str| TransportError::InvalidEndpoint(format!("'{original}': {detail}"));

        if let Some(rest) = authority.strip_prefix('[') {
            let end = rest.find(']').ok_or_else(|| invalid("unbalanced bracket"))?;
            let host = &rest[..end];
            let address = host
                .parse::<Ipv6Addr>()
                .map_err(|_| invalid("not a valid IPv6 literal"))?;
            let port = match &rest[end + 1..] {
                "" => DEFAULT_DOH_PORT,
                trailer => trailer
                    .strip_prefix(':')
                    .and_then(|p| p.parse::<u16>().ok())
                    .ok_or_else(|| invalid("invalid port"))?,
            };
            return Ok((host.to_string(), port, Some(address)));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| invalid("invalid port"))?;
                (host, port)
            }
            None => (authority, DEFAULT_DOH_PORT),
        };

        if host.is_empty()
            || host
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, ':' | '/' | '@' | '[' | ']'))
        {
            return Err(invalid("missing or malformed host"));
        }

        Ok((host.to_string(), port, None))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The target address when the host is an IPv6 literal.
    ///
    /// Endpoints of this kind need the pre-flight certificate validation
    /// dance: standard TLS hostname verification does not check
    /// IP-literal SAN entries.
    pub fn ipv6_literal(&self) -> Option<Ipv6Addr> {
        self.ipv6
    }

    /// Canonical `https://` request URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FromStr for DohEndpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DohEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_gets_default_port_and_path() {
        let ep = DohEndpoint::parse("dns.google").unwrap();
        assert_eq!(ep.host(), "dns.google");
        assert_eq!(ep.port(), 443);
        assert_eq!(ep.ipv6_literal(), None);
        assert_eq!(ep.url(), "https://dns.google:443/dns-query");
    }

    #[test]
    fn test_host_with_port() {
        let ep = DohEndpoint::parse("dns.google:8443").unwrap();
        assert_eq!(ep.port(), 8443);
        assert_eq!(ep.url(), "https://dns.google:8443/dns-query");
    }

    #[test]
    fn test_ipv4_host() {
        let ep = DohEndpoint::parse("1.1.1.1").unwrap();
        assert_eq!(ep.ipv6_literal(), None);
        assert_eq!(ep.url(), "https://1.1.1.1:443/dns-query");
    }

    #[test]
    fn test_full_url_preserves_explicit_path() {
        let ep = DohEndpoint::parse("https://dns.google/resolve").unwrap();
        assert_eq!(ep.url(), "https://dns.google:443/resolve");
    }

    #[test]
    fn test_full_url_without_path_gets_default() {
        let ep = DohEndpoint::parse("https://cloudflare-dns.com:443").unwrap();
        assert_eq!(ep.url(), "https://cloudflare-dns.com:443/dns-query");
    }

    #[test]
    fn test_bare_ipv6_literal_is_bracketed() {
        let ep = DohEndpoint::parse("2606:4700:4700::1111").unwrap();
        assert_eq!(ep.host(), "2606:4700:4700::1111");
        assert_eq!(
            ep.ipv6_literal(),
            Some("2606:4700:4700::1111".parse().unwrap())
        );
        assert_eq!(ep.url(), "https://[2606:4700:4700::1111]:443/dns-query");
    }

    #[test]
    fn test_bracketed_ipv6_with_port() {
        let ep = DohEndpoint::parse("[2606:4700:4700::1111]:8443").unwrap();
        assert_eq!(ep.port(), 8443);
        assert!(ep.ipv6_literal().is_some());
        assert_eq!(ep.url(), "https://[2606:4700:4700::1111]:8443/dns-query");
    }

    #[test]
    fn test_full_url_with_ipv6_literal() {
        let ep = DohEndpoint::parse("https://[::1]:8053/dns-query").unwrap();
        assert_eq!(ep.ipv6_literal(), Some(Ipv6Addr::LOCALHOST));
        assert_eq!(ep.url(), "https://[::1]:8053/dns-query");
    }

    #[test]
    fn test_http_scheme_rejected() {
        let err = DohEndpoint::parse("http://dns.google/dns-query").unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_garbage_rejected() {
        for bad in ["", "   ", "https://", "dns.google:notaport", "[::1", "a@b"] {
            let err = DohEndpoint::parse(bad).unwrap_err();
            assert!(
                matches!(err, TransportError::InvalidEndpoint(_)),
                "expected InvalidEndpoint for {bad:?}"
            );
        }
    }

    #[test]
    fn test_bracketed_non_ipv6_rejected() {
        let err = DohEndpoint::parse("[not-an-ip]:443").unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_method_parsing_case_insensitive() {
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("PoSt".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
    }

    #[test]
    fn test_method_rejects_anything_else() {
        for bad in ["put", "PUT", "delete", ""] {
            let err = bad.parse::<HttpMethod>().unwrap_err();
            assert_eq!(err, TransportError::InvalidMethod(bad.to_string()));
        }
    }

    #[test]
    fn test_display_is_canonical_url() {
        let ep = DohEndpoint::parse("dns.google").unwrap();
        assert_eq!(ep.to_string(), ep.url());
    }
}
