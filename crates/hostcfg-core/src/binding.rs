//! Site binding value type
//!
//! Bindings are leaf values parsed out of the sites section. Certificate
//! and SNI lookups are collaborator interfaces; the engine never touches a
//! real certificate store.

use crate::element::Element;
use std::net::{IpAddr, SocketAddr};

/// Certificate material resolved by a store lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub hash: Vec<u8>,
    pub store_name: String,
}

/// IP-endpoint certificate lookup
pub trait CertificateStore {
    fn query_certificate_info(&self, endpoint: SocketAddr) -> Option<CertificateInfo>;
}

/// Server Name Indication certificate lookup
pub trait SniStore {
    fn query_sni_info(&self, host: &str, port: u16) -> Option<CertificateInfo>;
}

/// One endpoint binding of a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub protocol: String,
    /// Raw `address:port:host` text as stored in the file
    pub binding_information: String,
    /// Parsed address; `None` for the `*` wildcard
    pub address: Option<IpAddr>,
    pub port: Option<u16>,
    pub host: String,
    pub certificate_hash: Option<Vec<u8>>,
    pub certificate_store_name: Option<String>,
    /// Whether the binding uses Server Name Indication
    pub use_sni: bool,
}

impl Binding {
    /// Read a binding from its `<binding>` element
    pub fn from_element(element: &Element) -> Option<Self> {
        let protocol = element.attr("protocol")?.to_string();
        let binding_information = element.attr("bindingInformation")?.to_string();
        let (address, port, host) = parse_binding_information(&binding_information);
        let use_sni = element
            .attr("sslFlags")
            .and_then(|raw| raw.parse::<u32>().ok())
            .map(|flags| flags & 1 != 0)
            .unwrap_or(false);
        Some(Self {
            protocol,
            binding_information,
            address,
            port,
            host,
            certificate_hash: None,
            certificate_store_name: None,
            use_sni,
        })
    }

    /// Whether the binding serves a browsable protocol
    pub fn can_browse(&self) -> bool {
        self.protocol == "http" || self.protocol == "https"
    }

    fn is_default_port(&self) -> bool {
        match (self.protocol.as_str(), self.port) {
            ("http", Some(80)) => true,
            ("https", Some(443)) => true,
            _ => false,
        }
    }

    /// URL a client would use to reach this binding
    pub fn to_url(&self) -> String {
        let authority = if !self.host.is_empty() {
            self.host.clone()
        } else {
            match self.address {
                Some(IpAddr::V6(address)) => format!("[{}]", address),
                Some(address) => address.to_string(),
                None => "localhost".to_string(),
            }
        };
        match self.port {
            Some(port) if !self.is_default_port() => {
                format!("{}://{}:{}/", self.protocol, authority, port)
            }
            _ => format!("{}://{}/", self.protocol, authority),
        }
    }

    /// Refresh certificate material for an https binding
    ///
    /// SNI bindings consult the SNI store first; everything else falls
    /// back to the IP-endpoint store.
    pub fn refresh_certificate(
        &mut self,
        certificates: &dyn CertificateStore,
        sni: &dyn SniStore,
    ) {
        if self.protocol != "https" {
            return;
        }
        let info = if self.use_sni {
            self.port.and_then(|port| sni.query_sni_info(&self.host, port))
        } else {
            match (self.address, self.port) {
                (Some(address), Some(port)) => {
                    certificates.query_certificate_info(SocketAddr::new(address, port))
                }
                _ => None,
            }
        };
        match info {
            Some(info) => {
                self.certificate_hash = Some(info.hash);
                self.certificate_store_name = Some(info.store_name);
            }
            None => {
                self.certificate_hash = None;
                self.certificate_store_name = None;
            }
        }
    }
}

/// Split `address:port:host`; the host is everything after the last colon
fn parse_binding_information(raw: &str) -> (Option<IpAddr>, Option<u16>, String) {
    let Some(last) = raw.rfind(':') else {
        return (None, None, String::new());
    };
    let host = raw[last + 1..].to_string();
    let rest = &raw[..last];
    let Some(next) = rest.rfind(':') else {
        return (None, None, host);
    };
    let port = rest[next + 1..].parse::<u16>().ok();
    let address_text = &rest[..next];
    let address = if address_text == "*" {
        None
    } else {
        address_text.trim_matches(&['[', ']'][..]).parse().ok()
    };
    (address, port, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;
    use std::net::Ipv4Addr;

    struct FixedStore(Option<CertificateInfo>);

    impl CertificateStore for FixedStore {
        fn query_certificate_info(&self, _endpoint: SocketAddr) -> Option<CertificateInfo> {
            self.0.clone()
        }
    }

    impl SniStore for FixedStore {
        fn query_sni_info(&self, _host: &str, _port: u16) -> Option<CertificateInfo> {
            self.0.clone()
        }
    }

    fn binding(markup: &str) -> Binding {
        let element = parse_text(markup).unwrap();
        Binding::from_element(&element).unwrap()
    }

    #[test]
    fn test_parse_wildcard_binding() {
        let binding = binding(r#"<binding protocol="http" bindingInformation="*:8080:localhost" />"#);
        assert_eq!(binding.address, None);
        assert_eq!(binding.port, Some(8080));
        assert_eq!(binding.host, "localhost");
        assert!(binding.can_browse());
        assert_eq!(binding.to_url(), "http://localhost:8080/");
    }

    #[test]
    fn test_parse_explicit_address() {
        let binding =
            binding(r#"<binding protocol="http" bindingInformation="127.0.0.1:80:" />"#);
        assert_eq!(binding.address, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(binding.host, "");
        assert_eq!(binding.to_url(), "http://127.0.0.1/");
    }

    #[test]
    fn test_refresh_certificate_via_sni() {
        let mut binding = binding(
            r#"<binding protocol="https" bindingInformation="*:443:example.test" sslFlags="1" />"#,
        );
        assert!(binding.use_sni);
        let info = CertificateInfo {
            hash: vec![0xab, 0xcd],
            store_name: "WebHosting".to_string(),
        };
        binding.refresh_certificate(&FixedStore(None), &FixedStore(Some(info.clone())));
        assert_eq!(binding.certificate_hash, Some(info.hash));
        assert_eq!(binding.certificate_store_name, Some(info.store_name));
    }

    #[test]
    fn test_refresh_certificate_absent_mapping_clears() {
        let mut binding = binding(
            r#"<binding protocol="https" bindingInformation="127.0.0.1:443:" />"#,
        );
        binding.certificate_hash = Some(vec![1]);
        binding.refresh_certificate(&FixedStore(None), &FixedStore(None));
        assert_eq!(binding.certificate_hash, None);
    }

    #[test]
    fn test_non_https_binding_skips_stores() {
        let mut binding = binding(r#"<binding protocol="net.tcp" bindingInformation="808:*" />"#);
        assert!(!binding.can_browse());
        binding.refresh_certificate(
            &FixedStore(Some(CertificateInfo {
                hash: vec![1],
                store_name: "My".to_string(),
            })),
            &FixedStore(None),
        );
        assert_eq!(binding.certificate_hash, None);
    }
}
