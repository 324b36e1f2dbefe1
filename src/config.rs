// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain configuration accepted by `create_domain`.
//!
//! `create_domain` takes either a raw, already-validated [`DomainConfig`] or
//! an XML fragment that wraps one. Only the handful of settings the core
//! itself interprets (domain id, the log-category knobs) are parsed here;
//! anything RTPS/transport-specific is kept as opaque key/value pairs for
//! the external [`crate::rtps::RtpsBinding`] to read back out.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// How a domain's configuration was supplied to `create_domain`.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A pre-built [`DomainConfig`], passed in verbatim.
    ///
    /// Mirrors `dds_domain.c`'s `CFGKIND_RAW`.
    Raw(DomainConfig),
    /// An XML document, parsed on first use.
    ///
    /// Mirrors `dds_domain.c`'s `CFGKIND_XML`.
    Xml(String),
}

impl ConfigSource {
    /// Resolve to a concrete [`DomainConfig`], parsing XML if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the XML is malformed or missing the
    /// `<Domain>` root element.
    pub fn resolve(&self, domain_id: u32) -> Result<DomainConfig> {
        match self {
            ConfigSource::Raw(cfg) => Ok(cfg.clone()),
            ConfigSource::Xml(xml) => parse_domain_xml(xml, domain_id),
        }
    }
}

/// Resolved configuration for a single domain.
///
/// Anything the core does not interpret directly (transport addressing,
/// security certificates, discovery peers) lives in `settings` as opaque
/// strings for the `RtpsBinding` collaborator to consume.
#[derive(Debug, Clone, Default)]
pub struct DomainConfig {
    /// Domain id this configuration applies to, or `None` to accept
    /// whatever `create_domain` was called with (the "use my id" case of
    /// `dds_domain_init`'s default-vs-explicit resolution table).
    pub domain_id: Option<u32>,
    /// Free-form `name -> value` settings, preserved verbatim for the RTPS
    /// binding; e.g. `"General.Interfaces"`, `"Discovery.Peers"`.
    pub settings: HashMap<String, String>,
}

impl DomainConfig {
    /// An empty configuration: domain id taken from the call site, no
    /// settings overridden.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetch a setting by its dotted key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// Parse the minimal `<Domain id="...">` wrapper this crate understands.
///
/// Full RTPS/transport XML (listeners, discovery peers, security) is out of
/// scope for the core; every child element is stored unparsed so an
/// external collaborator can walk it later via `settings`.
fn parse_domain_xml(xml: &str, fallback_domain_id: u32) -> Result<DomainConfig> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::ConfigParse(format!("invalid domain XML: {e}")))?;

    let root = doc
        .descendants()
        .find(|n| n.has_tag_name("Domain"))
        .ok_or_else(|| Error::ConfigParse("missing <Domain> root element".to_string()))?;

    let domain_id = root
        .attribute("id")
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| Error::ConfigParse(format!("invalid Domain id attribute: {s}")))
        })
        .transpose()?
        .or(Some(fallback_domain_id));

    let mut settings = HashMap::new();
    for node in root.descendants().filter(|n| n.is_element()) {
        if node == root {
            continue;
        }
        if let Some(text) = node.text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                settings.insert(node.tag_name().name().to_string(), trimmed.to_string());
            }
        }
        for attr in node.attributes() {
            settings.insert(
                format!("{}.{}", node.tag_name().name(), attr.name()),
                attr.value().to_string(),
            );
        }
    }

    Ok(DomainConfig {
        domain_id,
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_resolves_unchanged() {
        let mut cfg = DomainConfig::empty();
        cfg.settings.insert("foo".into(), "bar".into());
        let src = ConfigSource::Raw(cfg.clone());
        let resolved = src.resolve(0).expect("raw config always resolves");
        assert_eq!(resolved.get("foo"), Some("bar"));
    }

    #[test]
    fn xml_config_reads_domain_id_and_settings() {
        let xml = r#"
            <Domain id="7">
                <General>
                    <Interfaces>eth0</Interfaces>
                </General>
            </Domain>
        "#;
        let src = ConfigSource::Xml(xml.to_string());
        let resolved = src.resolve(0).expect("valid XML parses");
        assert_eq!(resolved.domain_id, Some(7));
        assert_eq!(resolved.get("Interfaces"), Some("eth0"));
    }

    #[test]
    fn xml_config_falls_back_to_call_site_domain_id() {
        let xml = "<Domain></Domain>";
        let src = ConfigSource::Xml(xml.to_string());
        let resolved = src.resolve(3).expect("valid XML parses");
        assert_eq!(resolved.domain_id, Some(3));
    }

    #[test]
    fn xml_config_rejects_missing_root() {
        let xml = "<NotADomain/>";
        let src = ConfigSource::Xml(xml.to_string());
        assert!(matches!(src.resolve(0), Err(Error::ConfigParse(_))));
    }
}
