use derive_builder::Builder;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct Publisher {
    pub id: String,
    #[builder(default = "true")]
    pub enabled: bool,
    pub name: String,
    /// Domain patterns this publisher may send traffic for. Patterns
    /// beginning with `*.` allow any subdomain of their tail. Empty
    /// means no domain restriction.
    pub allowed_domains: Vec<String>,
    /// User sync return URL which should include the exchange ID macro
    pub sync_url: Option<String>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self {
            id: String::new(),
            enabled: default_true(),
            name: String::new(),
            allowed_domains: Vec::new(),
            sync_url: None,
        }
    }
}

impl Publisher {
    /// Synthesized record for deployments that accept unregistered
    /// publishers
    pub fn unregistered(id: &str) -> Self {
        Self {
            id: id.to_string(),
            enabled: true,
            name: id.to_string(),
            allowed_domains: Vec::new(),
            sync_url: None,
        }
    }

    pub fn domain_allowed(&self, domain: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }

        let domain = domain.to_ascii_lowercase();

        self.allowed_domains.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();

            if let Some(tail) = pattern.strip_prefix("*.") {
                return domain == tail || domain.ends_with(&format!(".{tail}"));
            }

            domain == pattern
        })
    }
}
