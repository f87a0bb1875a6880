use std::collections::HashMap;
use std::net::Ipv4Addr;

use guardian_ns_common::{normalize_domain, parse_target_address};

/// Present in every loaded table, regardless of what the repository says about this name
pub const NTP_OVERRIDE_DOMAIN: &str = "ntp.ubuntu.com.";
pub const NTP_OVERRIDE_ADDRESS: Ipv4Addr = Ipv4Addr::new(91, 189, 91, 157);

/// One immutable version of the authoritative domain → address mapping.
///
/// Keys are normalized (lower-case, trailing dot). A new version is built for every reload and
/// published as a whole, entries are never changed in place.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TargetTable {
    entries: HashMap<String, Ipv4Addr>,
}

impl TargetTable {
    /// The table used before the first load
    pub fn empty() -> Self {
        Default::default()
    }

    /// Builds a table from raw repository records and injects the override entry.
    ///
    /// Records with unusable addresses are skipped. When several raw keys normalize to the same
    /// name, the first one in lexicographic order wins.
    pub fn from_records(records: HashMap<String, String>) -> Self {
        let mut records: Vec<_> = records.into_iter().collect();
        records.sort_unstable();

        let mut entries = HashMap::with_capacity(records.len() + 1);
        for (domain, address) in records {
            let domain = normalize_domain(&domain);
            let address = match parse_target_address(&domain, &address) {
                Ok(address) => address,
                Err(e) => {
                    tracing::warn!("Skipping a target: {}", e);
                    continue;
                }
            };

            if entries.contains_key(&domain) {
                tracing::warn!(domain = %domain, "Skipping a duplicate target");
                continue;
            }
            entries.insert(domain, address);
        }

        entries.insert(NTP_OVERRIDE_DOMAIN.to_string(), NTP_OVERRIDE_ADDRESS);

        TargetTable { entries }
    }

    /// `name` must already be normalized
    pub fn lookup(&self, name: &str) -> Option<Ipv4Addr> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Ipv4Addr)> {
        self.entries.iter().map(|(domain, address)| (domain.as_str(), *address))
    }
}
