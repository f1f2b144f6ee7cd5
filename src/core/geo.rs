use anyhow::bail;
use arc_swap::ArcSwap;
use ip_network::IpNetwork;
use ip_network_table::IpNetworkTable;
use moka::sync::Cache;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolves client IPs to ISO country codes from a CIDR table.
///
/// The table file is CSV, one `cidr,COUNTRY` pair per line, and is
/// swapped atomically on reload so readers never observe a partial
/// table. Lookups memoize through a bounded TTL cache.
pub struct GeoResolver {
    table: ArcSwap<IpNetworkTable<String>>,
    cache: Cache<String, Option<String>>,
    ranges: usize,
}

impl GeoResolver {
    pub fn try_new(
        path: &Path,
        cache_max_size: usize,
        cache_ttl: Duration,
    ) -> Result<Self, anyhow::Error> {
        let mut cache_builder = Cache::<String, Option<String>>::builder();
        if cache_max_size > 0 {
            cache_builder = cache_builder.max_capacity(cache_max_size as u64);
        }
        if !cache_ttl.is_zero() {
            cache_builder = cache_builder.time_to_live(cache_ttl);
        }

        let mut resolver = GeoResolver {
            table: ArcSwap::new(Arc::new(IpNetworkTable::new())),
            cache: cache_builder.build(),
            ranges: 0,
        };

        resolver.load(path)?;

        Ok(resolver)
    }

    fn load(&mut self, path: &Path) -> Result<usize, anyhow::Error> {
        let text = std::fs::read_to_string(path)?;

        let mut table = IpNetworkTable::new();
        let mut loaded = 0;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((cidr, country)) = trimmed.split_once(',') else {
                continue;
            };

            if let Ok(network) = cidr.trim().parse::<IpNetwork>() {
                table.insert(network, country.trim().to_ascii_uppercase());
                loaded += 1;
            }
        }

        if loaded == 0 {
            bail!("geo table {} contained no parseable ranges", path.display());
        }

        self.table.store(Arc::new(table));
        self.ranges = loaded;

        debug!("Loaded {} geo ranges from {}", loaded, path.display());

        Ok(loaded)
    }

    pub fn country(&self, ip: IpAddr) -> Option<String> {
        self.cache.get_with(ip.to_string(), || {
            self.table
                .load()
                .longest_match(ip)
                .map(|(_, country)| country.clone())
        })
    }

    pub fn ranges(&self) -> usize {
        self.ranges
    }
}
