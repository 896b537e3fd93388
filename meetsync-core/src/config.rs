//! Engine configuration.

use serde::Deserialize;

fn default_expansion_horizon_days() -> i64 {
    90
}

fn default_expansion_limit() -> u16 {
    730
}

fn default_page_size() -> u32 {
    50
}

/// Tunables for recurrence expansion and provider paging, loaded from
/// the host application's config.toml.
///
/// Expansion is always bounded: rules without COUNT or UNTIL are cut off
/// `expansion_horizon_days` past the query time, and no single series
/// ever yields more than `expansion_limit` instances.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_expansion_horizon_days")]
    pub expansion_horizon_days: i64,

    #[serde(default = "default_expansion_limit")]
    pub expansion_limit: u16,

    /// Page size requested from provider listing endpoints.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            expansion_horizon_days: default_expansion_horizon_days(),
            expansion_limit: default_expansion_limit(),
            page_size: default_page_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SyncConfig = toml::from_str("page_size = 100").unwrap();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.expansion_horizon_days, 90);
        assert_eq!(config.expansion_limit, 730);
    }

    #[test]
    fn empty_config_parses() {
        let config: SyncConfig = toml::from_str("").unwrap();
        assert_eq!(config.page_size, 50);
    }
}
