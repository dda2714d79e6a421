// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_validity_days() -> u64 {
    // Matches the authorization manager's design default.
    10
}

/// Client-side configuration: RPC endpoint, chain id, the deployed contract
/// suite and the decryption-authorization validity window.
///
/// Loaded from a YAML file with `CVL_`-prefixed environment variables taking
/// precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub http_rpc_url: String,
    #[serde(default)]
    pub ws_rpc_url: Option<String>,
    pub chain_id: u64,
    pub ledger_address: Address,
    pub asset_address: Address,
    pub token_address: Address,
    pub tally_address: Address,
    #[serde(default = "default_validity_days")]
    pub authorization_validity_days: u64,
}

impl AppConfig {
    /// Loads configuration from `path`, overridable through the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: AppConfig = Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("CVL_"))
            .extract()?;
        info!(
            chain_id = config.chain_id,
            validity_days = config.authorization_validity_days,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from `CVL_`-prefixed environment variables only.
    pub fn from_env() -> Result<Self> {
        Ok(Figment::new().merge(Env::prefixed("CVL_")).extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
http_rpc_url: "http://localhost:8545"
chain_id: 31337
ledger_address: "0x00000000000000000000000000000000000000aa"
asset_address: "0x00000000000000000000000000000000000000ab"
token_address: "0x00000000000000000000000000000000000000ac"
tally_address: "0x00000000000000000000000000000000000000ad"
"#;

    #[test]
    fn loads_yaml_with_defaulted_validity_window() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cvl.yaml", YAML)?;
            let config = AppConfig::load("cvl.yaml").expect("config should load");
            assert_eq!(config.chain_id, 31337);
            assert_eq!(config.authorization_validity_days, 10);
            assert_eq!(config.ws_rpc_url, None);
            assert_eq!(
                config.ledger_address.to_string().to_lowercase(),
                "0x00000000000000000000000000000000000000aa"
            );
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_the_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cvl.yaml", YAML)?;
            jail.set_env("CVL_CHAIN_ID", "11155111");
            jail.set_env("CVL_AUTHORIZATION_VALIDITY_DAYS", "3");
            let config = AppConfig::load("cvl.yaml").expect("config should load");
            assert_eq!(config.chain_id, 11155111);
            assert_eq!(config.authorization_validity_days, 3);
            Ok(())
        });
    }

    #[test]
    fn missing_required_fields_fail() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cvl.yaml", "chain_id: 1\n")?;
            assert!(AppConfig::load("cvl.yaml").is_err());
            Ok(())
        });
    }
}
