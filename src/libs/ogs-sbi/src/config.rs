//! SBI Configuration
//!
//! Process-wide settings read by the SBI context. Every field has a default,
//! so a YAML document only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::constants::limits;
use crate::error::{SbiError, SbiResult};
use crate::plmn::PlmnId;
use crate::types::{NfType, UriScheme};

/// NF instance timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfInstanceTimeConf {
    /// Heartbeat interval in seconds
    pub heartbeat_interval: u32,
    /// Per-NF-type overrides of `heartbeat_interval`
    pub heartbeat_by_nf_type: HashMap<NfType, u32>,
}

impl Default for NfInstanceTimeConf {
    fn default() -> Self {
        NfInstanceTimeConf {
            heartbeat_interval: 10,
            heartbeat_by_nf_type: HashMap::new(),
        }
    }
}

/// SBI timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SbiTimeConf {
    pub nf_instance: NfInstanceTimeConf,
    /// How long a transaction waits for its response, in milliseconds
    pub client_wait_duration_ms: u64,
    /// Subscription validity in seconds
    pub subscription_validity: u64,
    /// Lead time before validity expiry at which a subscription is patched, in seconds
    pub subscription_patch_margin: u64,
}

impl Default for SbiTimeConf {
    fn default() -> Self {
        SbiTimeConf {
            nf_instance: NfInstanceTimeConf::default(),
            client_wait_duration_ms: 10_000,
            subscription_validity: 86_400,
            subscription_patch_margin: 60,
        }
    }
}

/// Pool capacities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConf {
    pub nf: usize,
    pub nf_service: usize,
    pub xact: usize,
    pub object: usize,
    pub subscription: usize,
    pub client: usize,
    pub timer: usize,
}

impl Default for PoolConf {
    fn default() -> Self {
        PoolConf {
            nf: 512,
            nf_service: 512 * limits::MAX_NUM_OF_NF_SERVICE,
            xact: 4096,
            object: 1024,
            subscription: 512,
            client: 512,
            timer: 8192,
        }
    }
}

/// Advertised SBI server endpoint of this NF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConf {
    pub scheme: UriScheme,
    pub fqdn: Option<String>,
    pub advertise: Vec<SocketAddr>,
}

/// Outbound client settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConf {
    pub scheme: UriScheme,
}

/// Delegated discovery through the SCP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegatedMode {
    #[default]
    Auto,
    Yes,
    No,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConf {
    pub delegated: DelegatedMode,
    /// Keep service names out of the discovery request header
    pub no_service_names: bool,
    /// Put our own instance id into discovery options
    pub prefer_requester_nf_instance_id: bool,
}

/// SBI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SbiConfig {
    /// PLMNs served by this NF
    pub serving_plmn_id: Vec<PlmnId>,
    pub time: SbiTimeConf,
    pub pool: PoolConf,
    pub server: ServerConf,
    pub client: ClientConf,
    /// Services this NF offers; empty means all
    pub service_name: Vec<String>,
    pub discovery: DiscoveryConf,
}

impl SbiConfig {
    pub fn from_yaml_str(yaml: &str) -> SbiResult<Self> {
        let config: SbiConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SbiResult<()> {
        let pool = &self.pool;
        for (name, size) in [
            ("nf", pool.nf),
            ("nf_service", pool.nf_service),
            ("xact", pool.xact),
            ("object", pool.object),
            ("subscription", pool.subscription),
            ("client", pool.client),
            ("timer", pool.timer),
        ] {
            if size == 0 {
                return Err(SbiError::Config(format!("pool.{} should not be 0", name)));
            }
        }
        if self.time.nf_instance.heartbeat_interval == 0 {
            return Err(SbiError::Config(
                "NF Instance heartbeat interval should not be 0".to_string(),
            ));
        }
        if self.time.client_wait_duration_ms == 0 {
            return Err(SbiError::Config(
                "client wait duration should not be 0".to_string(),
            ));
        }
        if self.serving_plmn_id.len() > limits::MAX_NUM_OF_PLMN {
            return Err(SbiError::Config(format!(
                "Too many serving PLMNs [{}/{}]",
                self.serving_plmn_id.len(),
                limits::MAX_NUM_OF_PLMN
            )));
        }
        if self.service_name.iter().any(|name| name.is_empty()) {
            log::warn!("Empty service name in configuration is ignored");
        }
        Ok(())
    }

    /// Heartbeat interval for instances of `nf_type`
    pub fn heartbeat_interval(&self, nf_type: NfType) -> u32 {
        let conf = &self.time.nf_instance;
        conf.heartbeat_by_nf_type
            .get(&nf_type)
            .copied()
            .unwrap_or(conf.heartbeat_interval)
    }

    pub fn client_wait_duration(&self) -> Duration {
        Duration::from_millis(self.time.client_wait_duration_ms)
    }

    pub fn subscription_validity(&self) -> Duration {
        Duration::from_secs(self.time.subscription_validity)
    }
}
