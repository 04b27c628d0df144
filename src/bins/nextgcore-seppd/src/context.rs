//! SEPP Context Management
//!
//! Local N32 settings of this SEPP and the peer SEPP nodes it negotiates
//! with. Peer state is written only by the N32c handshake handlers.

use std::fmt;

use serde::{Deserialize, Serialize};

use ogs_core::{OgsPool, OgsPoolId};
use ogs_sbi::constants::limits;
use ogs_sbi::{PlmnId, SbiConfig, SbiError, SbiResult};

/// Handle of a peer node
pub type SeppNodeId = OgsPoolId;

/// Security capability (OpenAPI SecurityCapability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityCapability {
    Tls,
    Prins,
    None,
    /// Any value this SEPP does not know
    #[serde(other)]
    Unknown,
}

impl SecurityCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityCapability::Tls => "TLS",
            SecurityCapability::Prins => "PRINS",
            SecurityCapability::None => "NONE",
            SecurityCapability::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SecurityCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally supported security schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityCapabilityConf {
    pub tls: bool,
    pub prins: bool,
}

impl Default for SecurityCapabilityConf {
    fn default() -> Self {
        Self {
            tls: true,
            prins: false,
        }
    }
}

/// One configured peer SEPP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeppPeerConf {
    /// Peer FQDN, expected as the sender of its handshake messages
    pub receiver: String,
    pub target_plmn_id: Option<PlmnId>,
}

/// `sepp:` section of the daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeppConf {
    /// FQDN of this SEPP
    pub sender: String,
    pub security_capability: SecurityCapabilityConf,
    pub target_apiroot_supported: bool,
    /// Supported features as a hex string
    pub supported_features: Option<String>,
    /// Peer node pool capacity
    pub node: usize,
    pub peer: Vec<SeppPeerConf>,
}

impl Default for SeppConf {
    fn default() -> Self {
        Self {
            sender: String::new(),
            security_capability: SecurityCapabilityConf::default(),
            target_apiroot_supported: true,
            supported_features: None,
            node: 64,
            peer: Vec::new(),
        }
    }
}

/// Parse a supported-features hex string
pub fn parse_supported_features(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || s.len() > 16 {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

impl SeppConf {
    pub fn validate(&self) -> SbiResult<()> {
        if self.sender.is_empty() {
            return Err(SbiError::Config("No SEPP sender FQDN".to_string()));
        }
        if self.node == 0 {
            return Err(SbiError::Config("sepp.node should not be 0".to_string()));
        }
        if !self.security_capability.tls && !self.security_capability.prins {
            return Err(SbiError::Config(
                "No security capability enabled (tls or prins)".to_string(),
            ));
        }
        self.local_features()?;
        for peer in &self.peer {
            if peer.receiver.is_empty() {
                return Err(SbiError::Config("Peer without receiver FQDN".to_string()));
            }
        }
        Ok(())
    }

    fn local_features(&self) -> SbiResult<u64> {
        match &self.supported_features {
            None => Ok(0),
            Some(s) => parse_supported_features(s).ok_or_else(|| {
                SbiError::Config(format!("Invalid supported_features [{}]", s))
            }),
        }
    }
}

/// Peer SEPP node
#[derive(Debug, Clone, PartialEq)]
pub struct SeppNode {
    /// Peer FQDN
    pub receiver: String,
    /// Scheme agreed by the last successful handshake
    pub negotiated_security_scheme: Option<SecurityCapability>,
    pub target_apiroot_supported: bool,
    /// PLMNs served by the peer
    pub plmn_ids: Vec<PlmnId>,
    pub target_plmn_id: Option<PlmnId>,
    pub supported_features: u64,
}

impl SeppNode {
    pub fn new(receiver: &str, supported_features: u64) -> Self {
        Self {
            receiver: receiver.to_string(),
            negotiated_security_scheme: None,
            target_apiroot_supported: false,
            plmn_ids: Vec::new(),
            target_plmn_id: None,
            supported_features,
        }
    }

    pub fn has_plmn_id(&self, plmn_id: &PlmnId) -> bool {
        self.plmn_ids.contains(plmn_id)
    }

    pub fn is_negotiated(&self) -> bool {
        self.negotiated_security_scheme.is_some()
    }
}

/// SEPP Context
pub struct SeppContext {
    pub(crate) sender: String,
    pub(crate) security_capability: SecurityCapabilityConf,
    pub(crate) target_apiroot_supported: bool,
    pub(crate) supported_features: u64,
    /// PLMNs this SEPP serves
    pub(crate) plmn_ids: Vec<PlmnId>,
    pub(crate) nodes: OgsPool<SeppNode>,
    node_list: Vec<SeppNodeId>,
}

impl SeppContext {
    pub fn new(conf: &SeppConf, sbi: &SbiConfig) -> SbiResult<Self> {
        conf.validate()?;
        if sbi.serving_plmn_id.len() > limits::MAX_NUM_OF_PLMN {
            return Err(SbiError::Config("Too many serving PLMNs".to_string()));
        }
        let context = Self {
            sender: conf.sender.clone(),
            security_capability: conf.security_capability,
            target_apiroot_supported: conf.target_apiroot_supported,
            supported_features: conf.local_features()?,
            plmn_ids: sbi.serving_plmn_id.clone(),
            nodes: OgsPool::new("sepp_node", conf.node),
            node_list: Vec::new(),
        };
        log::info!(
            "[{}] SEPP context initialized (tls={}, prins={}, max_node={})",
            context.sender,
            context.security_capability.tls,
            context.security_capability.prins,
            conf.node
        );
        Ok(context)
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn security_capability(&self) -> SecurityCapabilityConf {
        self.security_capability
    }

    pub fn target_apiroot_supported(&self) -> bool {
        self.target_apiroot_supported
    }

    pub fn supported_features(&self) -> u64 {
        self.supported_features
    }

    pub fn plmn_ids(&self) -> &[PlmnId] {
        &self.plmn_ids
    }

    /// Add a peer node; it starts with the local supported features
    pub fn node_add(&mut self, receiver: &str) -> SbiResult<SeppNodeId> {
        if self.node_find_by_receiver(receiver).is_some() {
            return Err(SbiError::Conflict(format!(
                "SEPP node [{}] already exists",
                receiver
            )));
        }
        let node = SeppNode::new(receiver, self.supported_features);
        let id = self.nodes.alloc(node).ok_or_else(|| {
            log::error!("Maximum number of nodes [{}] reached", self.nodes.capacity());
            SbiError::PoolExhausted("sepp_node")
        })?;
        self.node_list.push(id);
        log::debug!("[{}] SEPP node added", receiver);
        Ok(id)
    }

    pub fn node_remove(&mut self, id: SeppNodeId) -> SbiResult<SeppNode> {
        let node = self
            .nodes
            .free(id)
            .ok_or_else(|| SbiError::NotFound(format!("SEPP node {:?}", id)))?;
        self.node_list.retain(|n| *n != id);
        log::debug!("[{}] SEPP node removed", node.receiver);
        Ok(node)
    }

    pub fn node_remove_all(&mut self) {
        for id in std::mem::take(&mut self.node_list) {
            if let Some(node) = self.nodes.free(id) {
                log::debug!("[{}] SEPP node removed", node.receiver);
            }
        }
    }

    pub fn node(&self, id: SeppNodeId) -> Option<&SeppNode> {
        self.nodes.find(id)
    }

    pub fn node_mut(&mut self, id: SeppNodeId) -> Option<&mut SeppNode> {
        self.nodes.find_mut(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (SeppNodeId, &SeppNode)> {
        self.node_list
            .iter()
            .filter_map(|id| self.nodes.find(*id).map(|node| (*id, node)))
    }

    pub fn node_count(&self) -> usize {
        self.node_list.len()
    }

    pub fn node_find_by_receiver(&self, receiver: &str) -> Option<SeppNodeId> {
        self.nodes()
            .find(|(_, node)| node.receiver == receiver)
            .map(|(id, _)| id)
    }

    /// First node whose negotiated PLMN list contains `plmn_id`
    pub fn node_find_by_plmn_id(&self, plmn_id: &PlmnId) -> Option<SeppNodeId> {
        self.nodes()
            .find(|(_, node)| node.has_plmn_id(plmn_id))
            .map(|(id, _)| id)
    }

    /// Register every configured peer
    pub fn add_peers(&mut self, peers: &[SeppPeerConf]) -> SbiResult<Vec<SeppNodeId>> {
        let mut ids = Vec::with_capacity(peers.len());
        for peer in peers {
            let id = self.node_add(&peer.receiver)?;
            if let Some(node) = self.nodes.find_mut(id) {
                node.target_plmn_id = peer.target_plmn_id;
            }
            ids.push(id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf() -> SeppConf {
        SeppConf {
            sender: "sepp.local.example.com".to_string(),
            supported_features: Some("3".to_string()),
            node: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_security_capability_serde() {
        assert_eq!(
            serde_json::to_string(&SecurityCapability::Prins).unwrap(),
            "\"PRINS\""
        );
        let caps: Vec<SecurityCapability> =
            serde_json::from_str(r#"["TLS","NONE","ALPACA"]"#).unwrap();
        assert_eq!(
            caps,
            vec![
                SecurityCapability::Tls,
                SecurityCapability::None,
                SecurityCapability::Unknown
            ]
        );
    }

    #[test]
    fn test_parse_supported_features() {
        assert_eq!(parse_supported_features("1"), Some(1));
        assert_eq!(parse_supported_features("A0"), Some(0xa0));
        assert_eq!(parse_supported_features("zz"), None);
        assert_eq!(parse_supported_features(""), None);
        assert_eq!(parse_supported_features("11112222333344445"), None);
    }

    #[test]
    fn test_conf_validate() {
        assert!(conf().validate().is_ok());
        assert!(SeppConf::default().validate().is_err());

        let mut bad = conf();
        bad.supported_features = Some("xyz".to_string());
        assert!(bad.validate().is_err());

        let mut bad = conf();
        bad.security_capability = SecurityCapabilityConf {
            tls: false,
            prins: false,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_conf_yaml() {
        let yaml = r#"
sender: sepp1.localdomain
security_capability:
  tls: true
  prins: true
supported_features: "1"
peer:
  - receiver: sepp2.localdomain
    target_plmn_id:
      mcc: "001"
      mnc: "01"
"#;
        let conf: SeppConf = serde_yaml::from_str(yaml).unwrap();
        assert!(conf.validate().is_ok());
        assert!(conf.security_capability.prins);
        assert!(conf.target_apiroot_supported);
        assert_eq!(conf.peer.len(), 1);
        assert_eq!(conf.peer[0].target_plmn_id.unwrap().mcc(), 1);
    }

    #[test]
    fn test_node_add_remove() {
        let mut ctx = SeppContext::new(&conf(), &SbiConfig::default()).unwrap();
        let a = ctx.node_add("sepp-a.example.com").unwrap();
        let b = ctx.node_add("sepp-b.example.com").unwrap();
        assert_eq!(ctx.node(a).unwrap().supported_features, 3);
        assert!(ctx.node_add("sepp-a.example.com").is_err());

        let err = ctx.node_add("sepp-c.example.com").unwrap_err();
        assert!(matches!(err, SbiError::PoolExhausted("sepp_node")));

        assert_eq!(ctx.node_find_by_receiver("sepp-b.example.com"), Some(b));
        let removed = ctx.node_remove(a).unwrap();
        assert_eq!(removed.receiver, "sepp-a.example.com");
        assert!(ctx.node_remove(a).is_err());
        assert!(ctx.node(a).is_none());
        assert_eq!(ctx.node_count(), 1);

        ctx.node_remove_all();
        assert_eq!(ctx.node_count(), 0);
        assert!(ctx.node(b).is_none());
    }

    #[test]
    fn test_node_find_by_plmn_id() {
        let mut ctx = SeppContext::new(&conf(), &SbiConfig::default()).unwrap();
        let a = ctx.node_add("sepp-a.example.com").unwrap();
        let plmn = PlmnId::new(310, 14, 3).unwrap();
        assert_eq!(ctx.node_find_by_plmn_id(&plmn), None);
        ctx.node_mut(a).unwrap().plmn_ids.push(plmn);
        assert_eq!(ctx.node_find_by_plmn_id(&plmn), Some(a));
    }

    #[test]
    fn test_add_peers() {
        let mut conf = conf();
        conf.peer = vec![SeppPeerConf {
            receiver: "sepp-a.example.com".to_string(),
            target_plmn_id: Some(PlmnId::new(1, 1, 2).unwrap()),
        }];
        let mut ctx = SeppContext::new(&conf, &SbiConfig::default()).unwrap();
        let ids = ctx.add_peers(&conf.peer).unwrap();
        assert_eq!(ids.len(), 1);
        let node = ctx.node(ids[0]).unwrap();
        assert_eq!(node.target_plmn_id, conf.peer[0].target_plmn_id);
        assert!(!node.is_negotiated());
    }
}
