//! NF Instance and NF Service
//!
//! Profiles of known network functions. Instances live in the SBI context's
//! pool and own their services and info blocks by value; everything else
//! refers to an instance through its [`NfInstanceId`] handle or its id string.

use std::net::SocketAddr;

use ogs_core::OgsPoolId;

use crate::client::ClientId;
use crate::constants::{defaults, limits};
use crate::error::{SbiError, SbiResult};
use crate::message::bounded_push;
use crate::plmn::PlmnId;
use crate::types::{NfServiceStatus, NfStatus, NfType, UriScheme};

/// Handle of an NF instance in the SBI context
pub type NfInstanceId = OgsPoolId;

/// One entry of an NF service's version list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfServiceVersion {
    /// Version as it appears in the URI, e.g. "v1"
    pub in_uri: String,
    /// Full semantic version, e.g. "1.0.0"
    pub full: String,
    pub expiry: Option<String>,
}

/// Transport address of an NF service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NfServiceAddr {
    pub ipv4: Option<SocketAddr>,
    pub ipv6: Option<SocketAddr>,
}

/// Checks a requester against an allow-list; an empty list allows everyone
fn allow_list_accepts(allowed: &[NfType], requester: NfType) -> bool {
    allowed.is_empty() || allowed.contains(&requester)
}

fn allow_list_add(allowed: &mut Vec<NfType>, nf_type: NfType) -> SbiResult<()> {
    if allowed.contains(&nf_type) {
        return Ok(());
    }
    bounded_push(
        allowed,
        nf_type,
        "allowed NF types",
        limits::MAX_NUM_OF_NF_TYPE,
    )
}

/// NF Service
#[derive(Debug, Clone, PartialEq)]
pub struct NfService {
    pub id: String,
    /// Service name, unique within the owning instance
    pub name: String,
    pub scheme: UriScheme,
    pub status: NfServiceStatus,
    pub versions: Vec<NfServiceVersion>,
    pub fqdn: Option<String>,
    pub addr: Vec<NfServiceAddr>,
    pub allowed_nf_types: Vec<NfType>,
    pub priority: u16,
    pub capacity: u16,
    pub load: u8,
    /// Owning instance
    pub nf_instance: NfInstanceId,
    pub client: Option<ClientId>,
}

impl NfService {
    pub(crate) fn new(
        nf_instance: NfInstanceId,
        id: impl Into<String>,
        name: impl Into<String>,
        scheme: UriScheme,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scheme,
            status: NfServiceStatus::Registered,
            versions: Vec::new(),
            fqdn: None,
            addr: Vec::new(),
            allowed_nf_types: Vec::new(),
            priority: defaults::PRIORITY,
            capacity: defaults::CAPACITY,
            load: defaults::LOAD,
            nf_instance,
            client: None,
        }
    }

    pub fn add_version(
        &mut self,
        in_uri: impl Into<String>,
        full: impl Into<String>,
        expiry: Option<&str>,
    ) -> SbiResult<()> {
        let version = NfServiceVersion {
            in_uri: in_uri.into(),
            full: full.into(),
            expiry: expiry.map(str::to_string),
        };
        bounded_push(
            &mut self.versions,
            version,
            "service versions",
            limits::MAX_NUM_OF_SERVICE_VERSION,
        )
    }

    pub fn add_addr(&mut self, addr: NfServiceAddr) -> SbiResult<()> {
        bounded_push(
            &mut self.addr,
            addr,
            "service addresses",
            limits::MAX_NUM_OF_IP_ADDRESS,
        )
    }

    pub fn add_allowed_nf_type(&mut self, nf_type: NfType) -> SbiResult<()> {
        allow_list_add(&mut self.allowed_nf_types, nf_type)
    }

    pub fn is_allowed_nf_type(&self, requester: NfType) -> bool {
        allow_list_accepts(&self.allowed_nf_types, requester)
    }

    /// Drop versions, FQDN, addresses and the allow-list
    pub fn clear(&mut self) {
        self.versions.clear();
        self.fqdn = None;
        self.addr.clear();
        self.allowed_nf_types.clear();
    }
}

/// Globally Unique AMF Identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guami {
    pub plmn_id: PlmnId,
    /// AMF Region ID (8 bits), Set ID (10 bits), Pointer (6 bits)
    pub amf_id: u32,
}

/// Tracking Area Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tai {
    pub plmn_id: PlmnId,
    pub tac: u32,
}

/// Single Network Slice Selection Assistance Information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SNssai {
    pub sst: u8,
    pub sd: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmfInfo {
    pub amf_set_id: u16,
    pub amf_region_id: u8,
    pub guami: Vec<Guami>,
    pub nr_tai: Vec<Tai>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmfSlice {
    pub s_nssai: SNssai,
    pub dnn: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmfInfo {
    pub slices: Vec<SmfSlice>,
    pub nr_tai: Vec<Tai>,
}

/// HTTP/HTTPS ports a proxy-type NF listens on, when not the defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortInfo {
    pub http: Option<u16>,
    pub https: Option<u16>,
}

impl PortInfo {
    pub fn port(&self, scheme: UriScheme) -> Option<u16> {
        match scheme {
            UriScheme::Http => self.http,
            UriScheme::Https => self.https,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScpDomainInfo {
    pub name: String,
    pub fqdn: Option<String>,
    pub ports: PortInfo,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScpInfo {
    pub ports: PortInfo,
    pub domains: Vec<ScpDomainInfo>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeppInfo {
    pub ports: PortInfo,
}

/// Type-specific information block of an NF profile
#[derive(Debug, Clone, PartialEq)]
pub enum NfInfo {
    Amf(AmfInfo),
    Smf(SmfInfo),
    Scp(ScpInfo),
    Sepp(SeppInfo),
}

impl NfInfo {
    pub fn nf_type(&self) -> NfType {
        match self {
            Self::Amf(_) => NfType::Amf,
            Self::Smf(_) => NfType::Smf,
            Self::Scp(_) => NfType::Scp,
            Self::Sepp(_) => NfType::Sepp,
        }
    }

    /// Port override for `scheme` carried by this block
    pub fn port(&self, scheme: UriScheme) -> Option<u16> {
        match self {
            Self::Amf(_) | Self::Smf(_) => None,
            Self::Scp(info) => info.ports.port(scheme),
            Self::Sepp(info) => info.ports.port(scheme),
        }
    }
}

/// NF Instance
#[derive(Debug, Clone, PartialEq)]
pub struct NfInstance {
    /// NF instance id (UUID); None until known
    pub id: Option<String>,
    pub nf_type: NfType,
    pub status: NfStatus,
    /// Administratively hidden from discovery
    pub excluded_from_discovery: bool,
    pub fqdn: Option<String>,
    pub ipv4: Vec<SocketAddr>,
    pub ipv6: Vec<SocketAddr>,
    pub plmn_ids: Vec<PlmnId>,
    pub allowed_nf_types: Vec<NfType>,
    /// Heartbeat interval in seconds
    pub heartbeat_interval: u32,
    pub priority: u16,
    pub capacity: u16,
    pub load: u8,
    pub services: Vec<NfService>,
    pub nf_info: Vec<NfInfo>,
    pub client: Option<ClientId>,
}

impl NfInstance {
    pub(crate) fn new(nf_type: NfType, heartbeat_interval: u32) -> Self {
        Self {
            id: None,
            nf_type,
            status: NfStatus::Undiscovered,
            excluded_from_discovery: false,
            fqdn: None,
            ipv4: Vec::new(),
            ipv6: Vec::new(),
            plmn_ids: Vec::new(),
            allowed_nf_types: Vec::new(),
            heartbeat_interval,
            priority: defaults::PRIORITY,
            capacity: defaults::CAPACITY,
            load: defaults::LOAD,
            services: Vec::new(),
            nf_info: Vec::new(),
            client: None,
        }
    }

    /// Id for log lines
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("-")
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Change the NF type; only allowed before the instance is registered
    pub fn set_type(&mut self, nf_type: NfType) -> SbiResult<()> {
        if self.nf_type != nf_type && self.status == NfStatus::Registered {
            return Err(SbiError::Conflict(format!(
                "[{}] NF type of a registered instance is fixed ({})",
                self.id_str(),
                self.nf_type
            )));
        }
        self.nf_type = nf_type;
        Ok(())
    }

    pub fn set_status(&mut self, status: NfStatus) {
        self.status = status;
    }

    pub fn set_fqdn(&mut self, fqdn: impl Into<String>) {
        self.fqdn = Some(fqdn.into());
    }

    pub fn add_ipv4(&mut self, addr: SocketAddr) -> SbiResult<()> {
        bounded_push(
            &mut self.ipv4,
            addr,
            "IPv4 addresses",
            limits::MAX_NUM_OF_IP_ADDRESS,
        )
    }

    pub fn add_ipv6(&mut self, addr: SocketAddr) -> SbiResult<()> {
        bounded_push(
            &mut self.ipv6,
            addr,
            "IPv6 addresses",
            limits::MAX_NUM_OF_IP_ADDRESS,
        )
    }

    pub fn add_plmn_id(&mut self, plmn_id: PlmnId) -> SbiResult<()> {
        bounded_push(&mut self.plmn_ids, plmn_id, "PLMNs", limits::MAX_NUM_OF_PLMN)
    }

    pub fn add_allowed_nf_type(&mut self, nf_type: NfType) -> SbiResult<()> {
        allow_list_add(&mut self.allowed_nf_types, nf_type)
    }

    /// Whether `requester` may use this instance; an empty list allows everyone
    pub fn is_allowed_nf_type(&self, requester: NfType) -> bool {
        if allow_list_accepts(&self.allowed_nf_types, requester) {
            return true;
        }
        log::error!(
            "[{}:{}] NF type [{}] not allowed",
            self.nf_type,
            self.id_str(),
            requester
        );
        false
    }

    /// Drop FQDN, addresses and the allow-list; the instance stays registered
    pub fn clear(&mut self) {
        self.fqdn = None;
        self.ipv4.clear();
        self.ipv6.clear();
        self.allowed_nf_types.clear();
    }

    pub fn service_find_by_id(&self, id: &str) -> Option<&NfService> {
        self.services.iter().find(|service| service.id == id)
    }

    pub fn service_find_by_name(&self, name: &str) -> Option<&NfService> {
        self.services.iter().find(|service| service.name == name)
    }

    pub fn service_find_by_name_mut(&mut self, name: &str) -> Option<&mut NfService> {
        self.services.iter_mut().find(|service| service.name == name)
    }

    pub fn nf_info_add(&mut self, nf_info: NfInfo) -> SbiResult<()> {
        bounded_push(
            &mut self.nf_info,
            nf_info,
            "NF info blocks",
            limits::MAX_NUM_OF_NF_INFO,
        )
    }

    pub fn nf_info_find(&self, nf_type: NfType) -> Option<&NfInfo> {
        self.nf_info.iter().find(|info| info.nf_type() == nf_type)
    }

    pub fn nf_info_remove_all(&mut self) {
        self.nf_info.clear();
    }

    /// Port override for `scheme` from the first info block that has one
    pub fn port_override(&self, scheme: UriScheme) -> Option<u16> {
        self.nf_info.iter().find_map(|info| info.port(scheme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogs_core::OgsPool;

    fn handle() -> NfInstanceId {
        let mut pool = OgsPool::new("nf", 1);
        pool.alloc(()).unwrap()
    }

    #[test]
    fn test_instance_defaults() {
        let instance = NfInstance::new(NfType::Amf, 10);
        assert_eq!(instance.status, NfStatus::Undiscovered);
        assert_eq!(instance.priority, defaults::PRIORITY);
        assert_eq!(instance.capacity, defaults::CAPACITY);
        assert_eq!(instance.load, defaults::LOAD);
        assert_eq!(instance.id_str(), "-");
    }

    #[test]
    fn test_allowed_nf_type_empty_allows_all() {
        let mut instance = NfInstance::new(NfType::Udm, 10);
        assert!(instance.is_allowed_nf_type(NfType::Smf));

        instance.add_allowed_nf_type(NfType::Amf).unwrap();
        assert!(instance.is_allowed_nf_type(NfType::Amf));
        assert!(!instance.is_allowed_nf_type(NfType::Smf));
    }

    #[test]
    fn test_allowed_nf_type_bound() {
        let mut instance = NfInstance::new(NfType::Udm, 10);
        let types = NfType::ALL;
        for nf_type in types.iter().take(limits::MAX_NUM_OF_NF_TYPE) {
            instance.add_allowed_nf_type(*nf_type).unwrap();
        }
        // Re-adding a present type is a no-op, a new one is rejected
        instance.add_allowed_nf_type(types[0]).unwrap();
        let err = instance
            .add_allowed_nf_type(types[limits::MAX_NUM_OF_NF_TYPE])
            .unwrap_err();
        assert!(matches!(err, SbiError::CapacityExceeded { .. }));
        assert_eq!(instance.allowed_nf_types.len(), limits::MAX_NUM_OF_NF_TYPE);
    }

    #[test]
    fn test_instance_clear() {
        let mut instance = NfInstance::new(NfType::Smf, 10);
        instance.set_fqdn("smf.local");
        instance.add_ipv4("10.0.0.1:80".parse().unwrap()).unwrap();
        instance.add_allowed_nf_type(NfType::Amf).unwrap();
        instance.add_plmn_id(PlmnId::new(1, 1, 2).unwrap()).unwrap();

        instance.clear();
        assert!(instance.fqdn.is_none());
        assert!(instance.ipv4.is_empty());
        assert!(instance.allowed_nf_types.is_empty());
        assert_eq!(instance.plmn_ids.len(), 1);
    }

    #[test]
    fn test_set_type_fixed_once_registered() {
        let mut instance = NfInstance::new(NfType::Smf, 10);
        instance.set_type(NfType::Amf).unwrap();
        instance.set_status(NfStatus::Registered);
        assert!(instance.set_type(NfType::Amf).is_ok());
        assert!(matches!(
            instance.set_type(NfType::Udm),
            Err(SbiError::Conflict(_))
        ));
    }

    #[test]
    fn test_service_versions_and_allow_list() {
        let mut service = NfService::new(handle(), "svc-1", "nudm-sdm", UriScheme::Http);
        assert_eq!(service.status, NfServiceStatus::Registered);
        for i in 0..limits::MAX_NUM_OF_SERVICE_VERSION {
            service
                .add_version(format!("v{}", i + 1), format!("{}.0.0", i + 1), None)
                .unwrap();
        }
        assert!(service.add_version("v9", "9.0.0", Some("2030-01-01")).is_err());

        assert!(service.is_allowed_nf_type(NfType::Smf));
        service.add_allowed_nf_type(NfType::Amf).unwrap();
        assert!(!service.is_allowed_nf_type(NfType::Smf));

        service.clear();
        assert!(service.versions.is_empty());
        assert!(service.is_allowed_nf_type(NfType::Smf));
    }

    #[test]
    fn test_nf_info_port_override() {
        let mut instance = NfInstance::new(NfType::Sepp, 10);
        instance
            .nf_info_add(NfInfo::Amf(AmfInfo::default()))
            .unwrap();
        instance
            .nf_info_add(NfInfo::Sepp(SeppInfo {
                ports: PortInfo {
                    http: None,
                    https: Some(8443),
                },
            }))
            .unwrap();

        assert_eq!(instance.port_override(UriScheme::Https), Some(8443));
        assert_eq!(instance.port_override(UriScheme::Http), None);
        assert!(instance.nf_info_find(NfType::Sepp).is_some());
        assert!(instance.nf_info_find(NfType::Scp).is_none());

        instance.nf_info_remove_all();
        assert!(instance.nf_info.is_empty());
    }
}
