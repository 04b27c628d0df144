//! SBI Context Management
//!
//! The SBI context owns every NF instance, transaction, SBI object,
//! subscription and timer of the process. Other code holds generation-tagged
//! handles into it; a handle whose entity has been removed simply stops
//! resolving.
//!
//! The context is single-owner: all mutation goes through `&mut SbiContext`
//! from one scheduling context, so nothing in here locks.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use ogs_core::{OgsPool, OgsTimerMgr};

use crate::client::{ClientFactory, ClientId, SbiClient, SbiClientKey, SbiClientRegistry};
use crate::config::{DelegatedMode, SbiConfig};
use crate::constants::{api, limits};
use crate::discovery::discovery_param_is_matched;
use crate::error::{SbiError, SbiResult};
use crate::message::{bounded_push, SbiDiscoveryOption};
use crate::nf::{NfInstance, NfInstanceId, NfService, NfServiceAddr};
use crate::plmn::PlmnId;
use crate::subscription::{
    SubscriptionData, SubscriptionDataId, SubscriptionSpec,
};
use crate::types::{NfStatus, NfType, SbiServiceType, UriScheme};
use crate::xact::{SbiObject, SbiXact, XactId};

/// Event produced when an SBI timer expires
///
/// The owner dispatches it back into the context: a client-wait expiry
/// usually ends in [`SbiContext::xact_remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbiTimerEvent {
    /// No response arrived for the transaction in time
    ClientWaitExpire(XactId),
    /// The subscription is no longer valid
    SubscriptionValidity(SubscriptionDataId),
    /// The subscription should be refreshed before it expires
    SubscriptionPatch(SubscriptionDataId),
}

/// SBI Context
pub struct SbiContext {
    config: SbiConfig,
    nf_type: NfType,

    pub(crate) nf_instances: OgsPool<NfInstance>,
    /// Instances in insertion order; discovery returns the first match
    pub(crate) nf_instance_list: Vec<NfInstanceId>,
    nf_service_count: usize,

    pub(crate) clients: Box<dyn ClientFactory>,
    pub(crate) timers: OgsTimerMgr<SbiTimerEvent>,

    pub(crate) objects: OgsPool<SbiObject>,
    pub(crate) xacts: OgsPool<SbiXact>,
    pub(crate) subscription_specs: OgsPool<SubscriptionSpec>,
    pub(crate) subscription_data: OgsPool<SubscriptionData>,

    self_instance: Option<NfInstanceId>,
    nrf_instance: Option<NfInstanceId>,
    scp_instance: Option<NfInstanceId>,

    initialized: bool,
}

impl SbiContext {
    /// Create the context of an NF of type `nf_type`
    ///
    /// Creates the self instance with a fresh UUID and, unless this NF is
    /// itself the NRF, placeholder NRF and SCP instances.
    pub fn new(nf_type: NfType, config: SbiConfig) -> SbiResult<Self> {
        let clients = Box::new(SbiClientRegistry::new(config.pool.client));
        Self::with_client_factory(nf_type, config, clients)
    }

    /// Same as [`new`](Self::new) with a caller-supplied transport-client factory
    pub fn with_client_factory(
        nf_type: NfType,
        config: SbiConfig,
        clients: Box<dyn ClientFactory>,
    ) -> SbiResult<Self> {
        config.validate()?;

        let pool = &config.pool;
        let mut ctx = SbiContext {
            nf_instances: OgsPool::new("nf_instance", pool.nf),
            nf_instance_list: Vec::new(),
            nf_service_count: 0,
            clients,
            timers: OgsTimerMgr::new(pool.timer),
            objects: OgsPool::new("sbi_object", pool.object),
            xacts: OgsPool::new("sbi_xact", pool.xact),
            subscription_specs: OgsPool::new("subscription_spec", pool.subscription),
            subscription_data: OgsPool::new("subscription_data", pool.subscription),
            self_instance: None,
            nrf_instance: None,
            scp_instance: None,
            initialized: true,
            nf_type,
            config,
        };

        let self_id = ctx.nf_instance_add(nf_type)?;
        if let Some(instance) = ctx.nf_instances.find_mut(self_id) {
            instance.set_id(uuid::Uuid::new_v4().to_string());
        }
        ctx.self_instance = Some(self_id);

        if nf_type != NfType::Nrf {
            ctx.nrf_instance = Some(ctx.nf_instance_add(NfType::Nrf)?);
        }
        if nf_type != NfType::Nrf && nf_type != NfType::Scp {
            ctx.scp_instance = Some(ctx.nf_instance_add(NfType::Scp)?);
        }

        log::info!(
            "[{}] SBI context ready ({})",
            nf_type,
            ctx.self_instance().map(NfInstance::id_str).unwrap_or("-")
        );
        Ok(ctx)
    }

    /// Tear everything down
    ///
    /// Subscriptions go first, then transactions and their objects, then NF
    /// instances. A second call fails with [`SbiError::NotInitialized`].
    pub fn finalize(&mut self) -> SbiResult<()> {
        self.ensure_initialized()?;

        self.subscription_data_remove_all();
        self.subscription_spec_remove_all();
        for object in self.objects.ids() {
            self.xact_remove_all(object);
            self.objects.free(object);
        }
        self.nf_instance_remove_all();

        self.self_instance = None;
        self.nrf_instance = None;
        self.scp_instance = None;
        self.initialized = false;

        log::info!("[{}] SBI context finalized", self.nf_type);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn ensure_initialized(&self) -> SbiResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SbiError::NotInitialized)
        }
    }

    pub fn config(&self) -> &SbiConfig {
        &self.config
    }

    /// Own NF type
    pub fn nf_type(&self) -> NfType {
        self.nf_type
    }

    pub fn self_instance_id(&self) -> Option<NfInstanceId> {
        self.self_instance
    }

    pub fn self_instance(&self) -> Option<&NfInstance> {
        self.self_instance.and_then(|id| self.nf_instances.find(id))
    }

    pub fn nrf_instance_id(&self) -> Option<NfInstanceId> {
        self.nrf_instance
    }

    pub fn scp_instance_id(&self) -> Option<NfInstanceId> {
        self.scp_instance
    }

    /// Whether new transactions leave discovery to the SCP
    ///
    /// `auto` delegates once the SCP instance has a client.
    pub fn discovery_is_delegated(&self) -> bool {
        match self.config.discovery.delegated {
            DelegatedMode::Yes => true,
            DelegatedMode::No => false,
            DelegatedMode::Auto => self
                .scp_instance
                .and_then(|id| self.nf_instances.find(id))
                .is_some_and(|scp| scp.client.is_some()),
        }
    }

    /// Whether this NF offers `name`; an empty configured list offers everything
    pub fn nf_service_is_available(&self, name: &str) -> bool {
        let configured = &self.config.service_name;
        configured.is_empty() || configured.iter().any(|s| s == name)
    }

    // ----------------------------------------------------------------
    // NF instances
    // ----------------------------------------------------------------

    pub fn nf_instance_maximum_number_is_reached(&self) -> bool {
        self.nf_instances.is_full()
    }

    /// Add an NF instance with default priority, capacity and load
    pub fn nf_instance_add(&mut self, nf_type: NfType) -> SbiResult<NfInstanceId> {
        self.ensure_initialized()?;
        if self.nf_instance_maximum_number_is_reached() {
            log::error!(
                "Maximum number of NF instances [{}] reached",
                self.nf_instances.capacity()
            );
            return Err(SbiError::PoolExhausted("nf_instance"));
        }

        let heartbeat = self.config.heartbeat_interval(nf_type);
        let id = self
            .nf_instances
            .alloc(NfInstance::new(nf_type, heartbeat))
            .ok_or(SbiError::PoolExhausted("nf_instance"))?;
        self.nf_instance_list.push(id);

        log::debug!(
            "[{}] NF instance add ({}) [{}/{}]",
            nf_type,
            id,
            self.nf_instances.allocated(),
            self.nf_instances.capacity()
        );
        Ok(id)
    }

    pub fn nf_instance(&self, id: NfInstanceId) -> Option<&NfInstance> {
        self.nf_instances.find(id)
    }

    pub fn nf_instance_mut(&mut self, id: NfInstanceId) -> Option<&mut NfInstance> {
        self.nf_instances.find_mut(id)
    }

    /// All instances in insertion order
    pub fn nf_instances(&self) -> impl Iterator<Item = (NfInstanceId, &NfInstance)> {
        self.nf_instance_list
            .iter()
            .filter_map(|id| self.nf_instances.find(*id).map(|instance| (*id, instance)))
    }

    pub fn nf_instance_count(&self) -> usize {
        self.nf_instances.allocated()
    }

    /// Remove an NF instance with everything hanging off it
    ///
    /// Info blocks, services and their clients, addresses, subscriptions
    /// requested by this instance and the instance client all go. Handles
    /// to the instance held elsewhere stop resolving.
    pub fn nf_instance_remove(&mut self, id: NfInstanceId) -> SbiResult<()> {
        let Some(mut instance) = self.nf_instances.free(id) else {
            return Err(SbiError::NotFound(format!("NF instance {}", id)));
        };
        self.nf_instance_list.retain(|other| *other != id);

        instance.nf_info_remove_all();
        for mut service in instance.services.drain(..) {
            service.clear();
            self.clients.release(&mut service.client);
            self.nf_service_count -= 1;
        }
        instance.clear();

        if let Some(instance_id) = instance.id.as_deref() {
            self.subscription_data_remove_all_by_nf_instance_id(instance_id);
        }
        self.clients.release(&mut instance.client);

        log::debug!(
            "[{}:{}] NF instance removed [{}/{}]",
            instance.nf_type,
            instance.id_str(),
            self.nf_instances.allocated(),
            self.nf_instances.capacity()
        );
        Ok(())
    }

    pub fn nf_instance_remove_all(&mut self) {
        for id in std::mem::take(&mut self.nf_instance_list) {
            if let Err(e) = self.nf_instance_remove(id) {
                log::warn!("{}", e);
            }
        }
    }

    /// Find an instance by its NF instance id
    pub fn nf_instance_find(&self, nf_instance_id: &str) -> Option<NfInstanceId> {
        self.nf_instances()
            .find(|(_, instance)| instance.id.as_deref() == Some(nf_instance_id))
            .map(|(id, _)| id)
    }

    /// First registered instance answering the discovery
    pub fn nf_instance_find_by_discovery_param(
        &self,
        target_nf_type: NfType,
        requester_nf_type: NfType,
        option: Option<&SbiDiscoveryOption>,
    ) -> Option<NfInstanceId> {
        let serving = &self.config.serving_plmn_id;
        self.nf_instances()
            .find(|(_, instance)| {
                discovery_param_is_matched(
                    instance,
                    target_nf_type,
                    requester_nf_type,
                    serving,
                    option,
                )
            })
            .map(|(id, _)| id)
    }

    /// First registered instance offering `service_type`
    pub fn nf_instance_find_by_service_type(
        &self,
        service_type: SbiServiceType,
        requester_nf_type: NfType,
    ) -> Option<NfInstanceId> {
        let mut option = SbiDiscoveryOption::new();
        if let Err(e) = option.add_service_names(service_type.to_name()) {
            log::error!("[{}] {}", service_type, e);
            return None;
        }
        self.nf_instance_find_by_discovery_param(
            service_type.to_nf_type(),
            requester_nf_type,
            Some(&option),
        )
    }

    /// Fill an instance from this NF's own configuration
    ///
    /// Marks it registered and copies heartbeat, advertised FQDN and
    /// addresses, and the serving PLMNs.
    pub fn nf_instance_build_default(&mut self, id: NfInstanceId) -> SbiResult<()> {
        let Some(instance) = self.nf_instances.find_mut(id) else {
            return Err(SbiError::NotFound(format!("NF instance {}", id)));
        };
        let server = &self.config.server;

        instance.set_status(NfStatus::Registered);
        instance.heartbeat_interval = self.config.heartbeat_interval(instance.nf_type);

        instance.clear();
        if let Some(fqdn) = &server.fqdn {
            instance.set_fqdn(fqdn.clone());
        }
        for addr in &server.advertise {
            match addr {
                SocketAddr::V4(_) => instance.add_ipv4(*addr)?,
                SocketAddr::V6(_) => instance.add_ipv6(*addr)?,
            }
        }

        instance.plmn_ids.clear();
        for plmn_id in &self.config.serving_plmn_id {
            instance.add_plmn_id(*plmn_id)?;
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // NF services
    // ----------------------------------------------------------------

    /// Add a service to an instance; the name must be new to that instance
    pub fn nf_service_add(
        &mut self,
        instance_id: NfInstanceId,
        service_id: impl Into<String>,
        name: impl Into<String>,
        scheme: UriScheme,
    ) -> SbiResult<()> {
        let name = name.into();
        if self.nf_service_count >= self.config.pool.nf_service {
            log::error!(
                "Maximum number of NF services [{}] reached",
                self.config.pool.nf_service
            );
            return Err(SbiError::PoolExhausted("nf_service"));
        }
        let Some(instance) = self.nf_instances.find_mut(instance_id) else {
            return Err(SbiError::NotFound(format!("NF instance {}", instance_id)));
        };
        if instance.service_find_by_name(&name).is_some() {
            return Err(SbiError::Conflict(format!(
                "[{}] service {} already exists",
                instance.id_str(),
                name
            )));
        }

        log::debug!("[{}] NF service add [{}]", instance.id_str(), name);
        let service = NfService::new(instance_id, service_id, name, scheme);
        bounded_push(
            &mut instance.services,
            service,
            "NF services",
            limits::MAX_NUM_OF_NF_SERVICE,
        )?;
        self.nf_service_count += 1;
        Ok(())
    }

    pub fn nf_service(&self, instance_id: NfInstanceId, name: &str) -> Option<&NfService> {
        self.nf_instances
            .find(instance_id)?
            .service_find_by_name(name)
    }

    pub fn nf_service_mut(
        &mut self,
        instance_id: NfInstanceId,
        name: &str,
    ) -> Option<&mut NfService> {
        self.nf_instances
            .find_mut(instance_id)?
            .service_find_by_name_mut(name)
    }

    /// Withdraw one service, releasing its client
    pub fn nf_service_remove(&mut self, instance_id: NfInstanceId, name: &str) -> SbiResult<()> {
        let Some(instance) = self.nf_instances.find_mut(instance_id) else {
            return Err(SbiError::NotFound(format!("NF instance {}", instance_id)));
        };
        let Some(pos) = instance.services.iter().position(|s| s.name == name) else {
            return Err(SbiError::NotFound(format!(
                "[{}] service {}",
                instance.id_str(),
                name
            )));
        };

        let mut service = instance.services.remove(pos);
        log::debug!("[{}] NF service remove [{}]", instance.id_str(), service.name);
        service.clear();
        self.clients.release(&mut service.client);
        self.nf_service_count -= 1;
        Ok(())
    }

    pub fn nf_service_remove_all(&mut self, instance_id: NfInstanceId) -> SbiResult<()> {
        let names: Vec<String> = match self.nf_instances.find(instance_id) {
            Some(instance) => instance.services.iter().map(|s| s.name.clone()).collect(),
            None => return Err(SbiError::NotFound(format!("NF instance {}", instance_id))),
        };
        for name in names {
            self.nf_service_remove(instance_id, &name)?;
        }
        Ok(())
    }

    /// Number of services across all instances
    pub fn nf_service_count(&self) -> usize {
        self.nf_service_count
    }

    /// Add service `name` to an instance from this NF's own configuration
    ///
    /// The service gets a fresh UUID, the server scheme, version v1 and the
    /// advertised FQDN and addresses. An address port equal to the scheme
    /// default is stored as 0.
    pub fn nf_service_build_default(
        &mut self,
        instance_id: NfInstanceId,
        name: &str,
    ) -> SbiResult<()> {
        let scheme = self.config.server.scheme;
        self.nf_service_add(instance_id, uuid::Uuid::new_v4().to_string(), name, scheme)?;

        let fqdn = self.config.server.fqdn.clone();
        let advertise = self.config.server.advertise.clone();
        let Some(service) = self.nf_service_mut(instance_id, name) else {
            return Err(SbiError::NotFound(format!("service {}", name)));
        };

        service.add_version(api::V1, api::V1_0_0, None)?;
        service.fqdn = fqdn;
        for mut addr in advertise {
            if addr.port() == scheme.default_port() {
                addr.set_port(0);
            }
            let addr = match addr {
                SocketAddr::V4(_) => NfServiceAddr {
                    ipv4: Some(addr),
                    ipv6: None,
                },
                SocketAddr::V6(_) => NfServiceAddr {
                    ipv4: None,
                    ipv6: Some(addr),
                },
            };
            service.add_addr(addr)?;
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // Client endpoint resolution
    // ----------------------------------------------------------------

    /// Default port for `scheme`, or for the configured client scheme
    pub fn default_client_port(&self, scheme: Option<UriScheme>) -> u16 {
        scheme.unwrap_or(self.config.client.scheme).default_port()
    }

    /// Transport identity of an instance
    ///
    /// First IPv4 and first IPv6 address, the FQDN, and the port from the
    /// instance's info blocks when they override it. None when the
    /// instance has nothing to connect to.
    pub fn nf_instance_client_key(&self, id: NfInstanceId) -> Option<SbiClientKey> {
        let instance = self.nf_instances.find(id)?;
        let scheme = self.config.client.scheme;
        let ipv4 = instance.ipv4.first().copied();
        let ipv6 = instance.ipv6.first().copied();
        let port = instance
            .port_override(scheme)
            .or_else(|| ipv4.or(ipv6).map(|addr| addr.port()))
            .unwrap_or(0);

        let key = SbiClientKey::new(scheme, instance.fqdn.clone(), port, ipv4, ipv6);
        key.is_reachable().then_some(key)
    }

    /// Transport identity of one service, at the service's own scheme
    ///
    /// Only the first advertised address entry is used.
    pub fn nf_service_client_key(
        &self,
        instance_id: NfInstanceId,
        name: &str,
    ) -> Option<SbiClientKey> {
        let service = self.nf_service(instance_id, name)?;
        let addr = service.addr.first();
        let ipv4 = addr.and_then(|a| a.ipv4);
        let ipv6 = addr.and_then(|a| a.ipv6);
        let port = ipv4.or(ipv6).map(|addr| addr.port()).unwrap_or(0);

        let key = SbiClientKey::new(service.scheme, service.fqdn.clone(), port, ipv4, ipv6);
        key.is_reachable().then_some(key)
    }

    /// Existing client matching the instance's transport identity
    pub fn nf_instance_find_client(&self, id: NfInstanceId) -> Option<ClientId> {
        self.nf_instance_client_key(id)
            .and_then(|key| self.clients.find(&key))
    }

    /// Bind a client to the instance and to each of its services
    pub fn client_associate(&mut self, id: NfInstanceId) -> SbiResult<ClientId> {
        let Some(key) = self.nf_instance_client_key(id) else {
            return Err(SbiError::NotFound(format!(
                "NF instance {} has no reachable address",
                id
            )));
        };
        let client = self.clients.obtain(key)?;
        let Some(instance) = self.nf_instances.find_mut(id) else {
            self.clients.remove(client);
            return Err(SbiError::NotFound(format!("NF instance {}", id)));
        };
        self.clients.bind(&mut instance.client, client);
        log::debug!("[{}] client associated", instance.id_str());

        let names: Vec<String> = instance.services.iter().map(|s| s.name.clone()).collect();
        for name in names {
            if let Err(e) = self.nf_service_associate_client(id, &name) {
                log::warn!("[{}] {}", name, e);
            }
        }
        Ok(client)
    }

    /// Bind a client to one service
    ///
    /// Returns None when the service exposes no address of its own; lookups
    /// then fall back to the instance client.
    pub fn nf_service_associate_client(
        &mut self,
        instance_id: NfInstanceId,
        name: &str,
    ) -> SbiResult<Option<ClientId>> {
        let Some(key) = self.nf_service_client_key(instance_id, name) else {
            return Ok(None);
        };
        let client = self.clients.obtain(key)?;
        let Some(service) = self
            .nf_instances
            .find_mut(instance_id)
            .and_then(|instance| instance.service_find_by_name_mut(name))
        else {
            self.clients.remove(client);
            return Err(SbiError::NotFound(format!("service {}", name)));
        };
        self.clients.bind(&mut service.client, client);
        Ok(Some(client))
    }

    /// Client for `name` at `api_version`, else the instance client
    pub fn client_find_by_service_name(
        &self,
        instance_id: NfInstanceId,
        name: &str,
        api_version: &str,
    ) -> Option<ClientId> {
        let instance = self.nf_instances.find(instance_id)?;
        instance
            .services
            .iter()
            .filter(|service| service.name == name)
            .filter(|service| service.versions.iter().any(|v| v.in_uri == api_version))
            .find_map(|service| service.client)
            .or(instance.client)
    }

    /// Client for `service_type` at any version, else the instance client
    pub fn client_find_by_service_type(
        &self,
        instance_id: NfInstanceId,
        service_type: SbiServiceType,
    ) -> Option<ClientId> {
        let instance = self.nf_instances.find(instance_id)?;
        instance
            .services
            .iter()
            .filter(|service| service.name == service_type.to_name())
            .find_map(|service| service.client)
            .or(instance.client)
    }

    pub fn client(&self, id: ClientId) -> Option<&SbiClient> {
        self.clients.get(id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.count()
    }

    // ----------------------------------------------------------------
    // Visited PLMN
    // ----------------------------------------------------------------

    /// Whether `plmn_id` is foreign to the serving PLMNs
    pub fn plmn_id_in_vplmn(&self, plmn_id: &PlmnId) -> bool {
        let serving = &self.config.serving_plmn_id;
        !serving.is_empty() && !serving.contains(plmn_id)
    }

    /// Whether an IMSI-based SUPI belongs to a foreign PLMN
    pub fn supi_in_vplmn(&self, supi: &str) -> bool {
        let serving = &self.config.serving_plmn_id;
        if serving.is_empty() {
            return false;
        }
        let Some(digits) = supi.strip_prefix("imsi-") else {
            log::error!("Invalid SUPI [{}]", supi);
            return false;
        };
        !serving.iter().any(|plmn_id| {
            digits.starts_with(&format!("{}{}", plmn_id.mcc_string(), plmn_id.mnc_string()))
        })
    }

    /// Whether a 3GPP network FQDN lies outside every serving PLMN's domain
    pub fn fqdn_in_vplmn(&self, fqdn: &str) -> bool {
        let serving = &self.config.serving_plmn_id;
        if serving.is_empty() || !fqdn.ends_with(".3gppnetwork.org") {
            return false;
        }
        !serving
            .iter()
            .any(|plmn_id| fqdn.contains(&plmn_id.home_network_domain()))
    }

    // ----------------------------------------------------------------
    // Timers
    // ----------------------------------------------------------------

    /// Time until the next timer fires
    pub fn next_timeout(&self, now: Instant) -> Option<Duration> {
        self.timers.next(now)
    }

    pub fn process_timers(&mut self) -> Vec<SbiTimerEvent> {
        self.process_at(Instant::now())
    }

    /// Expire every timer due at `now` and report what fired
    ///
    /// Events whose owner is already gone are dropped.
    pub fn process_at(&mut self, now: Instant) -> Vec<SbiTimerEvent> {
        self.timers
            .expire(now)
            .into_iter()
            .filter_map(|timer| self.timers.data(timer).copied())
            .filter(|event| match event {
                SbiTimerEvent::ClientWaitExpire(xact) => self.xacts.contains(*xact),
                SbiTimerEvent::SubscriptionValidity(data)
                | SbiTimerEvent::SubscriptionPatch(data) => self.subscription_data.contains(*data),
            })
            .collect()
    }
}
