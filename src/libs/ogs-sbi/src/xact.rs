//! SBI transactions
//!
//! One [`SbiXact`] per outbound request in flight. It belongs to an
//! [`SbiObject`] (the business object issuing the request), owns its
//! discovery option and request, and runs a client-wait timer. A transaction
//! is removed exactly once: on response, on timer expiry, or when its owner
//! goes away.

use std::collections::HashMap;

use ogs_core::{OgsPoolId, OgsTimerId};

use crate::constants::features;
use crate::context::{SbiContext, SbiTimerEvent};
use crate::error::{SbiError, SbiResult};
use crate::message::{SbiDiscoveryOption, SbiRequest};
use crate::nf::NfInstanceId;
use crate::types::{NfType, SbiServiceType};

/// Handle of a transaction
pub type XactId = OgsPoolId;

/// Handle of an SBI object
pub type ObjectId = OgsPoolId;

/// Owner of transactions
///
/// Also remembers which NF instance was picked for each service type and NF
/// type. Those are plain handles: a removed instance stops resolving.
#[derive(Debug, Clone, Default)]
pub struct SbiObject {
    pub xact_list: Vec<XactId>,
    service_type_array: HashMap<SbiServiceType, NfInstanceId>,
    nf_type_array: HashMap<NfType, NfInstanceId>,
}

impl SbiObject {
    pub fn set_nf_instance_for_service(
        &mut self,
        service_type: SbiServiceType,
        nf_instance: NfInstanceId,
    ) {
        self.service_type_array.insert(service_type, nf_instance);
    }

    pub fn set_nf_instance_for_type(&mut self, nf_type: NfType, nf_instance: NfInstanceId) {
        self.nf_type_array.insert(nf_type, nf_instance);
    }

    pub fn nf_instance_for_service(&self, service_type: SbiServiceType) -> Option<NfInstanceId> {
        self.service_type_array.get(&service_type).copied()
    }

    pub fn nf_instance_for_type(&self, nf_type: NfType) -> Option<NfInstanceId> {
        self.nf_type_array.get(&nf_type).copied()
    }
}

/// Transaction
#[derive(Debug, Clone)]
pub struct SbiXact {
    pub object: ObjectId,
    pub service_type: SbiServiceType,
    pub requester_nf_type: NfType,
    pub discovery_option: SbiDiscoveryOption,
    pub request: SbiRequest,
    pub t_response: OgsTimerId,
    /// Overrides the apiRoot of the chosen peer (3gpp-Sbi-Target-apiRoot)
    pub target_apiroot: Option<String>,
    /// Discovery is left to the SCP
    pub delegated: bool,
}

impl SbiContext {
    pub fn object_add(&mut self) -> SbiResult<ObjectId> {
        self.ensure_initialized()?;
        self.objects
            .alloc(SbiObject::default())
            .ok_or(SbiError::PoolExhausted("sbi_object"))
    }

    pub fn object(&self, id: ObjectId) -> Option<&SbiObject> {
        self.objects.find(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut SbiObject> {
        self.objects.find_mut(id)
    }

    /// Instance picked for `service_type`, if it still exists
    pub fn object_nf_instance(
        &self,
        id: ObjectId,
        service_type: SbiServiceType,
    ) -> Option<NfInstanceId> {
        self.objects
            .find(id)?
            .nf_instance_for_service(service_type)
            .filter(|nf_instance| self.nf_instances.contains(*nf_instance))
    }

    /// Free an object
    ///
    /// Owners remove their transactions first. Any still linked are
    /// reported and removed here.
    pub fn object_free(&mut self, id: ObjectId) -> SbiResult<()> {
        let Some(object) = self.objects.find(id) else {
            return Err(SbiError::NotFound(format!("SBI object {}", id)));
        };
        if !object.xact_list.is_empty() {
            log::error!("SBI running [{}]", object.xact_list.len());
            self.xact_remove_all(id);
        }
        self.objects.free(id);
        Ok(())
    }

    pub fn object_count(&self) -> usize {
        self.objects.allocated()
    }

    /// Create a transaction for one outbound request
    ///
    /// Without `discovery_option` a fresh one is made with the
    /// service-map feature set. The service name implied by
    /// `service_type` is always part of the option. `build` runs once;
    /// returning None fails the transaction, and so does a request
    /// addressed by service name to any other service.
    ///
    /// On any failure nothing stays allocated and the caller must not
    /// retry with the same object right away.
    pub fn xact_add<F>(
        &mut self,
        object: ObjectId,
        service_type: SbiServiceType,
        discovery_option: Option<SbiDiscoveryOption>,
        build: F,
    ) -> SbiResult<XactId>
    where
        F: FnOnce() -> Option<SbiRequest>,
    {
        self.ensure_initialized()?;
        if !self.objects.contains(object) {
            return Err(SbiError::NotFound(format!("SBI object {}", object)));
        }
        if self.xacts.is_full() {
            log::error!(
                "Maximum number of SBI transactions [{}] reached",
                self.xacts.capacity()
            );
            return Err(SbiError::PoolExhausted("sbi_xact"));
        }

        let requester_nf_type = self.nf_type();
        let discovery = &self.config().discovery;
        let mut option = match discovery_option {
            Some(option) => option,
            None => {
                let mut option = SbiDiscoveryOption::new();
                features::set(
                    &mut option.requester_features,
                    features::NNRF_DISC_SERVICE_MAP,
                );
                option
            }
        };
        let service_name = service_type.to_name();
        if !option.service_names.iter().any(|n| n == service_name) {
            option.add_service_names(service_name)?;
        }
        if discovery.prefer_requester_nf_instance_id && option.requester_nf_instance_id.is_none() {
            if let Some(id) = self.self_instance().and_then(|me| me.id.clone()) {
                option.set_requester_nf_instance_id(id);
            }
        }

        let delegated = self.discovery_is_delegated();
        let wait = self.config().client_wait_duration();
        let timers = &mut self.timers;
        let result = self.xacts.try_alloc_with(|xact_id| {
            let Some(t_response) = timers.add(SbiTimerEvent::ClientWaitExpire(xact_id)) else {
                log::error!("[{}] No timer for SBI transaction", service_type);
                return Err(SbiError::TimerUnavailable);
            };
            let Some(request) = build() else {
                log::error!("[{}] Cannot build SBI request", service_type);
                timers.delete(t_response);
                return Err(SbiError::BuildFailed(service_type.to_name().to_string()));
            };

            if request.header.uri.is_none() {
                let requested = request.header.service_name.as_deref();
                if requested != Some(service_name) {
                    log::error!(
                        "[{}] Request service {:?} does not match discovery",
                        service_type,
                        requested
                    );
                    timers.delete(t_response);
                    return Err(SbiError::InvalidParam(format!(
                        "request service {:?} is not {}",
                        requested, service_name
                    )));
                }
            }

            timers.start(t_response, wait);
            Ok(SbiXact {
                object,
                service_type,
                requester_nf_type,
                discovery_option: option,
                request,
                t_response,
                target_apiroot: None,
                delegated,
            })
        });

        let xact_id = match result {
            Some(result) => result?,
            None => return Err(SbiError::PoolExhausted("sbi_xact")),
        };
        if let Some(owner) = self.objects.find_mut(object) {
            owner.xact_list.push(xact_id);
        }
        log::debug!("[{}] SBI transaction add ({})", service_type, xact_id);
        Ok(xact_id)
    }

    /// Live transaction behind a handle
    ///
    /// A reply for an already removed transaction finds nothing here and
    /// must be dropped by the caller.
    pub fn xact_find(&self, id: XactId) -> Option<&SbiXact> {
        self.xacts.find(id)
    }

    /// Value of the discovery service-names header for a transaction
    ///
    /// None when the transaction is gone or discovery is configured with
    /// `no_service_names`.
    pub fn xact_discovery_service_names(&self, id: XactId) -> Option<String> {
        if self.config().discovery.no_service_names {
            return None;
        }
        self.xacts.find(id)?.discovery_option.service_names_header()
    }

    pub fn xact_set_target_apiroot(&mut self, id: XactId, apiroot: &str) -> SbiResult<()> {
        match self.xacts.find_mut(id) {
            Some(xact) => {
                xact.target_apiroot = Some(apiroot.to_string());
                Ok(())
            }
            None => Err(SbiError::NotFound(format!("SBI transaction {}", id))),
        }
    }

    /// Remove a transaction; a second removal fails with NotFound
    pub fn xact_remove(&mut self, id: XactId) -> SbiResult<()> {
        let Some(xact) = self.xacts.free(id) else {
            log::error!("SBI transaction {} already removed", id);
            return Err(SbiError::NotFound(format!("SBI transaction {}", id)));
        };
        self.timers.delete(xact.t_response);
        if let Some(owner) = self.objects.find_mut(xact.object) {
            owner.xact_list.retain(|other| *other != id);
        }
        log::debug!("[{}] SBI transaction remove ({})", xact.service_type, id);
        Ok(())
    }

    /// Remove every transaction of an object
    pub fn xact_remove_all(&mut self, object: ObjectId) {
        let xacts = match self.objects.find_mut(object) {
            Some(owner) => std::mem::take(&mut owner.xact_list),
            None => return,
        };
        for id in xacts {
            if let Err(e) = self.xact_remove(id) {
                log::warn!("{}", e);
            }
        }
    }

    pub fn xact_count(&self) -> usize {
        self.xacts.allocated()
    }
}
