//! NextGCore SBI (Service Based Interface) Library
//!
//! Control-plane registry of a 5G network function: the NF instances and
//! services it knows about, NF discovery matching, transport-client
//! resolution, outbound transactions and NF status subscriptions.
//!
//! Sockets, TLS and the HTTP/2 codec are not in here. This crate decides
//! *who* to talk to and keeps track of *what* is in flight; the transport
//! layer carries the bytes.
//!
//! # Modules
//!
//! - [`types`] - NF types, service types and enumerations
//! - [`constants`] - Status codes, limits, defaults and feature bits
//! - [`plmn`] - PLMN identifier codec
//! - [`message`] - Request/response headers and the discovery option
//! - [`config`] - SBI configuration (YAML)
//! - [`nf`] - NF instance and NF service profiles
//! - [`discovery`] - Discovery matching predicates
//! - [`client`] - Transport-client registry
//! - [`context`] - The SBI context owning everything above
//! - [`xact`] - Outbound transactions
//! - [`subscription`] - Subscription specs and data
//! - [`server`] - Error replies
//! - [`error`] - Error types

pub mod client;
pub mod config;
pub mod constants;
pub mod context;
pub mod discovery;
pub mod error;
pub mod message;
pub mod nf;
pub mod plmn;
pub mod server;
pub mod subscription;
pub mod types;
pub mod xact;


// Re-export commonly used types
pub use client::{ClientFactory, ClientId, SbiClient, SbiClientKey, SbiClientRegistry};
pub use config::{DelegatedMode, SbiConfig};
pub use context::{SbiContext, SbiTimerEvent};
pub use discovery::{
    discovery_option_is_matched, discovery_param_is_matched, requester_plmn_list_is_matched,
    serving_plmn_list_is_matched, service_names_is_matched, target_plmn_list_is_matched,
};
pub use error::{SbiError, SbiResult};
pub use message::{ProblemDetails, SbiDiscoveryOption, SbiHeader, SbiRequest, SbiResponse};
pub use nf::{NfInfo, NfInstance, NfInstanceId, NfService};
pub use plmn::PlmnId;
pub use server::{build_error_response, SbiErrorSink, SbiResponseQueue, StreamId};
pub use subscription::{SubscriptionData, SubscriptionDataId, SubscriptionSpec};
pub use types::{NfStatus, NfType, SbiServiceType, UriScheme};
pub use xact::{ObjectId, SbiObject, SbiXact, XactId};

#[cfg(test)]
mod tests {
    use super::*;

    fn udm(ctx: &mut SbiContext, id: &str, services: &[&str]) -> NfInstanceId {
        let handle = ctx.nf_instance_add(NfType::Udm).unwrap();
        let instance = ctx.nf_instance_mut(handle).unwrap();
        instance.set_id(id);
        instance.set_status(NfStatus::Registered);
        for (i, name) in services.iter().enumerate() {
            ctx.nf_service_add(handle, format!("{}-{}", id, i), *name, UriScheme::Http)
                .unwrap();
        }
        handle
    }

    #[test]
    fn test_discovery_needs_every_service_name() {
        let mut ctx = SbiContext::new(NfType::Amf, SbiConfig::default()).unwrap();
        udm(&mut ctx, "udm-sdm-only", &["nudm-sdm"]);
        let both = udm(&mut ctx, "udm-both", &["nudm-sdm", "nudm-uecm"]);

        let mut option = SbiDiscoveryOption::new();
        option.add_service_names("nudm-sdm").unwrap();
        option.add_service_names("nudm-uecm").unwrap();
        assert_eq!(
            ctx.nf_instance_find_by_discovery_param(NfType::Udm, NfType::Amf, Some(&option)),
            Some(both)
        );

        ctx.nf_instance_remove(both).unwrap();
        assert_eq!(
            ctx.nf_instance_find_by_discovery_param(NfType::Udm, NfType::Amf, Some(&option)),
            None
        );
    }

    #[test]
    fn test_xact_rejects_request_for_other_service() {
        let mut ctx = SbiContext::new(NfType::Amf, SbiConfig::default()).unwrap();
        let object = ctx.object_add().unwrap();

        let result = ctx.xact_add(object, SbiServiceType::NudmUecm, None, || {
            Some(SbiRequest::new(SbiHeader::with_service("GET", "nudm-sdm", "v2")))
        });
        assert!(matches!(result, Err(SbiError::InvalidParam(_))));
        assert_eq!(ctx.xact_count(), 0);

        let id = ctx
            .xact_add(object, SbiServiceType::NudmSdm, None, || {
                Some(SbiRequest::new(SbiHeader::with_service("GET", "nudm-sdm", "v2")))
            })
            .unwrap();
        assert!(ctx.xact_find(id).is_some());
        ctx.object_free(object).unwrap();
    }
}
