//! NF Discovery matching
//!
//! Pure predicates deciding whether a known NF instance satisfies a
//! discovery request. None of them allocate or fail: no match is a plain
//! `false`.

use crate::message::SbiDiscoveryOption;
use crate::nf::NfInstance;
use crate::plmn::PlmnId;
use crate::types::{NfStatus, NfType};

fn plmn_lists_intersect(a: &[PlmnId], b: &[PlmnId]) -> bool {
    a.iter().any(|plmn_id| b.contains(plmn_id))
}

/// Whether `instance` answers a discovery for `target_nf_type`
///
/// Checks, cheapest first: discoverability and registration, NF type, the
/// serving PLMN pre-check (only when the option carries no target PLMN
/// list), then the option itself.
pub fn discovery_param_is_matched(
    instance: &NfInstance,
    target_nf_type: NfType,
    requester_nf_type: NfType,
    serving_plmn_list: &[PlmnId],
    option: Option<&SbiDiscoveryOption>,
) -> bool {
    if instance.excluded_from_discovery {
        return false;
    }
    if instance.status != NfStatus::Registered {
        return false;
    }
    if instance.nf_type != target_nf_type {
        return false;
    }

    // Without an explicit target PLMN the caller means its own network:
    // do not let a home-network NF answer for the serving PLMN.
    let has_target_plmn = option.is_some_and(|o| !o.target_plmn_list.is_empty());
    if !has_target_plmn && !serving_plmn_list_is_matched(instance, serving_plmn_list) {
        return false;
    }

    match option {
        Some(option) => discovery_option_is_matched(instance, requester_nf_type, option),
        None => true,
    }
}

/// Instance PLMNs intersect the serving PLMNs; true when either list is empty
pub fn serving_plmn_list_is_matched(instance: &NfInstance, serving_plmn_list: &[PlmnId]) -> bool {
    if serving_plmn_list.is_empty() || instance.plmn_ids.is_empty() {
        return true;
    }
    plmn_lists_intersect(&instance.plmn_ids, serving_plmn_list)
}

/// Every constraint the option carries holds for `instance`
pub fn discovery_option_is_matched(
    instance: &NfInstance,
    requester_nf_type: NfType,
    option: &SbiDiscoveryOption,
) -> bool {
    if let (Some(target), Some(id)) = (&option.target_nf_instance_id, &instance.id) {
        if target != id {
            return false;
        }
    }
    if !option.service_names.is_empty()
        && !service_names_is_matched(instance, requester_nf_type, option)
    {
        return false;
    }
    if !option.target_plmn_list.is_empty() && !target_plmn_list_is_matched(instance, option) {
        return false;
    }
    true
}

/// Every requested name is carried by a service that admits the requester
pub fn service_names_is_matched(
    instance: &NfInstance,
    requester_nf_type: NfType,
    option: &SbiDiscoveryOption,
) -> bool {
    option.service_names.iter().all(|name| {
        instance
            .services
            .iter()
            .any(|service| service.name == *name && service.is_allowed_nf_type(requester_nf_type))
    })
}

pub fn target_plmn_list_is_matched(instance: &NfInstance, option: &SbiDiscoveryOption) -> bool {
    plmn_lists_intersect(&instance.plmn_ids, &option.target_plmn_list)
}

pub fn requester_plmn_list_is_matched(instance: &NfInstance, option: &SbiDiscoveryOption) -> bool {
    plmn_lists_intersect(&instance.plmn_ids, &option.requester_plmn_list)
}
