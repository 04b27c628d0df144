//! SEPP N32c Handshake Handlers
//!
//! Security capability negotiation with a peer SEPP. Every check runs
//! before the node is touched, so a rejected message leaves the node
//! exactly as it was.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ogs_sbi::constants::{limits, status};
use ogs_sbi::{PlmnId, SbiErrorSink, SbiRequest, SbiResponse, StreamId};

use crate::context::{
    parse_supported_features, SecurityCapability, SecurityCapabilityConf, SeppContext,
    SeppNodeId, SeppNode,
};

/// SecNegotiateReqData (TS 29.573)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecNegotiateReqData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_sec_capability_list: Option<Vec<SecurityCapability>>,
    #[serde(
        rename = "3GppSbiTargetApiRootSupported",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_apiroot_supported: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plmn_id_list: Option<Vec<PlmnId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_plmn_id: Option<PlmnId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<String>,
}

/// SecNegotiateRspData (TS 29.573)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecNegotiateRspData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_sec_capability: Option<SecurityCapability>,
    #[serde(
        rename = "3GppSbiTargetApiRootSupported",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_apiroot_supported: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plmn_id_list: Option<Vec<PlmnId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<String>,
}

/// N32c handshake failures
///
/// The display string of a variant is the title of the error reply sent
/// back to the peer.
#[derive(Error, Debug)]
pub enum N32cError {
    #[error("No SecNegotiateReqData")]
    NoRequestData,

    #[error("No SecNegotiateRspData")]
    NoResponseData,

    #[error("Cannot decode N32c message: {0}")]
    Decode(serde_json::Error),

    #[error("Cannot encode N32c message: {0}")]
    Encode(serde_json::Error),

    #[error("No sender")]
    NoSender,

    /// The message claims to come from another SEPP
    #[error("FQDN mismatch Sender [{0}]")]
    SenderMismatch(String),

    #[error("No supported_sec_capability_list")]
    NoCapabilityList,

    #[error("Unknown SupportedSecCapability")]
    UnsupportedCapability,

    #[error("No selected_sec_capability")]
    NoSelectedCapability,

    #[error("Too many PLMN IDs [{0}]")]
    TooManyPlmns(usize),

    #[error("Invalid supportedFeatures [{0}]")]
    InvalidFeatures(String),

    #[error("Unexpected status [{0}]")]
    UnexpectedStatus(u16),

    #[error("No local security capability")]
    NoLocalCapability,

    #[error("Unknown SEPP node")]
    UnknownNode,
}

impl N32cError {
    /// Whether the peer gets an error reply for this failure
    pub fn is_replied(&self) -> bool {
        matches!(
            self,
            N32cError::NoRequestData
                | N32cError::Decode(_)
                | N32cError::NoSender
                | N32cError::NoCapabilityList
                | N32cError::UnsupportedCapability
                | N32cError::TooManyPlmns(_)
                | N32cError::InvalidFeatures(_)
        )
    }
}

/// Scheme chosen from the peer's offer
///
/// NONE in the offer wins outright. Otherwise TLS, then PRINS, each only
/// when enabled locally as well.
pub fn select_security_capability(
    offered: &[SecurityCapability],
    local: &SecurityCapabilityConf,
) -> Option<SecurityCapability> {
    if offered.contains(&SecurityCapability::None) {
        Some(SecurityCapability::None)
    } else if offered.contains(&SecurityCapability::Tls) && local.tls {
        Some(SecurityCapability::Tls)
    } else if offered.contains(&SecurityCapability::Prins) && local.prins {
        Some(SecurityCapability::Prins)
    } else {
        None
    }
}

fn check_sender(node: &SeppNode, sender: Option<&str>) -> Result<(), N32cError> {
    let sender = sender.ok_or(N32cError::NoSender)?;
    if sender != node.receiver {
        return Err(N32cError::SenderMismatch(sender.to_string()));
    }
    Ok(())
}

fn check_plmn_list(list: Option<&Vec<PlmnId>>) -> Result<Vec<PlmnId>, N32cError> {
    let list = list.cloned().unwrap_or_default();
    if list.len() > limits::MAX_NUM_OF_PLMN {
        return Err(N32cError::TooManyPlmns(list.len()));
    }
    Ok(list)
}

fn check_features(features: Option<&str>) -> Result<Option<u64>, N32cError> {
    features
        .map(|s| parse_supported_features(s).ok_or_else(|| N32cError::InvalidFeatures(s.to_string())))
        .transpose()
}

/// Negotiated values, applied to the node only after every check passed
struct Negotiated {
    scheme: SecurityCapability,
    target_apiroot_supported: bool,
    plmn_ids: Vec<PlmnId>,
    target_plmn_id: Option<PlmnId>,
    supported_features: Option<u64>,
}

impl Negotiated {
    fn apply(self, node: &mut SeppNode) {
        node.negotiated_security_scheme = Some(self.scheme);
        if self.target_apiroot_supported {
            node.target_apiroot_supported = true;
        }
        node.plmn_ids = self.plmn_ids;
        if let Some(target_plmn_id) = self.target_plmn_id {
            node.target_plmn_id = Some(target_plmn_id);
        }
        node.supported_features = match self.supported_features {
            Some(features) => node.supported_features & features,
            None => 0,
        };
    }
}

fn negotiate_request(
    local: &SecurityCapabilityConf,
    node: &SeppNode,
    request: &SbiRequest,
) -> Result<Negotiated, N32cError> {
    let data: SecNegotiateReqData = request
        .json_body()
        .ok_or(N32cError::NoRequestData)?
        .map_err(N32cError::Decode)?;

    check_sender(node, data.sender.as_deref())?;

    let offered = data
        .supported_sec_capability_list
        .as_ref()
        .ok_or(N32cError::NoCapabilityList)?;
    let scheme = match select_security_capability(offered, local) {
        Some(scheme) => scheme,
        None => {
            for capability in offered {
                log::error!(
                    "[{}] Unknown SupportedSecCapability [{}]",
                    node.receiver,
                    capability
                );
            }
            return Err(N32cError::UnsupportedCapability);
        }
    };

    Ok(Negotiated {
        scheme,
        target_apiroot_supported: data.target_apiroot_supported == Some(true),
        plmn_ids: check_plmn_list(data.plmn_id_list.as_ref())?,
        target_plmn_id: data.target_plmn_id,
        supported_features: check_features(data.supported_features.as_deref())?,
    })
}

/// Handle an incoming security capability request from `node`
///
/// Malformed requests are answered with 400 on `stream`. A request from
/// the wrong sender is dropped without a reply.
pub fn handle_security_capability_request(
    local: &SecurityCapabilityConf,
    node: &mut SeppNode,
    stream: StreamId,
    request: &SbiRequest,
    sink: &mut dyn SbiErrorSink,
) -> Result<SecurityCapability, N32cError> {
    match negotiate_request(local, node, request) {
        Ok(negotiated) => {
            let scheme = negotiated.scheme;
            negotiated.apply(node);
            log::info!("[{}] Security capability [{}] negotiated", node.receiver, scheme);
            Ok(scheme)
        }
        Err(e) => {
            log::error!("[{}] {}", node.receiver, e);
            if e.is_replied() {
                sink.send_error(
                    stream,
                    status::BAD_REQUEST,
                    Some(&request.header),
                    &e.to_string(),
                    &node.receiver,
                );
            }
            Err(e)
        }
    }
}

fn negotiate_response(node: &SeppNode, response: &SbiResponse) -> Result<Negotiated, N32cError> {
    if !response.is_success() {
        return Err(N32cError::UnexpectedStatus(response.status));
    }
    if response.http.content.is_none() {
        return Err(N32cError::NoResponseData);
    }
    let data: SecNegotiateRspData = response.json_body().map_err(N32cError::Decode)?;

    check_sender(node, data.sender.as_deref())?;

    let scheme = match data.selected_sec_capability {
        Some(SecurityCapability::Unknown) | None => {
            return Err(N32cError::NoSelectedCapability)
        }
        Some(scheme) => scheme,
    };

    Ok(Negotiated {
        scheme,
        target_apiroot_supported: data.target_apiroot_supported == Some(true),
        plmn_ids: check_plmn_list(data.plmn_id_list.as_ref())?,
        target_plmn_id: None,
        supported_features: check_features(data.supported_features.as_deref())?,
    })
}

/// Handle the peer's answer to our security capability request
///
/// Failures are only reported to the caller.
pub fn handle_security_capability_response(
    node: &mut SeppNode,
    response: &SbiResponse,
) -> Result<SecurityCapability, N32cError> {
    match negotiate_response(node, response) {
        Ok(negotiated) => {
            let scheme = negotiated.scheme;
            negotiated.apply(node);
            log::info!("[{}] Security capability [{}] selected by peer", node.receiver, scheme);
            Ok(scheme)
        }
        Err(e) => {
            log::error!("[{}] {}", node.receiver, e);
            Err(e)
        }
    }
}

impl SeppContext {
    pub fn handle_security_capability_request(
        &mut self,
        id: SeppNodeId,
        stream: StreamId,
        request: &SbiRequest,
        sink: &mut dyn SbiErrorSink,
    ) -> Result<SecurityCapability, N32cError> {
        let local = &self.security_capability;
        let node = self.nodes.find_mut(id).ok_or(N32cError::UnknownNode)?;
        handle_security_capability_request(local, node, stream, request, sink)
    }

    pub fn handle_security_capability_response(
        &mut self,
        id: SeppNodeId,
        response: &SbiResponse,
    ) -> Result<SecurityCapability, N32cError> {
        let node = self.nodes.find_mut(id).ok_or(N32cError::UnknownNode)?;
        handle_security_capability_response(node, response)
    }
}
