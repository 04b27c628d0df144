//! SEPP N32c Build Functions
//!
//! Security capability request/response messages sent to a peer SEPP.

use ogs_sbi::constants::{api, content_type, features, method, status};
use ogs_sbi::{SbiHeader, SbiRequest, SbiResponse, SbiServiceType};

use crate::context::{SecurityCapability, SeppContext, SeppNode, SeppNodeId};
use crate::n32c_handler::{N32cError, SecNegotiateReqData, SecNegotiateRspData};

/// Resource of the N32c capability exchange
pub const EXCHANGE_CAPABILITY: &str = "exchange-capability";

/// Build the SecNegotiateReqData offered to `node`
///
/// With `none` the offer is NONE only, used when tearing the association
/// down. The NF type list feature is always advertised.
pub fn build_security_capability_request(
    context: &SeppContext,
    node: &mut SeppNode,
    none: bool,
) -> Result<SecNegotiateReqData, N32cError> {
    let mut capabilities = Vec::new();
    if none {
        capabilities.push(SecurityCapability::None);
    } else {
        if context.security_capability.tls {
            capabilities.push(SecurityCapability::Tls);
        }
        if context.security_capability.prins {
            capabilities.push(SecurityCapability::Prins);
        }
    }
    if capabilities.is_empty() {
        log::error!("[{}] No supported security capabilities", node.receiver);
        return Err(N32cError::NoLocalCapability);
    }

    features::set(&mut node.supported_features, features::N32_HANDSHAKE_NFTLST);

    let data = SecNegotiateReqData {
        sender: Some(context.sender.clone()),
        supported_sec_capability_list: Some(capabilities),
        target_apiroot_supported: (!none && context.target_apiroot_supported).then_some(true),
        plmn_id_list: (!context.plmn_ids.is_empty()).then(|| context.plmn_ids.clone()),
        target_plmn_id: node.target_plmn_id,
        supported_features: Some(format!("{:x}", node.supported_features)),
    };

    log::debug!(
        "[{}] Built security capability request (none={})",
        node.receiver,
        none
    );
    Ok(data)
}

/// Build the SecNegotiateRspData answering `node`
///
/// The node must already hold a negotiated scheme.
pub fn build_security_capability_response(
    context: &SeppContext,
    node: &SeppNode,
) -> Result<SecNegotiateRspData, N32cError> {
    let selected = node
        .negotiated_security_scheme
        .ok_or(N32cError::NoSelectedCapability)?;

    let data = SecNegotiateRspData {
        sender: Some(context.sender.clone()),
        selected_sec_capability: Some(selected),
        target_apiroot_supported: (selected != SecurityCapability::None
            && context.target_apiroot_supported)
            .then_some(true),
        plmn_id_list: (!context.plmn_ids.is_empty()).then(|| context.plmn_ids.clone()),
        supported_features: Some(format!("{:x}", node.supported_features)),
    };

    log::debug!(
        "[{}] Built security capability response (scheme={})",
        node.receiver,
        selected
    );
    Ok(data)
}

/// POST /n32c-handshake/v1/exchange-capability
pub fn build_security_capability_sbi_request(
    context: &SeppContext,
    node: &mut SeppNode,
    none: bool,
) -> Result<SbiRequest, N32cError> {
    let data = build_security_capability_request(context, node, none)?;

    let mut header = SbiHeader::with_service(
        method::POST,
        SbiServiceType::N32cHandshake.to_name(),
        api::V1,
    );
    header.add_resource(EXCHANGE_CAPABILITY);

    SbiRequest::new(header)
        .with_json_body(&data)
        .map_err(N32cError::Encode)
}

/// 200 OK carrying the SecNegotiateRspData
pub fn build_security_capability_sbi_response(
    context: &SeppContext,
    node: &SeppNode,
) -> Result<SbiResponse, N32cError> {
    let data = build_security_capability_response(context, node)?;
    SbiResponse::with_status(status::OK)
        .with_json_body(&data, content_type::JSON)
        .map_err(N32cError::Encode)
}

impl SeppContext {
    /// Capability exchange request for node `id`
    pub fn build_security_capability_request(
        &mut self,
        id: SeppNodeId,
        none: bool,
    ) -> Result<SbiRequest, N32cError> {
        let mut node = self.nodes.find(id).cloned().ok_or(N32cError::UnknownNode)?;
        let request = build_security_capability_sbi_request(self, &mut node, none)?;
        if let Some(slot) = self.nodes.find_mut(id) {
            *slot = node;
        }
        Ok(request)
    }

    /// Capability exchange response for node `id`
    pub fn build_security_capability_response(
        &self,
        id: SeppNodeId,
    ) -> Result<SbiResponse, N32cError> {
        let node = self.nodes.find(id).ok_or(N32cError::UnknownNode)?;
        build_security_capability_sbi_response(self, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SecurityCapabilityConf, SeppConf};
    use ogs_sbi::{PlmnId, SbiConfig};

    const LOCAL: &str = "sepp.local.example.com";
    const PEER: &str = "sepp.peer.example.com";

    fn context(prins: bool) -> SeppContext {
        let conf = SeppConf {
            sender: LOCAL.to_string(),
            security_capability: SecurityCapabilityConf { tls: true, prins },
            ..Default::default()
        };
        let sbi = SbiConfig {
            serving_plmn_id: vec![PlmnId::new(1, 1, 2).unwrap()],
            ..Default::default()
        };
        SeppContext::new(&conf, &sbi).unwrap()
    }

    #[test]
    fn test_build_security_capability_request() {
        let ctx = context(true);
        let mut node = SeppNode::new(PEER, 0);
        node.target_plmn_id = Some(PlmnId::new(310, 260, 3).unwrap());

        let data = build_security_capability_request(&ctx, &mut node, false).unwrap();
        assert_eq!(data.sender.as_deref(), Some(LOCAL));
        assert_eq!(
            data.supported_sec_capability_list,
            Some(vec![SecurityCapability::Tls, SecurityCapability::Prins])
        );
        assert_eq!(data.target_apiroot_supported, Some(true));
        assert_eq!(data.plmn_id_list.as_ref().map(Vec::len), Some(1));
        assert_eq!(data.target_plmn_id, node.target_plmn_id);
        assert_eq!(data.supported_features.as_deref(), Some("1"));
        assert_eq!(node.supported_features, 1);
    }

    #[test]
    fn test_build_security_capability_request_none() {
        let ctx = context(false);
        let mut node = SeppNode::new(PEER, 0b100);

        let data = build_security_capability_request(&ctx, &mut node, true).unwrap();
        assert_eq!(
            data.supported_sec_capability_list,
            Some(vec![SecurityCapability::None])
        );
        assert_eq!(data.target_apiroot_supported, None);
        assert_eq!(data.supported_features.as_deref(), Some("5"));
    }

    #[test]
    fn test_request_wire_format() {
        let mut ctx = context(false);
        let id = ctx.node_add(PEER).unwrap();
        let request = ctx.build_security_capability_request(id, false).unwrap();

        assert_eq!(request.header.method, "POST");
        assert_eq!(request.header.service_name.as_deref(), Some("n32c-handshake"));
        assert_eq!(request.header.api_version.as_deref(), Some("v1"));
        assert_eq!(request.header.resource_path(), EXCHANGE_CAPABILITY);

        let json: serde_json::Value =
            serde_json::from_str(request.http.content.as_deref().unwrap()).unwrap();
        assert_eq!(json["sender"], LOCAL);
        assert_eq!(json["supportedSecCapabilityList"][0], "TLS");
        assert_eq!(json["3GppSbiTargetApiRootSupported"], true);
        assert_eq!(json["plmnIdList"][0]["mcc"], "001");
        assert!(json.get("targetPlmnId").is_none());

        // The advertised feature sticks to the node
        assert_eq!(ctx.node(id).unwrap().supported_features, 1);
    }

    #[test]
    fn test_build_security_capability_response() {
        let ctx = context(false);
        let mut node = SeppNode::new(PEER, 1);
        assert!(matches!(
            build_security_capability_response(&ctx, &node),
            Err(N32cError::NoSelectedCapability)
        ));

        node.negotiated_security_scheme = Some(SecurityCapability::Tls);
        let data = build_security_capability_response(&ctx, &node).unwrap();
        assert_eq!(data.sender.as_deref(), Some(LOCAL));
        assert_eq!(data.selected_sec_capability, Some(SecurityCapability::Tls));
        assert_eq!(data.target_apiroot_supported, Some(true));

        node.negotiated_security_scheme = Some(SecurityCapability::None);
        let data = build_security_capability_response(&ctx, &node).unwrap();
        assert_eq!(data.target_apiroot_supported, None);
    }

    #[test]
    fn test_response_round_trips_through_handler() {
        let mut ctx = context(false);
        let id = ctx.node_add(PEER).unwrap();
        ctx.node_mut(id).unwrap().negotiated_security_scheme = Some(SecurityCapability::Tls);
        let mut response = ctx.build_security_capability_response(id).unwrap();
        assert_eq!(response.status, 200);

        // Seen from the peer, we are the sender
        let mut peer_view = SeppNode::new(LOCAL, 1);
        let scheme = crate::n32c_handler::handle_security_capability_response(
            &mut peer_view,
            &response,
        )
        .unwrap();
        assert_eq!(scheme, SecurityCapability::Tls);
        assert_eq!(peer_view.plmn_ids, vec![PlmnId::new(1, 1, 2).unwrap()]);

        response.status = 500;
        assert!(crate::n32c_handler::handle_security_capability_response(
            &mut peer_view,
            &response
        )
        .is_err());
    }
}
