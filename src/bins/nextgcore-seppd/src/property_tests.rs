//! Property-based tests for the N32c handshake
//!
//! Feature narrowing and scheme selection over arbitrary offers.

#[cfg(test)]
mod tests {
    use crate::context::{SecurityCapability, SecurityCapabilityConf, SeppNode};
    use crate::n32c_handler::{
        handle_security_capability_request, handle_security_capability_response,
        select_security_capability,
    };
    use ogs_sbi::{SbiHeader, SbiRequest, SbiResponse, SbiResponseQueue, StreamId};
    use proptest::prelude::*;

    const PEER: &str = "sepp.peer.example.com";

    fn arb_capability() -> impl Strategy<Value = SecurityCapability> {
        prop::sample::select(vec![
            SecurityCapability::Tls,
            SecurityCapability::Prins,
            SecurityCapability::None,
            SecurityCapability::Unknown,
        ])
    }

    fn arb_local() -> impl Strategy<Value = SecurityCapabilityConf> {
        (any::<bool>(), any::<bool>()).prop_map(|(tls, prins)| SecurityCapabilityConf { tls, prins })
    }

    fn request_body(offer: &[SecurityCapability], features: Option<u64>) -> String {
        let mut body = serde_json::json!({
            "sender": PEER,
            "supportedSecCapabilityList": offer,
        });
        if let Some(features) = features {
            body["supportedFeatures"] = serde_json::Value::String(format!("{:x}", features));
        }
        body.to_string()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A successful request leaves exactly the common feature bits
        #[test]
        fn prop_request_narrows_features(
            local_features in any::<u64>(),
            peer_features in proptest::option::of(any::<u64>()),
        ) {
            let mut node = SeppNode::new(PEER, local_features);
            let mut request = SbiRequest::new(SbiHeader::with_service("POST", "n32c-handshake", "v1"));
            request.http.content = Some(request_body(&[SecurityCapability::Tls], peer_features));
            let mut queue = SbiResponseQueue::new();

            let result = handle_security_capability_request(
                &SecurityCapabilityConf::default(),
                &mut node,
                StreamId::new(1),
                &request,
                &mut queue,
            );
            prop_assert!(result.is_ok());
            prop_assert_eq!(node.supported_features, local_features & peer_features.unwrap_or(0));
        }

        /// Narrowing again never sets a bit that was cleared before
        #[test]
        fn prop_response_narrowing_is_monotonic(
            local_features in any::<u64>(),
            first in any::<u64>(),
            second in any::<u64>(),
        ) {
            let mut node = SeppNode::new(PEER, local_features);
            for features in [first, second] {
                let mut response = SbiResponse::with_status(200);
                response.http.content = Some(serde_json::json!({
                    "sender": PEER,
                    "selectedSecCapability": "TLS",
                    "supportedFeatures": format!("{:x}", features),
                }).to_string());
                let before = node.supported_features;
                prop_assert!(handle_security_capability_response(&mut node, &response).is_ok());
                prop_assert_eq!(node.supported_features & !before, 0);
            }
            prop_assert_eq!(node.supported_features, local_features & first & second);
        }

        /// The selected scheme was offered, and is enabled locally unless it is NONE
        #[test]
        fn prop_selection_respects_both_sides(
            offer in prop::collection::vec(arb_capability(), 0..5),
            local in arb_local(),
        ) {
            match select_security_capability(&offer, &local) {
                Some(SecurityCapability::None) => {
                    prop_assert!(offer.contains(&SecurityCapability::None));
                }
                Some(SecurityCapability::Tls) => {
                    prop_assert!(offer.contains(&SecurityCapability::Tls) && local.tls);
                    prop_assert!(!offer.contains(&SecurityCapability::None));
                }
                Some(SecurityCapability::Prins) => {
                    prop_assert!(offer.contains(&SecurityCapability::Prins) && local.prins);
                    prop_assert!(!(offer.contains(&SecurityCapability::Tls) && local.tls));
                }
                Some(SecurityCapability::Unknown) => prop_assert!(false, "unknown selected"),
                None => {
                    prop_assert!(!offer.contains(&SecurityCapability::None));
                    prop_assert!(!(offer.contains(&SecurityCapability::Tls) && local.tls));
                    prop_assert!(!(offer.contains(&SecurityCapability::Prins) && local.prins));
                }
            }
        }

        /// A rejected request never changes the node
        #[test]
        fn prop_rejected_request_keeps_node(
            offer in prop::collection::vec(arb_capability(), 0..5),
            local in arb_local(),
            features in any::<u64>(),
        ) {
            let mut node = SeppNode::new(PEER, features);
            let before = node.clone();
            let mut request = SbiRequest::new(SbiHeader::with_service("POST", "n32c-handshake", "v1"));
            request.http.content = Some(request_body(&offer, Some(features)));
            let mut queue = SbiResponseQueue::new();

            let result = handle_security_capability_request(
                &local, &mut node, StreamId::new(1), &request, &mut queue,
            );
            if result.is_err() {
                prop_assert_eq!(&node, &before);
                prop_assert_eq!(queue.len(), 1);
            }
        }
    }
}
