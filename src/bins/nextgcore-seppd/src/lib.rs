//! NextGCore SEPP (Security Edge Protection Proxy) Library
//!
//! The SEPP guards the border between two PLMNs. Before any traffic is
//! relayed, each pair of SEPPs runs the N32c handshake to agree on a
//! security scheme (TLS, PRINS or none) and to exchange the PLMNs and
//! features each side supports.

pub mod context;
pub mod n32c_build;
pub mod n32c_handler;

#[cfg(test)]
mod property_tests;

pub use context::{
    parse_supported_features, SecurityCapability, SecurityCapabilityConf, SeppConf, SeppContext,
    SeppNode, SeppNodeId, SeppPeerConf,
};
pub use n32c_build::{
    build_security_capability_request, build_security_capability_response,
    build_security_capability_sbi_request, build_security_capability_sbi_response,
};
pub use n32c_handler::{
    handle_security_capability_request, handle_security_capability_response,
    select_security_capability, N32cError, SecNegotiateReqData, SecNegotiateRspData,
};
