//! SBI Constants
//!
//! Status codes, methods, API versions, registry limits, defaults and
//! feature bits.

/// HTTP status codes used by this layer
pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const NO_CONTENT: u16 = 204;
    pub const BAD_REQUEST: u16 = 400;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
    pub const GATEWAY_TIMEOUT: u16 = 504;
}

/// HTTP methods
pub mod method {
    pub const DELETE: &str = "DELETE";
    pub const GET: &str = "GET";
    pub const PATCH: &str = "PATCH";
    pub const POST: &str = "POST";
    pub const PUT: &str = "PUT";
}

/// API versions
pub mod api {
    pub const V1: &str = "v1";
    pub const V1_0_0: &str = "1.0.0";
}

/// Registry and message limits
pub mod limits {
    /// Allowed requester NF types per instance or service
    pub const MAX_NUM_OF_NF_TYPE: usize = 16;
    /// IPv4 or IPv6 addresses per instance, addresses per service
    pub const MAX_NUM_OF_IP_ADDRESS: usize = 8;
    /// Version entries per service
    pub const MAX_NUM_OF_SERVICE_VERSION: usize = 8;
    /// Type-specific info blocks per instance
    pub const MAX_NUM_OF_NF_INFO: usize = 8;
    /// Services per instance
    pub const MAX_NUM_OF_NF_SERVICE: usize = 16;
    /// PLMN identifiers in any PLMN list
    pub const MAX_NUM_OF_PLMN: usize = 12;
    /// Service names in a discovery option
    pub const MAX_NUM_OF_SERVICE_NAME: usize = 16;
    /// SCP domains carried in an SCP info block
    pub const MAX_NUM_OF_SCP_DOMAIN: usize = 8;
}

/// Defaults applied to new NF instances and services
pub mod defaults {
    pub const PRIORITY: u16 = 0;
    pub const CAPACITY: u16 = 100;
    pub const LOAD: u8 = 0;
}

/// Supported-features bits (bit numbers are 1-based, as in TS 29.571)
pub mod features {
    /// Nnrf_NFDiscovery: service-map encoding of NFProfile.nfServices
    pub const NNRF_DISC_SERVICE_MAP: u32 = 1;
    /// N32 handshake: NF type list carried in the security negotiation
    pub const N32_HANDSHAKE_NFTLST: u32 = 1;

    /// Mask with only feature `bit` set
    pub const fn mask(bit: u32) -> u64 {
        1u64 << (bit - 1)
    }

    /// Set feature `bit` in `features`
    pub fn set(features: &mut u64, bit: u32) {
        *features |= mask(bit);
    }

    /// Check whether feature `bit` is set
    pub fn is_set(features: u64, bit: u32) -> bool {
        features & mask(bit) != 0
    }
}

/// Custom 3GPP headers
pub mod custom_header {
    pub const TARGET_APIROOT: &str = "3gpp-Sbi-Target-apiRoot";
    pub const DISCOVERY_SERVICE_NAMES: &str = "3gpp-Sbi-Discovery-service-names";
}

/// Content types
pub mod content_type {
    pub const JSON: &str = "application/json";
    pub const PROBLEM: &str = "application/problem+json";
}
