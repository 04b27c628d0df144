//! SBI Message Structures
//!
//! Request/response envelopes, the discovery option and ProblemDetails.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{content_type, limits, method};
use crate::error::{SbiError, SbiResult};
use crate::plmn::PlmnId;

/// SBI Header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SbiHeader {
    pub method: String,
    /// Full URI; when absent the request is routed by service name
    pub uri: Option<String>,
    pub service_name: Option<String>,
    pub api_version: Option<String>,
    /// Resource path components
    pub resource: Vec<String>,
}

impl SbiHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method_uri(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    /// Header addressing a service by name instead of URI
    pub fn with_service(
        method: impl Into<String>,
        service_name: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            service_name: Some(service_name.into()),
            api_version: Some(api_version.into()),
            ..Default::default()
        }
    }

    pub fn add_resource(&mut self, component: impl Into<String>) {
        self.resource.push(component.into());
    }

    pub fn resource_path(&self) -> String {
        self.resource.join("/")
    }
}

/// HTTP part of a message: query parameters, headers and body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SbiHttpMessage {
    pub params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub content: Option<String>,
}

impl SbiHttpMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn get_param(&self, key: &str) -> Option<&String> {
        self.params.get(key)
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn get_header(&self, key: &str) -> Option<&String> {
        self.headers.get(key)
    }
}

/// SBI Request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SbiRequest {
    pub header: SbiHeader,
    pub http: SbiHttpMessage,
}

impl SbiRequest {
    pub fn new(header: SbiHeader) -> Self {
        Self {
            header,
            http: SbiHttpMessage::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(SbiHeader::with_method_uri(method::GET, uri))
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(SbiHeader::with_method_uri(method::POST, uri))
    }

    pub fn with_json_body<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.http.content = Some(serde_json::to_string(body)?);
        self.http.set_header("Content-Type", content_type::JSON);
        Ok(self)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http.set_param(key, value);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http.set_header(key, value);
        self
    }

    /// Decoded JSON body, `None` when the request carries no content
    pub fn json_body<T: for<'de> Deserialize<'de>>(&self) -> Option<Result<T, serde_json::Error>> {
        self.http.content.as_deref().map(serde_json::from_str)
    }
}

/// SBI Response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SbiResponse {
    pub header: SbiHeader,
    pub http: SbiHttpMessage,
    pub status: u16,
}

impl SbiResponse {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_json_body<T: Serialize>(
        mut self,
        body: &T,
        content_type: &str,
    ) -> Result<Self, serde_json::Error> {
        self.http.content = Some(serde_json::to_string(body)?);
        self.http.set_header("Content-Type", content_type);
        Ok(self)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json_body<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.http.content.as_deref().unwrap_or("{}"))
    }
}

/// Discovery Option
///
/// Query descriptor narrowing an NF discovery. Every list is bounded; adding
/// past the bound is rejected rather than truncated, and so is a decoded
/// option carrying too many entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DiscoveryOptionFields")]
pub struct SbiDiscoveryOption {
    pub target_nf_instance_id: Option<String>,
    pub requester_nf_instance_id: Option<String>,
    pub service_names: Vec<String>,
    pub target_plmn_list: Vec<PlmnId>,
    pub requester_plmn_list: Vec<PlmnId>,
    pub requester_features: u64,
}

/// Unchecked wire form of [`SbiDiscoveryOption`]
#[derive(Deserialize)]
struct DiscoveryOptionFields {
    target_nf_instance_id: Option<String>,
    requester_nf_instance_id: Option<String>,
    service_names: Vec<String>,
    target_plmn_list: Vec<PlmnId>,
    requester_plmn_list: Vec<PlmnId>,
    requester_features: u64,
}

impl TryFrom<DiscoveryOptionFields> for SbiDiscoveryOption {
    type Error = SbiError;

    fn try_from(fields: DiscoveryOptionFields) -> SbiResult<Self> {
        let mut option = SbiDiscoveryOption {
            target_nf_instance_id: fields.target_nf_instance_id,
            requester_nf_instance_id: fields.requester_nf_instance_id,
            requester_features: fields.requester_features,
            ..Default::default()
        };
        for name in fields.service_names {
            option.add_service_names(name)?;
        }
        for plmn_id in fields.target_plmn_list {
            option.add_target_plmn_list(plmn_id)?;
        }
        for plmn_id in fields.requester_plmn_list {
            option.add_requester_plmn_list(plmn_id)?;
        }
        Ok(option)
    }
}

pub(crate) fn bounded_push<T>(
    list: &mut Vec<T>,
    item: T,
    what: &'static str,
    max: usize,
) -> SbiResult<()> {
    if list.len() >= max {
        log::error!("Maximum number of {} [{}] reached", what, max);
        return Err(SbiError::CapacityExceeded { what, max });
    }
    list.push(item);
    Ok(())
}

impl SbiDiscoveryOption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target_nf_instance_id(mut self, id: impl Into<String>) -> Self {
        self.target_nf_instance_id = Some(id.into());
        self
    }

    pub fn set_target_nf_instance_id(&mut self, id: impl Into<String>) {
        self.target_nf_instance_id = Some(id.into());
    }

    pub fn set_requester_nf_instance_id(&mut self, id: impl Into<String>) {
        self.requester_nf_instance_id = Some(id.into());
    }

    pub fn add_service_names(&mut self, name: impl Into<String>) -> SbiResult<()> {
        bounded_push(
            &mut self.service_names,
            name.into(),
            "discovery service names",
            limits::MAX_NUM_OF_SERVICE_NAME,
        )
    }

    pub fn add_target_plmn_list(&mut self, plmn_id: PlmnId) -> SbiResult<()> {
        bounded_push(
            &mut self.target_plmn_list,
            plmn_id,
            "target PLMNs",
            limits::MAX_NUM_OF_PLMN,
        )
    }

    pub fn add_requester_plmn_list(&mut self, plmn_id: PlmnId) -> SbiResult<()> {
        bounded_push(
            &mut self.requester_plmn_list,
            plmn_id,
            "requester PLMNs",
            limits::MAX_NUM_OF_PLMN,
        )
    }

    /// Comma-separated service names, as carried in the discovery header
    pub fn service_names_header(&self) -> Option<String> {
        if self.service_names.is_empty() {
            None
        } else {
            Some(self.service_names.join(","))
        }
    }
}

/// Problem Details (RFC 7807)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// URI of the request that caused the problem
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ProblemDetails {
    pub fn with_status(status: i32) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sbi_header() {
        let mut header = SbiHeader::with_service(method::GET, "nnrf-disc", "v1");
        header.add_resource("nf-instances");
        assert!(header.uri.is_none());
        assert_eq!(header.resource_path(), "nf-instances");
    }

    #[test]
    fn test_sbi_request() {
        let request = SbiRequest::get("/test")
            .with_param("key", "value")
            .with_header("Accept", "application/json");

        assert_eq!(request.header.method, "GET");
        assert_eq!(request.header.uri.as_deref(), Some("/test"));
        assert_eq!(request.http.get_param("key"), Some(&"value".to_string()));
    }

    #[test]
    fn test_sbi_response_json() {
        let problem = ProblemDetails::with_status(400).with_title("Bad");
        let response = SbiResponse::with_status(400)
            .with_json_body(&problem, content_type::PROBLEM)
            .unwrap();
        assert!(!response.is_success());
        let back: ProblemDetails = response.json_body().unwrap();
        assert_eq!(back, problem);
    }

    #[test]
    fn test_discovery_option_bounds() {
        let mut option = SbiDiscoveryOption::new();
        for i in 0..limits::MAX_NUM_OF_SERVICE_NAME {
            option.add_service_names(format!("svc-{}", i)).unwrap();
        }
        let err = option.add_service_names("one-too-many").unwrap_err();
        assert!(err.is_capacity());
        assert_eq!(option.service_names.len(), limits::MAX_NUM_OF_SERVICE_NAME);
    }

    #[test]
    fn test_discovery_option_decode_is_bounded() {
        let mut option = SbiDiscoveryOption::new();
        option.add_service_names("nudm-sdm").unwrap();
        let mut json = serde_json::to_value(&option).unwrap();
        let back: SbiDiscoveryOption = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, option);

        let names: Vec<String> = (0..=limits::MAX_NUM_OF_SERVICE_NAME)
            .map(|i| format!("svc-{}", i))
            .collect();
        json["service_names"] = serde_json::json!(names);
        assert!(serde_json::from_value::<SbiDiscoveryOption>(json.clone()).is_err());

        json["service_names"] = serde_json::json!([]);
        let plmns: Vec<_> = (0..=limits::MAX_NUM_OF_PLMN)
            .map(|_| serde_json::json!({"mcc": "001", "mnc": "01"}))
            .collect();
        json["requester_plmn_list"] = serde_json::json!(plmns);
        assert!(serde_json::from_value::<SbiDiscoveryOption>(json).is_err());
    }

    #[test]
    fn test_discovery_option_service_names_header() {
        let mut option = SbiDiscoveryOption::new().with_target_nf_instance_id("nf-1");
        assert_eq!(option.service_names_header(), None);
        option.add_service_names("nudm-sdm").unwrap();
        option.add_service_names("nudm-uecm").unwrap();
        assert_eq!(
            option.service_names_header().as_deref(),
            Some("nudm-sdm,nudm-uecm")
        );
    }

    #[test]
    fn test_problem_details() {
        let problem = ProblemDetails::with_status(404)
            .with_title("Not Found")
            .with_detail("The requested resource was not found");

        let json = serde_json::to_string(&problem).unwrap();
        assert!(json.contains("404"));
        assert!(json.contains("Not Found"));
        assert!(!json.contains("instance"));
    }
}
