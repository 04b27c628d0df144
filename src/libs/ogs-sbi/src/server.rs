//! SBI server-side error replies
//!
//! The HTTP/2 server itself lives in the transport layer. Handlers here
//! only need a way to answer a stream with a problem report, which is the
//! [`SbiErrorSink`] trait.

use std::collections::VecDeque;

use crate::constants::content_type;
use crate::message::{ProblemDetails, SbiHeader, SbiResponse};

/// Stream identifier for tracking requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

impl StreamId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Reason phrase for the status codes this layer answers with
pub fn status_title(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Error",
    }
}

/// Problem-details response for a failed request
///
/// `message` is the request being answered; its URI (or service path)
/// becomes the problem instance.
pub fn build_error_response(
    status: u16,
    message: Option<&SbiHeader>,
    title: &str,
    detail: &str,
) -> SbiResponse {
    let mut problem = ProblemDetails::with_status(status as i32)
        .with_title(title)
        .with_detail(detail);
    if let Some(header) = message {
        let instance = match (&header.uri, &header.service_name) {
            (Some(uri), _) => Some(uri.clone()),
            (None, Some(service)) => Some(format!(
                "/{}/{}/{}",
                service,
                header.api_version.as_deref().unwrap_or("v1"),
                header.resource_path()
            )),
            (None, None) => None,
        };
        if let Some(instance) = instance {
            problem = problem.with_instance(instance);
        }
    }

    match SbiResponse::with_status(status).with_json_body(&problem, content_type::PROBLEM) {
        Ok(response) => response,
        Err(e) => {
            log::error!("Cannot encode problem details: {}", e);
            SbiResponse::with_status(status)
        }
    }
}

/// Where handlers send error replies
pub trait SbiErrorSink {
    fn send_error(
        &mut self,
        stream: StreamId,
        status: u16,
        message: Option<&SbiHeader>,
        title: &str,
        detail: &str,
    );
}

/// Error sink that queues replies for the transport to pick up
#[derive(Debug, Default)]
pub struct SbiResponseQueue {
    pending: VecDeque<(StreamId, SbiResponse)>,
}

impl SbiResponseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&mut self) -> Option<(StreamId, SbiResponse)> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl SbiErrorSink for SbiResponseQueue {
    fn send_error(
        &mut self,
        stream: StreamId,
        status: u16,
        message: Option<&SbiHeader>,
        title: &str,
        detail: &str,
    ) {
        log::warn!("[{}] {} ({})", status, title, detail);
        self.pending
            .push_back((stream, build_error_response(status, message, title, detail)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id() {
        let id = StreamId::new(42);
        assert_eq!(id.0, 42);
    }

    #[test]
    fn test_build_error_response() {
        let mut header = SbiHeader::with_service("POST", "n32c-handshake", "v1");
        header.add_resource("exchange-capability");
        let response = build_error_response(400, Some(&header), "Bad Request", "missing sender");
        assert_eq!(response.status, 400);

        let problem: ProblemDetails = response.json_body().unwrap();
        assert_eq!(problem.status, Some(400));
        assert_eq!(problem.detail.as_deref(), Some("missing sender"));
        assert_eq!(
            problem.instance.as_deref(),
            Some("/n32c-handshake/v1/exchange-capability")
        );
        assert_eq!(
            response.http.get_header("Content-Type").map(String::as_str),
            Some(content_type::PROBLEM)
        );
    }

    #[test]
    fn test_response_queue() {
        let mut queue = SbiResponseQueue::new();
        queue.send_error(StreamId::new(7), 404, None, status_title(404), "no such peer");
        assert_eq!(queue.len(), 1);
        let (stream, response) = queue.pop().unwrap();
        assert_eq!(stream, StreamId::new(7));
        assert_eq!(response.status, 404);
        assert!(queue.is_empty());
    }
}
