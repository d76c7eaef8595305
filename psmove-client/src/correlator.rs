//! Request id assignment and response matching

use std::collections::HashSet;

use psmove_protocol::{Request, RequestId, Response};
use psmove_transport::{Transport, TransportError};

/// First id handed out on a fresh connection
const FIRST_REQUEST_ID: RequestId = 1;

/// Assigns request ids and resolves each one at most once
///
/// There is no timeout or retry: a request whose response never arrives just
/// stays pending until the connection goes away.
#[derive(Debug)]
pub struct RequestCorrelator {
    next_request_id: RequestId,
    pending: HashSet<RequestId>,
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self {
            next_request_id: FIRST_REQUEST_ID,
            pending: HashSet::new(),
        }
    }
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the request with a fresh id and hand it to the transport
    ///
    /// Never waits for a reply. If the transport refuses the request the id is
    /// still consumed, so ids stay unique even across failed sends.
    pub fn send(
        &mut self,
        mut request: Request,
        transport: &mut dyn Transport,
    ) -> Result<RequestId, TransportError> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        request.request_id = request_id;

        tracing::debug!("Sending request {}: {:?}", request_id, request.kind);
        transport.send_request(request)?;
        self.pending.insert(request_id);

        Ok(request_id)
    }

    /// Match a response against the pending set
    ///
    /// Returns the response exactly once for an issued id; responses with an
    /// unknown or already resolved id are dropped.
    pub fn resolve(&mut self, response: Response) -> Option<Response> {
        if self.pending.remove(&response.request_id) {
            Some(response)
        } else {
            tracing::warn!(
                "Dropping response for unknown or already resolved request {}",
                response.request_id
            );
            None
        }
    }

    /// Forget every in-flight request, returning how many were abandoned
    pub fn abandon_all(&mut self) -> usize {
        let abandoned = self.pending.len();
        if abandoned > 0 {
            tracing::debug!("Abandoning {} in-flight requests", abandoned);
        }
        self.pending.clear();
        abandoned
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains(&request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The id the next request will receive
    pub fn next_request_id(&self) -> RequestId {
        self.next_request_id
    }
}
