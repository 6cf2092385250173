//! Authorization decision contract.
//!
//! Policy implementations live outside the container; only their decisions
//! are consumed here.

use std::sync::Arc;

use crate::ResourceRequest;

/// A policy's verdict on one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationDecision {
    /// The policy allows the request.
    Accept,
    /// The policy forbids the request.
    Reject,
    /// The policy has no opinion.
    Ignore,
}

/// Decides whether requests may proceed.
pub trait AuthorizationPolicy: Send + Sync {
    /// Returns the verdict for `request`.
    fn decide(&self, request: &ResourceRequest) -> AuthorizationDecision;
}

/// Combines every policy's verdict: any rejection wins, otherwise accept.
#[must_use]
pub fn decide_all(
    policies: &[Arc<dyn AuthorizationPolicy>],
    request: &ResourceRequest,
) -> AuthorizationDecision {
    let rejected = policies
        .iter()
        .any(|policy| policy.decide(request) == AuthorizationDecision::Reject);
    if rejected {
        AuthorizationDecision::Reject
    } else {
        AuthorizationDecision::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestType, ResourcePath};

    struct Fixed(AuthorizationDecision);

    impl AuthorizationPolicy for Fixed {
        fn decide(&self, _request: &ResourceRequest) -> AuthorizationDecision {
            self.0
        }
    }

    fn request() -> ResourceRequest {
        ResourceRequest::builder(RequestType::Read, ResourcePath::new("/people")).build()
    }

    #[test]
    fn any_rejection_wins() {
        let policies: Vec<Arc<dyn AuthorizationPolicy>> = vec![
            Arc::new(Fixed(AuthorizationDecision::Accept)),
            Arc::new(Fixed(AuthorizationDecision::Reject)),
        ];
        assert_eq!(
            decide_all(&policies, &request()),
            AuthorizationDecision::Reject
        );
    }

    #[test]
    fn silence_accepts() {
        let policies: Vec<Arc<dyn AuthorizationPolicy>> =
            vec![Arc::new(Fixed(AuthorizationDecision::Ignore))];
        assert_eq!(
            decide_all(&policies, &request()),
            AuthorizationDecision::Accept
        );
        assert_eq!(
            decide_all(&[], &request()),
            AuthorizationDecision::Accept
        );
    }
}
