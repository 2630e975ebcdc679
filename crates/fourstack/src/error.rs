//! Unified error type for the Fourstack server.

use fourstack_registry::RegistryError;
use fourstack_store::StoreError;
use fourstack_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A store-level error (rules, persistence).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A registry-level error (duplicate parties).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::AcceptFailed(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "taken",
        ));
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Transport(_)));
        assert!(server_err.to_string().contains("taken"));
    }

    #[test]
    fn test_from_store_error() {
        let server_err: ServerError = StoreError::NotFound.into();
        assert!(matches!(server_err, ServerError::Store(_)));
        assert_eq!(server_err.to_string(), "Invalid token");
    }

    #[test]
    fn test_from_registry_error() {
        let err = RegistryError::UserExists(
            fourstack_protocol::UserId::new("u1"),
        );
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Registry(_)));
    }
}
