//! Request dispatch: point an outgoing request at the next live member

use crate::membership::MembershipStore;
use livenodes_core::{Endpoint, LbError, Result};
use reqwest::{Request, Url};
use std::sync::Arc;

/// An outgoing request whose destination can be rewritten before sending
pub trait OutgoingRequest {
    /// Replace scheme, host and port; everything else stays as built
    fn set_destination(&mut self, endpoint: &Endpoint) -> Result<()>;
}

impl OutgoingRequest for Url {
    /// Leaves `self` untouched if any part of the rewrite fails
    fn set_destination(&mut self, endpoint: &Endpoint) -> Result<()> {
        let invalid = || LbError::InvalidEndpoint(endpoint.to_string());

        let mut rewritten = self.clone();
        rewritten
            .set_scheme(endpoint.scheme().as_str())
            .map_err(|_| invalid())?;
        rewritten
            .set_host(Some(&endpoint.authority_host()))
            .map_err(|_| invalid())?;
        rewritten
            .set_port(Some(endpoint.port()))
            .map_err(|_| invalid())?;

        *self = rewritten;
        Ok(())
    }
}

impl OutgoingRequest for Request {
    fn set_destination(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.url_mut().set_destination(endpoint)
    }
}

/// Round-robin request dispatcher
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<MembershipStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<MembershipStore>) -> Self {
        Self { store }
    }

    /// Rewrite `request` to target the next member; returns that member
    pub fn dispatch<R: OutgoingRequest + ?Sized>(&self, request: &mut R) -> Result<Endpoint> {
        let endpoint = self.store.next();
        request.set_destination(&endpoint)?;
        tracing::trace!(endpoint = %endpoint, "Dispatched request");
        Ok(endpoint)
    }
}
