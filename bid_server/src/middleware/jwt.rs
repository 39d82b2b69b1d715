//! Access token middleware.
//!
//! Wrap any scope that requires a logged-in user with [`JwtMiddlewareFactory`]. Requests without a valid access token
//! are refused with a 401. Otherwise the token's [`JwtClaims`] are stored in the request extensions for the
//! [`AclMiddlewareFactory`](crate::middleware::AclMiddlewareFactory) and the route handlers to use.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::{extract_token, JwtClaims, TokenVerifier},
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    verifier: TokenVerifier,
}

impl JwtMiddlewareFactory {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { verifier: Rc::new(self.verifier.clone()), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    verifier: Rc<TokenVerifier>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let verifier = Rc::clone(&self.verifier);
        Box::pin(async move {
            let token = extract_token(req.headers()).ok_or_else(|| {
                debug!("🔑️ No access token in request to {}", req.path());
                ServerError::AuthenticationError(AuthError::MissingToken)
            })?;
            let claims: JwtClaims = verifier.verify(&token).map_err(|e| {
                debug!("🔑️ Access token rejected. {e}");
                ServerError::AuthenticationError(e)
            })?;
            trace!("🔑️ Access token for user #{} ✅️", claims.sub);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
