use super::Claims;
use super::Crypto;
use actix_web::FromRequest;
use actix_web::HttpRequest;
use actix_web::dev::Payload;
use actix_web::error::ErrorUnauthorized;
use actix_web::web;
use std::future::Ready;
use std::future::ready;

/// Extractor for protected HTTP routes. Reads `Authorization: Bearer <token>`,
/// verifies it against the app's [`Crypto`], and rejects expired tokens.
pub struct Auth {
    claims: Claims,
}

impl Auth {
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn user(&self) -> duel_core::ID<super::Member> {
        self.claims.user()
    }
}

impl FromRequest for Auth {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req))
    }
}

fn extract(req: &HttpRequest) -> Result<Auth, actix_web::Error> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ErrorUnauthorized("missing Authorization header"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ErrorUnauthorized("expected Bearer token"))?;
    let crypto = req
        .app_data::<web::Data<Crypto>>()
        .ok_or_else(|| ErrorUnauthorized("auth not configured"))?;
    let claims = crypto
        .decode(token)
        .map_err(|_| ErrorUnauthorized("invalid token"))?;
    if claims.expired() {
        return Err(ErrorUnauthorized("token expired"));
    }
    Ok(Auth { claims })
}

/// Authenticates a WebSocket upgrade request, where the token arrives as a
/// `?token=` query parameter because browsers cannot set custom headers on
/// the handshake.
pub fn extract_from_query(req: &HttpRequest, crypto: &Crypto) -> Result<Claims, actix_web::Error> {
    let query = req.query_string();
    let token = web::Query::<std::collections::HashMap<String, String>>::from_query(query)
        .ok()
        .and_then(|q| q.get("token").cloned())
        .ok_or_else(|| ErrorUnauthorized("missing token query parameter"))?;
    let claims = crypto
        .decode(&token)
        .map_err(|_| ErrorUnauthorized("invalid token"))?;
    if claims.expired() {
        return Err(ErrorUnauthorized("token expired"));
    }
    Ok(claims)
}
