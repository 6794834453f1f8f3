use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use identity_errors::{AuthError, AuthResult, ErrorCode};
use identity_observability::TrustMetrics;
use jsonwebtoken::DecodingKey;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, AGE, CACHE_CONTROL, EXPIRES};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{ID_TOKEN_CERT_URL, SESSION_COOKIE_CERT_URL};

/// A single verification key.
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    key: DecodingKey,
}

impl PublicKey {
    pub fn new(kid: impl Into<String>, key: DecodingKey) -> Self {
        Self {
            kid: kid.into(),
            key,
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

/// Immutable snapshot of the keys published by a certificate endpoint.
pub struct PublicKeySet {
    keys: Vec<PublicKey>,
    expires_at: DateTime<Utc>,
}

impl PublicKeySet {
    pub fn new(keys: Vec<PublicKey>, expires_at: DateTime<Utc>) -> Self {
        Self { keys, expires_at }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublicKey> {
        self.keys.iter()
    }

    pub fn get(&self, kid: &str) -> Option<&PublicKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    pub fn key_ids(&self) -> Vec<&str> {
        self.keys.iter().map(PublicKey::kid).collect()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Caches the key set behind a certificate URL for as long as the response
/// caching headers allow.
///
/// Refreshes are serialized by a single mutex: a caller that finds the set
/// expired fetches while holding the lock, and every concurrent caller waits
/// for that fetch and then shares its result.
pub struct PublicKeyCache {
    client: Client,
    url: String,
    source: String,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<Arc<PublicKeySet>>>,
    metrics: Option<TrustMetrics>,
}

impl PublicKeyCache {
    pub fn new(client: Client, url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let url = url.into();
        Self {
            client,
            source: url.clone(),
            url,
            clock,
            current: Mutex::new(None),
            metrics: None,
        }
    }

    /// Record fetch outcomes under `source` in the given registry.
    pub fn with_metrics(mut self, source: impl Into<String>, metrics: TrustMetrics) -> Self {
        self.source = source.into();
        self.metrics = Some(metrics);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current key set, fetching first when nothing is cached or the cached
    /// set has expired.
    pub fn get_keys(&self) -> AuthResult<Arc<PublicKeySet>> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        if let Some(set) = current.as_ref() {
            if !set.is_expired(now) {
                return Ok(Arc::clone(set));
            }
            debug!(url = %self.url, "public key set expired");
        }

        let fresh = Arc::new(self.fetch(now)?);
        *current = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Fetch unconditionally. On failure the previous set stays in place.
    pub fn refresh(&self) -> AuthResult<Arc<PublicKeySet>> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = Arc::new(self.fetch(self.clock.now())?);
        *current = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Cached set without triggering a fetch, expired or not.
    pub fn cached(&self) -> Option<Arc<PublicKeySet>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fetch(&self, now: DateTime<Utc>) -> AuthResult<PublicKeySet> {
        let result = self.fetch_inner(now);
        if let Some(metrics) = &self.metrics {
            let outcome = if result.is_ok() { "ok" } else { "error" };
            metrics.key_fetch(&self.source, outcome);
        }
        match &result {
            Ok(set) => info!(
                url = %self.url,
                keys = set.len(),
                expires_at = %set.expires_at(),
                "refreshed public key set"
            ),
            Err(err) => warn!(url = %self.url, error = %err, "public key fetch failed"),
        }
        result
    }

    fn fetch_inner(&self, now: DateTime<Utc>) -> AuthResult<PublicKeySet> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|err| fetch_error(&self.url, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(fetch_error(
                &self.url,
                format!("HTTP {} with body: {body}", status.as_u16()),
            ));
        }

        let expires_at = cache_expiry(response.headers(), now);
        let body = response
            .text()
            .map_err(|err| fetch_error(&self.url, err))?;
        let keys = parse_key_set(&body)?;
        if keys.is_empty() {
            return Err(fetch_error(&self.url, "response contained no keys"));
        }

        Ok(PublicKeySet::new(keys, expires_at))
    }
}

fn fetch_error(url: &str, detail: impl std::fmt::Display) -> AuthError {
    AuthError::runtime(
        ErrorCode::CertificateFetchFailed,
        format!("Error while fetching public key certificates from {url}: {detail}"),
    )
}

fn parse_error(detail: impl std::fmt::Display) -> AuthError {
    AuthError::runtime(
        ErrorCode::CertificateFetchFailed,
        format!("Failed to parse public key certificates: {detail}"),
    )
}

/// Expiry of a freshly fetched set. `max-age` (less `Age`) wins over
/// `Expires`; without either header, or with `no-cache`/`no-store`, the set
/// is stale immediately.
pub fn cache_expiry(headers: &HeaderMap, now: DateTime<Utc>) -> DateTime<Utc> {
    let cache_control = headers
        .get(CACHE_CONTROL)
        .and_then(|value| value.to_str().ok());

    if let Some(directives) = cache_control {
        let mut max_age = None;
        for directive in directives.split(',').map(str::trim) {
            if directive.eq_ignore_ascii_case("no-cache") || directive.eq_ignore_ascii_case("no-store")
            {
                return now;
            }
            if let Some((name, seconds)) = directive.split_once('=') {
                if name.trim().eq_ignore_ascii_case("max-age") {
                    max_age = seconds.trim().parse::<i64>().ok();
                }
            }
        }
        if let Some(max_age) = max_age {
            let age = headers
                .get(AGE)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<i64>().ok())
                .unwrap_or(0);
            return now + Duration::seconds((max_age - age).max(0));
        }
    }

    headers
        .get(EXPIRES)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| DateTime::parse_from_rfc2822(value.trim()).ok())
        .map(|expires| expires.with_timezone(&Utc))
        .unwrap_or(now)
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkEntry>,
}

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// Parse either a `{kid: PEM}` map (X.509 certificates or public keys) or a
/// JWKS document with RSA entries.
pub fn parse_key_set(body: &str) -> AuthResult<Vec<PublicKey>> {
    let value: Value = serde_json::from_str(body).map_err(parse_error)?;
    let Value::Object(map) = value else {
        return Err(parse_error("expected a JSON object"));
    };

    if map.get("keys").is_some_and(Value::is_array) {
        let jwks: JwksResponse =
            serde_json::from_value(Value::Object(map)).map_err(parse_error)?;
        return jwks.keys.into_iter().map(jwk_to_key).collect();
    }

    map.into_iter()
        .map(|(kid, pem)| {
            let pem = pem
                .as_str()
                .ok_or_else(|| parse_error(format!("entry '{kid}' is not a string")))?;
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|err| parse_error(format!("key '{kid}': {err}")))?;
            Ok(PublicKey::new(kid, key))
        })
        .collect()
}

fn jwk_to_key(entry: JwkEntry) -> AuthResult<PublicKey> {
    let kid = entry
        .kid
        .ok_or_else(|| parse_error("JWKS entry missing key id (kid)"))?;
    let kty = entry.kty.unwrap_or_else(|| "RSA".to_string());
    if kty != "RSA" {
        return Err(parse_error(format!(
            "JWKS key '{kid}' uses unsupported key type '{kty}'"
        )));
    }
    let (Some(modulus), Some(exponent)) = (entry.n, entry.e) else {
        return Err(parse_error(format!(
            "JWKS key '{kid}' missing required RSA components"
        )));
    };
    let key = DecodingKey::from_rsa_components(&modulus, &exponent)
        .map_err(|err| parse_error(format!("key '{kid}': {err}")))?;
    Ok(PublicKey::new(kid, key))
}

/// Key caches for both token kinds, built once at startup and shared by
/// reference with the verifiers that need them.
#[derive(Clone)]
pub struct KeyCacheRegistry {
    id_token: Arc<PublicKeyCache>,
    session_cookie: Arc<PublicKeyCache>,
}

impl KeyCacheRegistry {
    pub fn new(id_token: PublicKeyCache, session_cookie: PublicKeyCache) -> Self {
        Self {
            id_token: Arc::new(id_token),
            session_cookie: Arc::new(session_cookie),
        }
    }

    /// Caches pointed at the production certificate endpoints.
    pub fn with_default_urls(
        client: Client,
        clock: Arc<dyn Clock>,
        metrics: Option<TrustMetrics>,
    ) -> Self {
        Self::with_urls(
            client,
            clock,
            ID_TOKEN_CERT_URL,
            SESSION_COOKIE_CERT_URL,
            metrics,
        )
    }

    pub fn with_urls(
        client: Client,
        clock: Arc<dyn Clock>,
        id_token_url: &str,
        session_cookie_url: &str,
        metrics: Option<TrustMetrics>,
    ) -> Self {
        let mut id_token = PublicKeyCache::new(client.clone(), id_token_url, Arc::clone(&clock));
        let mut session_cookie = PublicKeyCache::new(client, session_cookie_url, clock);
        if let Some(metrics) = metrics {
            id_token = id_token.with_metrics("id_token", metrics.clone());
            session_cookie = session_cookie.with_metrics("session_cookie", metrics);
        }
        Self::new(id_token, session_cookie)
    }

    pub fn id_token(&self) -> &Arc<PublicKeyCache> {
        &self.id_token
    }

    pub fn session_cookie(&self) -> &Arc<PublicKeyCache> {
        &self.session_cookie
    }
}
