use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for the signing and verification paths.
#[derive(Clone)]
pub struct TrustMetrics {
    registry: Registry,
    key_fetches: IntCounterVec,
    verifications: IntCounterVec,
    sign_requests: IntCounterVec,
}

impl TrustMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let key_fetches = IntCounterVec::new(
            Opts::new(
                "identity_public_key_fetches_total",
                "Public key set fetches grouped by key source and outcome",
            ),
            &["source", "outcome"],
        )?;
        registry.register(Box::new(key_fetches.clone()))?;

        let verifications = IntCounterVec::new(
            Opts::new(
                "identity_token_verifications_total",
                "Token verifications grouped by token type and outcome",
            ),
            &["token_type", "outcome"],
        )?;
        registry.register(Box::new(verifications.clone()))?;

        let sign_requests = IntCounterVec::new(
            Opts::new(
                "identity_sign_requests_total",
                "Signing requests grouped by signer and outcome",
            ),
            &["signer", "outcome"],
        )?;
        registry.register(Box::new(sign_requests.clone()))?;

        Ok(Self {
            registry,
            key_fetches,
            verifications,
            sign_requests,
        })
    }

    pub fn key_fetch(&self, source: &str, outcome: &str) {
        self.key_fetches.with_label_values(&[source, outcome]).inc();
    }

    pub fn key_fetch_count(&self, source: &str, outcome: &str) -> u64 {
        self.key_fetches.with_label_values(&[source, outcome]).get()
    }

    pub fn verification(&self, token_type: &str, outcome: &str) {
        self.verifications
            .with_label_values(&[token_type, outcome])
            .inc();
    }

    pub fn verification_count(&self, token_type: &str, outcome: &str) -> u64 {
        self.verifications
            .with_label_values(&[token_type, outcome])
            .get()
    }

    pub fn sign_request(&self, signer: &str, outcome: &str) {
        self.sign_requests.with_label_values(&[signer, outcome]).inc();
    }

    pub fn sign_request_count(&self, signer: &str, outcome: &str) -> u64 {
        self.sign_requests.with_label_values(&[signer, outcome]).get()
    }

    /// Text exposition of every registered counter.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
