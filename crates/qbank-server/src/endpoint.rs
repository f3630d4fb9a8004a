/// HTTP endpoint paths served by the storage server.
pub mod endpoints {
    pub const HEALTH: &str = "/v1/health";
    pub const STORAGE: &str = "/storage";
    pub const SNAPSHOT: &str = "/storage/:user";
    pub const NAMESPACE: &str = "/storage/:user/:namespace";
    pub const ENTRY: &str = "/storage/:user/:namespace/:index";
}

/// Health check response.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}
