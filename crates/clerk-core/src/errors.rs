/// Non-fatal problems hit while deriving a service. The offending entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeriveError {
    #[error("Invalid port `{raw}`")]
    InvalidPort { raw: String },

    #[error("No endpoint settings for network `{network}`")]
    MissingNetworkSettings { network: String },
}
