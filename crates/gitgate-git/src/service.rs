//! Transport service vocabulary.

use crate::GitError;

/// The two git transport services the gateway bridges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportService {
    /// Serves fetch/clone (`git-upload-pack`).
    UploadPack,
    /// Serves push (`git-receive-pack`).
    ReceivePack,
}

impl TransportService {
    /// Wire name as it appears in URLs and the `service` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadPack => "git-upload-pack",
            Self::ReceivePack => "git-receive-pack",
        }
    }

    /// Subcommand name passed to the git binary.
    pub fn binary_arg(&self) -> &'static str {
        match self {
            Self::UploadPack => "upload-pack",
            Self::ReceivePack => "receive-pack",
        }
    }

    /// Content type for the smart ref advertisement response.
    pub fn advertisement_content_type(&self) -> String {
        format!("application/x-{}-advertisement", self.as_str())
    }

    /// Content type for the stateless-RPC result response.
    pub fn result_content_type(&self) -> String {
        format!("application/x-{}-result", self.as_str())
    }

    /// Parses the `service` query parameter of an `info/refs` request.
    pub fn from_service_param(param: &str) -> Option<Self> {
        match param {
            "git-upload-pack" => Some(Self::UploadPack),
            "git-receive-pack" => Some(Self::ReceivePack),
            _ => None,
        }
    }
}

impl std::str::FromStr for TransportService {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_service_param(s).ok_or_else(|| GitError::UnknownService(s.to_string()))
    }
}

impl std::fmt::Display for TransportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_names() {
        assert_eq!(TransportService::UploadPack.as_str(), "git-upload-pack");
        assert_eq!(TransportService::ReceivePack.as_str(), "git-receive-pack");
        assert_eq!(TransportService::UploadPack.binary_arg(), "upload-pack");
        assert_eq!(TransportService::ReceivePack.binary_arg(), "receive-pack");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(
            TransportService::UploadPack.advertisement_content_type(),
            "application/x-git-upload-pack-advertisement"
        );
        assert_eq!(
            TransportService::UploadPack.result_content_type(),
            "application/x-git-upload-pack-result"
        );
        assert_eq!(
            TransportService::ReceivePack.result_content_type(),
            "application/x-git-receive-pack-result"
        );
    }

    #[test]
    fn test_from_service_param() {
        assert_eq!(
            TransportService::from_service_param("git-upload-pack"),
            Some(TransportService::UploadPack)
        );
        assert_eq!(
            TransportService::from_service_param("git-receive-pack"),
            Some(TransportService::ReceivePack)
        );
        assert_eq!(TransportService::from_service_param("upload-pack"), None);
        assert_eq!(TransportService::from_service_param(""), None);
    }
}
