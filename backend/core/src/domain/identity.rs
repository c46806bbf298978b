//! Service identity classification.

use regex::Regex;

/// Default pattern for automation/service accounts.
///
/// Matches the built-in Windows service accounts (optionally prefixed with
/// `NT AUTHORITY\`), machine accounts (`DOMAIN\HOST$`) and the conventional
/// CI runner account.
pub const DEFAULT_SERVICE_IDENTITY_PATTERN: &str =
    r"(?i)^(nt authority\\)?(system|local service|network service)$|\$$|^([^\\]+\\)?runner$";

/// Classifies an account identity as a service account or a human login.
///
/// Used as a safety gate: destructive system-wide cleanup must never run
/// under an interactive session by accident.
#[derive(Debug, Clone)]
pub struct ServiceIdentityClassifier {
    pattern: Regex,
}

impl ServiceIdentityClassifier {
    /// Create a classifier from a regex pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Check whether `identity` is an automation/service account.
    ///
    /// An empty identity is never a service identity.
    pub fn is_service_identity(&self, identity: &str) -> bool {
        let identity = identity.trim();
        !identity.is_empty() && self.pattern.is_match(identity)
    }
}

impl Default for ServiceIdentityClassifier {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_SERVICE_IDENTITY_PATTERN)
                .expect("default service identity pattern is valid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_accounts() {
        let classifier = ServiceIdentityClassifier::default();
        assert!(classifier.is_service_identity("NT AUTHORITY\\SYSTEM"));
        assert!(classifier.is_service_identity("system"));
        assert!(classifier.is_service_identity("NT AUTHORITY\\NETWORK SERVICE"));
        assert!(classifier.is_service_identity("CORP\\BUILD-HOST-07$"));
        assert!(classifier.is_service_identity("runner"));
        assert!(classifier.is_service_identity("BUILD-HOST\\runner"));
    }

    #[test]
    fn test_human_accounts() {
        let classifier = ServiceIdentityClassifier::default();
        assert!(!classifier.is_service_identity("CORP\\alice"));
        assert!(!classifier.is_service_identity("bob"));
        assert!(!classifier.is_service_identity("systemadmin"));
        assert!(!classifier.is_service_identity("runner-dev"));
        assert!(!classifier.is_service_identity(""));
        assert!(!classifier.is_service_identity("   "));
    }

    #[test]
    fn test_custom_pattern() {
        let classifier = ServiceIdentityClassifier::new("^svc-").unwrap();
        assert!(classifier.is_service_identity("svc-ci"));
        assert!(!classifier.is_service_identity("SYSTEM"));
        assert!(ServiceIdentityClassifier::new("(").is_err());
    }
}
