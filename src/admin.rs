// 🔐 Admin gate
//
// The core only ever sees `AdminAccess`. How the operator proved it (the
// password check below) stays at the edge.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAccess {
    Granted,
    Denied,
}

impl AdminAccess {
    pub fn is_granted(&self) -> bool {
        matches!(self, AdminAccess::Granted)
    }
}

impl From<bool> for AdminAccess {
    fn from(granted: bool) -> Self {
        if granted {
            AdminAccess::Granted
        } else {
            AdminAccess::Denied
        }
    }
}

/// Admin password, held only as a hex SHA-256 digest.
#[derive(Debug, Clone, Default)]
pub struct AdminCredentials {
    password_sha256: Option<String>,
}

impl AdminCredentials {
    pub fn from_digest(hex_digest: &str) -> Self {
        let trimmed = hex_digest.trim();
        AdminCredentials {
            password_sha256: (!trimmed.is_empty()).then(|| trimmed.to_lowercase()),
        }
    }

    /// Convenience for tests and first-time setup.
    pub fn from_password(password: &str) -> Self {
        AdminCredentials {
            password_sha256: Some(hash_password(password)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.password_sha256.is_some()
    }

    /// Unconfigured credentials deny everyone.
    pub fn verify(&self, password: &str) -> AdminAccess {
        match &self.password_sha256 {
            Some(expected) => AdminAccess::from(hash_password(password) == *expected),
            None => AdminAccess::Denied,
        }
    }
}

pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_password() {
        let creds = AdminCredentials::from_password("s3cret");

        assert_eq!(creds.verify("s3cret"), AdminAccess::Granted);
        assert_eq!(creds.verify("S3cret"), AdminAccess::Denied);
        assert_eq!(creds.verify(""), AdminAccess::Denied);
    }

    #[test]
    fn test_digest_is_case_insensitive() {
        let digest = hash_password("club").to_uppercase();
        let creds = AdminCredentials::from_digest(&digest);

        assert!(creds.verify("club").is_granted());
    }

    #[test]
    fn test_unconfigured_denies() {
        let creds = AdminCredentials::from_digest("  ");

        assert!(!creds.is_configured());
        assert_eq!(creds.verify(""), AdminAccess::Denied);
        assert_eq!(AdminCredentials::default().verify("anything"), AdminAccess::Denied);
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        let digest = hash_password("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
