// file: src/auth/credentials.rs
// version: 1.0.0
// guid: 36607740-a21a-4860-a763-cc998919b40d

//! Account identity used for the NTLM exchange

use secrecy::{ExposeSecret, SecretString};

/// User name, NTLM domain, and password for one target account.
///
/// The password lives in a [`SecretString`] so `Debug` formatting and
/// stray log statements never reveal it; it is exposed only at the key
/// derivation points inside the NTLM module.
pub struct Credentials {
    username: String,
    domain: String,
    password: SecretString,
}

impl Credentials {
    /// Build credentials from the CLI user/password pair.
    ///
    /// `DOMAIN\user` and `user@domain` spellings both split into an NTLM
    /// (domain, user) pair; a bare user name leaves the domain empty,
    /// which targets a local account on the remote host.
    pub fn new(user: &str, password: &str) -> Self {
        let (domain, username) = if let Some((domain, name)) = user.split_once('\\') {
            (domain.to_string(), name.to_string())
        } else if let Some((name, domain)) = user.rsplit_once('@') {
            (domain.to_string(), name.to_string())
        } else {
            (String::new(), user.to_string())
        };

        Self {
            username,
            domain,
            password: SecretString::from(password.to_string()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Expose the password for key derivation only.
    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_user_has_empty_domain() {
        // Act
        let creds = Credentials::new("administrator", "pw");

        // Assert
        assert_eq!(creds.username(), "administrator");
        assert_eq!(creds.domain(), "");
    }

    #[test]
    fn test_backslash_form_splits_domain() {
        // Act
        let creds = Credentials::new("CORP\\svc-deploy", "pw");

        // Assert
        assert_eq!(creds.username(), "svc-deploy");
        assert_eq!(creds.domain(), "CORP");
    }

    #[test]
    fn test_upn_form_splits_domain() {
        // Act
        let creds = Credentials::new("svc-deploy@corp.example.com", "pw");

        // Assert
        assert_eq!(creds.username(), "svc-deploy");
        assert_eq!(creds.domain(), "corp.example.com");
    }

    #[test]
    fn test_password_survives_the_round_trip() {
        // Arrange
        let creds = Credentials::new("user", "s3cret!");

        // Act & Assert
        assert_eq!(creds.password(), "s3cret!");
    }

    #[test]
    fn test_debug_output_redacts_the_password() {
        // Arrange
        let creds = Credentials::new("CORP\\user", "s3cret!");

        // Act
        let debugged = format!("{:?}", creds);

        // Assert
        assert!(!debugged.contains("s3cret!"));
        assert!(debugged.contains("<redacted>"));
    }
}
