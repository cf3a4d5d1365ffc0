//! Credential provider seam for the protection password.
//!
//! The unlock operation never talks to a terminal itself; it asks a
//! [`PasswordSource`] for secrets, so the core transform stays testable
//! without one.

use std::io;

use crate::unlock::UnlockError;

/// Attempts allowed for the interactive password/confirmation loop
pub const PASSWORD_ATTEMPTS: usize = 3;

/// Supplies protection passwords to the unlock operation
pub trait PasswordSource {
    /// Read one secret. `prompt` is a short human-readable label.
    fn read_password(&mut self, prompt: &str) -> io::Result<String>;

    /// Called when a password and its confirmation differ, before a retry
    fn notify_mismatch(&mut self, _attempt: usize, _max_attempts: usize) {}
}

/// Collect a password with confirmation, retrying up to
/// [`PASSWORD_ATTEMPTS`] times before giving up.
pub fn confirm_password(source: &mut dyn PasswordSource) -> Result<String, UnlockError> {
    for attempt in 1..=PASSWORD_ATTEMPTS {
        let password = source.read_password("Enter the password to protect the sheet")?;
        let confirmation = source.read_password("Confirm the password")?;
        if password == confirmation {
            return Ok(password);
        }
        log::warn!(
            "password confirmation mismatch (attempt {}/{})",
            attempt,
            PASSWORD_ATTEMPTS
        );
        source.notify_mismatch(attempt, PASSWORD_ATTEMPTS);
    }
    Err(UnlockError::PasswordConfirmationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Scripted(Vec<&'static str>, usize);

    impl PasswordSource for Scripted {
        fn read_password(&mut self, _prompt: &str) -> io::Result<String> {
            let value = self.0.remove(0).to_string();
            Ok(value)
        }

        fn notify_mismatch(&mut self, _attempt: usize, _max: usize) {
            self.1 += 1;
        }
    }

    #[test]
    fn test_matching_pair() {
        let mut source = Scripted(vec!["hunter2", "hunter2"], 0);
        assert_eq!(confirm_password(&mut source).unwrap(), "hunter2");
        assert_eq!(source.1, 0);
    }

    #[test]
    fn test_retry_then_match() {
        let mut source = Scripted(vec!["a", "b", "c", "c"], 0);
        assert_eq!(confirm_password(&mut source).unwrap(), "c");
        assert_eq!(source.1, 1);
    }

    #[test]
    fn test_exhausted_attempts() {
        let mut source = Scripted(vec!["a", "b", "c", "d", "e", "f"], 0);
        let err = confirm_password(&mut source).unwrap_err();
        assert!(matches!(err, UnlockError::PasswordConfirmationFailed));
        assert_eq!(source.1, PASSWORD_ATTEMPTS);
    }
}
