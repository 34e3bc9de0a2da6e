//! Author identity for generated headers.
//!
//! Explicit values win. Otherwise the name comes from `git config --get
//! user.name`, then `$USER`/`$USERNAME`, then `unknown`; the e-mail from
//! `git config --get user.email`, else none.

use std::process::Command;

use tracing::debug;

/// Fallback when no author can be found anywhere.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Source of identity facts. Abstracted so resolution can be tested without
/// touching git or the environment.
pub trait IdentitySource {
    fn git_config(&self, key: &str) -> Option<String>;
    fn env_var(&self, key: &str) -> Option<String>;
}

/// The real environment: runs `git config --get` and reads process env.
pub struct SystemIdentity;

impl IdentitySource for SystemIdentity {
    fn git_config(&self, key: &str) -> Option<String> {
        let output = Command::new("git").args(["config", "--get", key]).output().ok()?;
        if !output.status.success() {
            return None;
        }
        non_empty(String::from_utf8_lossy(&output.stdout).trim())
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().and_then(|v| non_empty(v.trim()))
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Resolved author name and e-mail.
pub fn resolve_identity(
    source: &impl IdentitySource,
    author: Option<&str>,
    email: Option<&str>,
) -> (String, Option<String>) {
    let author = author
        .and_then(non_empty)
        .or_else(|| source.git_config("user.name"))
        .or_else(|| source.env_var("USER"))
        .or_else(|| source.env_var("USERNAME"))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let email = email
        .and_then(non_empty)
        .or_else(|| source.git_config("user.email"));
    debug!("Author: {author} email: {email:?}");
    (author, email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Fake {
        git: HashMap<&'static str, &'static str>,
        env: HashMap<&'static str, &'static str>,
    }

    impl IdentitySource for Fake {
        fn git_config(&self, key: &str) -> Option<String> {
            self.git.get(key).map(|v| v.to_string())
        }
        fn env_var(&self, key: &str) -> Option<String> {
            self.env.get(key).map(|v| v.to_string())
        }
    }

    #[test]
    fn explicit_values_win() {
        let fake = Fake {
            git: HashMap::from([("user.name", "Git Name"), ("user.email", "git@x")]),
            ..Default::default()
        };
        let (author, email) = resolve_identity(&fake, Some("Me"), Some("me@x"));
        assert_eq!(author, "Me");
        assert_eq!(email.as_deref(), Some("me@x"));
    }

    #[test]
    fn git_then_env_then_unknown() {
        let git = Fake {
            git: HashMap::from([("user.name", "Git Name"), ("user.email", "git@x")]),
            env: HashMap::from([("USER", "login")]),
        };
        assert_eq!(
            resolve_identity(&git, None, None),
            ("Git Name".to_string(), Some("git@x".to_string()))
        );

        let env = Fake {
            env: HashMap::from([("USERNAME", "win")]),
            ..Default::default()
        };
        assert_eq!(resolve_identity(&env, None, None), ("win".to_string(), None));

        let nothing = Fake::default();
        assert_eq!(resolve_identity(&nothing, None, None).0, UNKNOWN_AUTHOR);
    }

    #[test]
    fn empty_explicit_values_fall_through() {
        let fake = Fake {
            env: HashMap::from([("USER", "login")]),
            ..Default::default()
        };
        assert_eq!(resolve_identity(&fake, Some(""), Some("")), ("login".to_string(), None));
    }
}
