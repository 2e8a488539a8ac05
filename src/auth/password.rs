use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::error;

use crate::config::PasswordHashConfig;

/// Argon2id hashing with a configurable work factor.
///
/// Also keeps a dummy hash computed with the same parameters so that a login
/// for an unknown email can spend the same time verifying as a real one.
#[derive(Clone)]
pub struct PasswordHashing {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHashing {
    pub fn new(cfg: PasswordHashConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let filler: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let dummy_hash = hash_with(&argon2, &filler)?;

        Ok(Self { argon2, dummy_hash })
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        hash_with(&self.argon2, plain)
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash cannot be parsed.
    pub fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Burns one verification against the dummy hash. Result is always discarded.
    pub fn verify_dummy(&self, plain: &str) {
        let _ = self.verify(plain, &self.dummy_hash);
    }
}

fn hash_with(argon2: &Argon2<'_>, plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

#[cfg(test)]
pub(crate) fn cheap_config() -> PasswordHashConfig {
    PasswordHashConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashing() -> PasswordHashing {
        PasswordHashing::new(cheap_config()).expect("valid params")
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let h = hashing();
        let password = "Secur3P@ssw0rd!";
        let hash = h.hash(password).expect("hashing should succeed");
        assert!(h.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let h = hashing();
        let hash = h.hash("correct-horse-battery-staple").unwrap();
        assert!(!h.verify("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = hashing().verify("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn same_password_gets_distinct_salted_hashes() {
        let h = hashing();
        let a = h.hash("same-password").unwrap();
        let b = h.hash("same-password").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, "same-password");
        assert!(a.starts_with("$argon2id$"));
    }

    #[test]
    fn configured_cost_is_encoded_in_hash() {
        let hash = hashing().hash("pw").unwrap();
        assert!(hash.contains("m=64,t=1,p=1"), "{hash}");
    }

    #[test]
    fn invalid_params_are_rejected() {
        let cfg = PasswordHashConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(PasswordHashing::new(cfg).is_err());
    }
}
