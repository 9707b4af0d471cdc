use fieldops_core::AppResult;

/// Port for encrypting webhook signing secrets at rest.
pub trait SecretEncryptor: Send + Sync {
    /// Encrypts a signing secret for database storage.
    fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>>;

    /// Decrypts a stored signing secret.
    fn decrypt(&self, ciphertext: &[u8]) -> AppResult<Vec<u8>>;
}
