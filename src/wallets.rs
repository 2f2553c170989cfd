use crate::config::expand_path;
use alloy::signers::local::PrivateKeySigner;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::path::{
    Path,
    PathBuf,
};

/// An encrypted JSON keystore on disk.
#[derive(Clone, Debug)]
pub struct KeystoreDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl KeystoreDescriptor {
    pub fn from_path(raw: &str) -> Result<Self> {
        let path = expand_path(raw);
        if !path.is_file() {
            return Err(eyre!("Keystore {} does not exist", path.display()));
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        Ok(Self { name, path })
    }
}

/// Prompts for the keystore password on the terminal and decrypts it.
pub fn unlock_keystore(descriptor: &KeystoreDescriptor) -> Result<PrivateKeySigner> {
    let prompt = format!("Enter password for keystore '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read keystore password")?;
    decrypt_signer(&descriptor.path, &descriptor.name, &password)
}

fn decrypt_signer(path: &Path, name: &str, password: &str) -> Result<PrivateKeySigner> {
    let secret = decrypt_key(path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for keystore '{name}'"))?;
    PrivateKeySigner::from_slice(&secret)
        .map_err(|_| eyre!("Keystore '{name}' contained unsupported key material"))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn from_path__missing_file__errors() {
        let dir = TempDir::new("keystores").unwrap();
        let missing = dir.path().join("nobody.json");

        let result = KeystoreDescriptor::from_path(missing.to_str().unwrap());

        assert!(result.is_err());
    }

    #[test]
    fn from_path__existing_file__uses_stem_as_name() {
        let dir = TempDir::new("keystores").unwrap();
        let path = dir.path().join("player.json");
        fs::write(&path, "{}").unwrap();

        let descriptor = KeystoreDescriptor::from_path(path.to_str().unwrap()).unwrap();

        assert_eq!(descriptor.name, "player");
        assert_eq!(descriptor.path, path);
    }

    #[test]
    fn from_path__tilde_path__looks_under_home() {
        let err = KeystoreDescriptor::from_path("~/no-such-dir/player.json").unwrap_err();

        let message = err.to_string();
        assert!(!message.contains('~'));
        assert!(message.contains("no-such-dir/player.json"));
    }

    #[test]
    fn decrypt_signer__malformed_keystore__reports_invalid_password() {
        let dir = TempDir::new("keystores").unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "not a keystore").unwrap();

        let err = decrypt_signer(&path, "broken", "hunter2").unwrap_err();

        assert!(err.to_string().contains("broken"));
    }
}
