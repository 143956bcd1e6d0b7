use rotator_core::config::credentials::{read_env_file, resolve_credentials, PASSWORD_VAR, USERNAME_VAR};
use rotator_core::error::CredentialError;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_env_file_supplies_credentials() {
    let dir = TempDir::new().unwrap();
    let env_path = dir.path().join(".env");
    fs::write(
        &env_path,
        "# tunnel credentials\nUSERNAME=proton-user\nPASSWORD=\"p@ss word\"\n",
    )
    .unwrap();

    let file_vars = read_env_file(&env_path).unwrap();
    let credentials = resolve_credentials(|_| None, &file_vars).unwrap();

    assert_eq!(credentials.username(), "proton-user");
    assert_eq!(credentials.expose_password(), "p@ss word");
}

#[test]
fn test_missing_env_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = read_env_file(&dir.path().join("absent.env")).unwrap_err();

    assert!(matches!(err, CredentialError::EnvFile { .. }));
}

#[test]
fn test_missing_username_is_reported_first() {
    let err = resolve_credentials(|_| None, &HashMap::new()).unwrap_err();

    assert_eq!(
        err,
        CredentialError::Missing {
            var: USERNAME_VAR.to_string()
        }
    );
    assert!(err.to_string().contains("USERNAME"));
}

#[test]
fn test_missing_password_is_reported() {
    let mut file_vars = HashMap::new();
    file_vars.insert(USERNAME_VAR.to_string(), "proton-user".to_string());

    let err = resolve_credentials(|_| None, &file_vars).unwrap_err();
    assert_eq!(
        err,
        CredentialError::Missing {
            var: PASSWORD_VAR.to_string()
        }
    );
}
