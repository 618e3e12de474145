//! Plan file parsing and validation.
//!
//! Plans travel as JSON; these tests go through serde the same way the
//! CLI does and check that a bad plan is rejected before it can cost a
//! connection.

use secrecy::ExposeSecret;

use landfall::errors::DeployError;
use landfall::models::plan::{DeploymentPlan, PlanFile};

fn parse(json: &str) -> Result<DeploymentPlan, DeployError> {
    let file: PlanFile = serde_json::from_str(json).expect("plan JSON should deserialize");
    DeploymentPlan::from_file(file)
}

fn minimal_json(runtime_version: &str) -> String {
    format!(
        r#"{{
            "serverHost": "203.0.113.10",
            "sshUser": "deploy",
            "repoUrl": "https://github.com/acme/shop.git",
            "runtimeVersion": "{}",
            "domainName": "shop.example.com"
        }}"#,
        runtime_version
    )
}

#[test]
fn test_minimal_plan_uses_defaults() {
    let plan = parse(&minimal_json("8.2")).unwrap();

    assert_eq!(plan.server_host(), "203.0.113.10");
    assert_eq!(plan.ssh_user(), "deploy");
    assert_eq!(plan.project_path(), "/var/www");
    assert_eq!(plan.app_env(), "production");
    assert_eq!(plan.repo_name(), "shop");
    assert_eq!(plan.checkout_path(), "/var/www/shop");
    assert_eq!(plan.runtime_version().to_string(), "8.2");
    assert!(plan.app_key().is_none());
    assert!(plan.database().is_none());
    assert!(!plan.install_migrations());
    assert!(!plan.issue_certificate());
}

#[test]
fn test_full_plan_parses() {
    let plan = parse(
        r#"{
            "serverHost": "203.0.113.10",
            "sshUser": "deploy",
            "projectPath": "/srv/apps/",
            "repoUrl": "git@github.com:acme/My-Repo.git",
            "appEnv": "staging",
            "appKey": "base64:c2VjcmV0",
            "runtimeVersion": "8.3",
            "domainName": "staging.example.com",
            "createDatabase": true,
            "database": {
                "name": "myrepo",
                "rootPassword": "hunter2",
                "user": { "name": "myrepo_app", "password": "s3cret" }
            },
            "installMigrations": true,
            "issueCertificate": true,
            "certificateEmail": "ops@example.com"
        }"#,
    )
    .unwrap();

    assert_eq!(plan.repo_name(), "My-Repo");
    assert_eq!(plan.project_path(), "/srv/apps");
    assert_eq!(plan.checkout_path(), "/srv/apps/My-Repo");
    assert_eq!(plan.app_env(), "staging");
    assert_eq!(plan.app_key().unwrap().expose_secret(), "base64:c2VjcmV0");
    assert_eq!(plan.runtime_version().major(), 8);
    assert_eq!(plan.runtime_version().minor(), 3);

    let db = plan.database().unwrap();
    assert_eq!(db.name, "myrepo");
    assert_eq!(db.root_password.expose_secret(), "hunter2");
    let user = db.user.as_ref().unwrap();
    assert_eq!(user.name, "myrepo_app");
    assert_eq!(user.password.expose_secret(), "s3cret");

    assert!(plan.install_migrations());
    assert!(plan.issue_certificate());
    assert_eq!(plan.certificate_email(), Some("ops@example.com"));
}

#[test]
fn test_invalid_runtime_version_is_rejected() {
    for version in ["8", "8.", ".2", "8.2.1", "v8.2", "8.x", "latest", ""] {
        let err = parse(&minimal_json(version)).unwrap_err();
        assert!(
            matches!(err, DeployError::ValidationError(_)),
            "'{}' should be rejected as a runtime version",
            version
        );
        assert!(err.to_string().contains("runtimeVersion"));
    }
}

#[test]
fn test_create_database_requires_a_database_section() {
    let err = parse(
        r#"{
            "serverHost": "203.0.113.10",
            "sshUser": "deploy",
            "repoUrl": "https://github.com/acme/shop.git",
            "runtimeVersion": "8.2",
            "domainName": "shop.example.com",
            "createDatabase": true
        }"#,
    )
    .unwrap_err();

    assert!(matches!(err, DeployError::ValidationError(_)));
    assert!(err.to_string().contains("createDatabase"));
}

#[test]
fn test_database_without_create_flag_is_ignored() {
    let plan = parse(
        r#"{
            "serverHost": "203.0.113.10",
            "sshUser": "deploy",
            "repoUrl": "https://github.com/acme/shop.git",
            "runtimeVersion": "8.2",
            "domainName": "shop.example.com",
            "database": { "name": "shop", "rootPassword": "pw" }
        }"#,
    )
    .unwrap();

    assert!(plan.database().is_none());
}

#[test]
fn test_hostile_sql_identifiers_are_rejected() {
    for name in ["shop;drop", "shop`", "shop name", "shop-prod", ""] {
        let json = format!(
            r#"{{
                "serverHost": "203.0.113.10",
                "sshUser": "deploy",
                "repoUrl": "https://github.com/acme/shop.git",
                "runtimeVersion": "8.2",
                "domainName": "shop.example.com",
                "createDatabase": true,
                "database": {{ "name": {}, "rootPassword": "pw" }}
            }}"#,
            serde_json::to_string(name).unwrap()
        );
        let err = parse(&json).unwrap_err();
        assert!(
            matches!(err, DeployError::ValidationError(_)),
            "'{}' should be rejected as a database name",
            name
        );
    }
}

#[test]
fn test_pathless_repo_url_is_rejected() {
    for url in [
        "https://git.example.com/",
        "https://git.example.com",
        "git@git.example.com:",
    ] {
        let json = format!(
            r#"{{
                "serverHost": "203.0.113.10",
                "sshUser": "deploy",
                "repoUrl": {},
                "runtimeVersion": "8.2",
                "domainName": "shop.example.com"
            }}"#,
            serde_json::to_string(url).unwrap()
        );
        let err = parse(&json).unwrap_err();
        assert!(
            matches!(err, DeployError::ValidationError(_)),
            "'{}' should not yield a repository name",
            url
        );
        assert!(err.to_string().contains("repoUrl"));
    }
}

#[test]
fn test_relative_project_path_is_rejected() {
    let err = parse(
        r#"{
            "serverHost": "203.0.113.10",
            "sshUser": "deploy",
            "projectPath": "apps",
            "repoUrl": "https://github.com/acme/shop.git",
            "runtimeVersion": "8.2",
            "domainName": "shop.example.com"
        }"#,
    )
    .unwrap_err();

    assert!(err.to_string().contains("absolute"));
}

#[test]
fn test_bad_domain_names_are_rejected() {
    for domain in ["shop example.com", "-shop.example.com", ".example.com", "", "a;b.com"] {
        let json = format!(
            r#"{{
                "serverHost": "203.0.113.10",
                "sshUser": "deploy",
                "repoUrl": "https://github.com/acme/shop.git",
                "runtimeVersion": "8.2",
                "domainName": {}
            }}"#,
            serde_json::to_string(domain).unwrap()
        );
        let err = parse(&json).unwrap_err();
        assert!(
            matches!(err, DeployError::ValidationError(_)),
            "'{}' should be rejected as a domain",
            domain
        );
    }
}

#[test]
fn test_empty_host_and_user_are_rejected() {
    let err = parse(
        r#"{
            "serverHost": " ",
            "sshUser": "deploy",
            "repoUrl": "https://github.com/acme/shop.git",
            "runtimeVersion": "8.2",
            "domainName": "shop.example.com"
        }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("serverHost"));

    let err = parse(
        r#"{
            "serverHost": "203.0.113.10",
            "sshUser": "",
            "repoUrl": "https://github.com/acme/shop.git",
            "runtimeVersion": "8.2",
            "domainName": "shop.example.com"
        }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("sshUser"));
}
