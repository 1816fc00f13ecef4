mod common;

use aclsync::core::catalog::CurrentStateReader;
use aclsync::core::errors::AclSyncError;
use aclsync::core::policy::PolicyDocument;
use aclsync::core::privilege::Scope;
use aclsync::core::resolver::DesiredStateResolver;
use common::{MockExecutor, policy, row};
use serde_json::json;

async fn resolve(
    executor: &MockExecutor,
    document: &PolicyDocument,
    production_schemas: &[String],
    scope: Scope,
) -> Result<aclsync::core::AclMap, AclSyncError> {
    let reader = CurrentStateReader::new(executor, "admin".to_string());
    let resolver = DesiredStateResolver::new(document, production_schemas, &reader);
    resolver.desired_acl(scope).await
}

fn two_schemas() -> Vec<String> {
    vec!["a".to_string(), "b".to_string()]
}

#[tokio::test]
async fn test_full_wildcard_expands_to_every_table_in_every_schema() {
    let executor = MockExecutor::new()
        .with_rows("where schemaname='a'", vec![row(&[("tablename", "t1")])])
        .with_rows("where schemaname='b'", vec![row(&[("tablename", "t2")])]);
    let document = policy(json!({
        "users": {
            "alice": {
                "permissions": [
                    {"type": "table", "identifiers": ["*.*"], "privileges": ["select"]}
                ]
            }
        }
    }));

    let tables = resolve(&executor, &document, &two_schemas(), Scope::Table)
        .await
        .unwrap();
    assert_eq!(tables["alice"]["a.t1"], vec!["select"]);
    assert_eq!(tables["alice"]["b.t2"], vec!["select"]);

    // Table grants imply usage on every schema they touch.
    let schemas = resolve(&executor, &document, &two_schemas(), Scope::Schema)
        .await
        .unwrap();
    assert_eq!(schemas["alice"]["a"], vec!["usage"]);
    assert_eq!(schemas["alice"]["b"], vec!["usage"]);
}

#[tokio::test]
async fn test_concrete_schema_wildcard_table() {
    let executor = MockExecutor::new().with_rows(
        "where schemaname='a'",
        vec![row(&[("tablename", "t1")]), row(&[("tablename", "t2")])],
    );
    let document = policy(json!({
        "users": {
            "alice": {
                "permissions": [
                    {"type": "table", "identifiers": ["a.*"], "privileges": ["select", "insert"]}
                ]
            }
        }
    }));

    let tables = resolve(&executor, &document, &two_schemas(), Scope::Table)
        .await
        .unwrap();
    assert_eq!(tables["alice"]["a.t1"], vec!["select", "insert"]);
    assert_eq!(tables["alice"]["a.t2"], vec!["select", "insert"]);
    assert_eq!(tables["alice"].len(), 2);
}

#[tokio::test]
async fn test_wildcard_schema_with_concrete_table_is_refused() {
    let executor = MockExecutor::new();
    let document = policy(json!({
        "users": {
            "alice": {
                "permissions": [
                    {"type": "table", "identifiers": ["*.t1"], "privileges": ["select"]}
                ]
            }
        }
    }));

    let err = resolve(&executor, &document, &two_schemas(), Scope::Table)
        .await
        .unwrap_err();
    assert!(matches!(err, AclSyncError::Config(_)));
}

#[tokio::test]
async fn test_database_wildcard_is_refused() {
    let executor = MockExecutor::new();
    let document = policy(json!({
        "users": {
            "alice": {
                "permissions": [
                    {"type": "database", "identifiers": ["*"], "privileges": ["connect"]}
                ]
            }
        }
    }));

    let err = resolve(&executor, &document, &two_schemas(), Scope::Database)
        .await
        .unwrap_err();
    assert!(matches!(err, AclSyncError::Config(_)));
}

#[tokio::test]
async fn test_schema_wildcard_expands_to_production_schemas() {
    let executor = MockExecutor::new();
    let document = policy(json!({
        "users": {
            "alice": {
                "permissions": [
                    {"type": "schema", "identifiers": ["*"], "privileges": ["create"]}
                ]
            }
        }
    }));

    let schemas = resolve(&executor, &document, &two_schemas(), Scope::Schema)
        .await
        .unwrap();
    assert_eq!(schemas["alice"]["a"], vec!["create"]);
    assert_eq!(schemas["alice"]["b"], vec!["create"]);
}

#[tokio::test]
async fn test_all_absorbs_enumerated_privileges() {
    let executor = MockExecutor::new();
    let document = policy(json!({
        "users": {
            "alice": {
                "permissions": [
                    {"type": "table", "identifiers": ["prod.t1"], "privileges": ["select"]},
                    {"type": "table", "identifiers": ["prod.t1"], "privileges": ["all", "insert"]}
                ]
            }
        }
    }));

    let tables = resolve(&executor, &document, &["prod".to_string()], Scope::Table)
        .await
        .unwrap();
    assert_eq!(tables["alice"]["prod.t1"], vec!["all"]);
}

#[tokio::test]
async fn test_duplicate_privileges_are_collapsed() {
    let executor = MockExecutor::new();
    let document = policy(json!({
        "users": {
            "alice": {
                "permissions": [
                    {"type": "schema", "identifiers": ["prod"], "privileges": ["usage"]},
                    {"type": "schema", "identifiers": ["prod"], "privileges": ["usage", "create"]}
                ]
            }
        }
    }));

    let schemas = resolve(&executor, &document, &["prod".to_string()], Scope::Schema)
        .await
        .unwrap();
    assert_eq!(schemas["alice"]["prod"], vec!["usage", "create"]);
}

#[tokio::test]
async fn test_group_grantees_carry_the_group_prefix() {
    let executor = MockExecutor::new();
    let document = policy(json!({
        "groups": {
            "analysts": {
                "permissions": [
                    {"type": "database", "identifiers": ["analytics"], "privileges": ["connect"]}
                ]
            }
        }
    }));

    let databases = resolve(&executor, &document, &["prod".to_string()], Scope::Database)
        .await
        .unwrap();
    assert_eq!(databases["group analysts"]["analytics"], vec!["connect"]);
    assert!(!databases.contains_key("analysts"));
}

#[tokio::test]
async fn test_grantees_without_grants_at_scope_are_omitted() {
    let executor = MockExecutor::new();
    let document = policy(json!({
        "users": {
            "alice": {
                "permissions": [
                    {"type": "schema", "identifiers": ["prod"], "privileges": ["usage"]}
                ]
            },
            "bob": {}
        }
    }));

    let databases = resolve(&executor, &document, &["prod".to_string()], Scope::Database)
        .await
        .unwrap();
    assert!(databases.is_empty());
}
