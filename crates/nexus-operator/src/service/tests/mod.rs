
use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use kube::ResourceExt;
use serde_json::json;
use tracing::Span;

use self::fixtures::{instance, FakeNexus, Harness, DEFAULT_PASSWORD};
use super::{ConfigureOutcome, NexusService};
use crate::config::OperatorConfig;
use crate::error::Error;
use crate::platform::objects::{self, PROXY_NAME, PROXY_PORT};
use crate::platform::MockPlatform;

const ADMIN_SECRET: &str = "nexus-admin-password";

fn script_order(harness: &Harness) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for (name, _) in &harness.nexus.state().runs {
        if order.last() != Some(name) {
            order.push(name.clone());
        }
    }
    order
}

fn enable_keycloak(harness: &mut Harness) {
    harness.instance.spec.keycloak_spec.enabled = true;
}

fn seed_identity_credentials(harness: &Harness) {
    let secret = objects::secret(
        &harness.instance,
        "nexus-is-credentials",
        BTreeMap::from([
            ("clientSecret".to_string(), "kc-secret".to_string()),
            ("clientId".to_string(), "nexus-client".to_string()),
        ]),
    )
    .unwrap();
    harness
        .platform
        .state()
        .secrets
        .insert("nexus-is-credentials".to_string(), secret);
}

// ---------------------------------------------------------------------------
// Install
// ---------------------------------------------------------------------------

#[tokio::test]
async fn install_twice_yields_identical_resources() {
    let harness = Harness::new();

    harness.service.install(&harness.instance).await.unwrap();
    let first = harness.platform.inventory();
    harness.service.install(&harness.instance).await.unwrap();

    assert_eq!(harness.platform.inventory(), first);
}

#[tokio::test]
async fn install_materialises_every_object() {
    let harness = Harness::new();
    harness.service.install(&harness.instance).await.unwrap();

    let inventory = harness.platform.inventory();
    assert_eq!(inventory["secrets"], vec![ADMIN_SECRET.to_string()]);
    assert_eq!(inventory["claims"], vec!["nexus-data".to_string()]);
    assert_eq!(inventory["serviceAccounts"], vec!["nexus".to_string()]);
    assert_eq!(inventory["services"], vec!["nexus".to_string()]);
    assert_eq!(inventory["deployments"], vec!["nexus".to_string()]);
    assert_eq!(inventory["ingresses"], vec!["nexus".to_string()]);
    assert_eq!(
        inventory["configMaps"],
        vec![
            "nexus-blobs",
            "nexus-default-capabilities",
            "nexus-default-users",
            "nexus-repos-to-create",
            "nexus-repos-to-delete",
            "nexus-roles",
            "nexus-scripts",
            "nexus-tasks",
        ]
    );

    let state = harness.platform.state();
    let tasks = state.config_maps["nexus-tasks"].data.as_ref().unwrap();
    assert_eq!(tasks.keys().collect::<Vec<_>>(), vec!["tasks"]);
    let scripts = state.config_maps["nexus-scripts"].data.as_ref().unwrap();
    assert!(scripts.contains_key("setup-user.groovy"));
    assert!(scripts.contains_key("update-admin-password.groovy"));
    drop(state);

    assert_eq!(harness.stored_admin_password(), DEFAULT_PASSWORD);
    assert_eq!(
        harness.platform.secret_value(ADMIN_SECRET, "user").as_deref(),
        Some("admin")
    );
}

#[tokio::test]
async fn install_keeps_an_existing_admin_record() {
    let harness = Harness::new();
    harness.service.install(&harness.instance).await.unwrap();
    harness
        .platform
        .put_secret_data(ADMIN_SECRET, &[("user", "admin"), ("password", "Rotated1")]);

    harness.service.install(&harness.instance).await.unwrap();

    assert_eq!(harness.stored_admin_password(), "Rotated1");
}

#[tokio::test]
async fn install_failure_names_the_step_and_keeps_earlier_objects() {
    let harness = Harness::new();
    harness.platform.fail_on(Some("create_service"));

    let err = harness.service.install(&harness.instance).await.unwrap_err();

    assert!(matches!(&err, Error::Step { action, .. } if action == "create service"));
    assert!(err.to_string().contains("ci/nexus"));
    let inventory = harness.platform.inventory();
    assert_eq!(inventory["secrets"].len(), 1);
    assert_eq!(inventory["serviceAccounts"].len(), 1);
    assert!(inventory["deployments"].is_empty());
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn readiness_requires_exactly_one_available_replica() {
    for (replicas, expected) in [(0, false), (1, true), (2, false)] {
        let mut platform = MockPlatform::new();
        platform.expect_get_deployment().returning(move |_, _| {
            Ok(Deployment {
                status: Some(DeploymentStatus {
                    available_replicas: Some(replicas),
                    ..Default::default()
                }),
                ..Default::default()
            })
        });
        let service = NexusService::new(
            Arc::new(platform),
            Arc::new(FakeNexus::default()),
            Arc::new(OperatorConfig::default()),
            Span::none(),
        );

        assert_eq!(
            service.is_ready(&instance()).await.unwrap(),
            expected,
            "{replicas} available replicas"
        );
    }
}

#[tokio::test]
async fn fresh_deployment_is_not_ready() {
    let harness = Harness::new();
    harness.service.install(&harness.instance).await.unwrap();

    assert!(!harness.service.is_ready(&harness.instance).await.unwrap());
}

// ---------------------------------------------------------------------------
// Configure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn configure_is_pending_until_nexus_answers() {
    let harness = Harness::new().installed().await;
    harness.nexus.state().ready = false;

    let outcome = harness.service.configure(&harness.instance).await.unwrap();

    assert!(matches!(outcome, ConfigureOutcome::Pending { .. }));
    assert!(harness.nexus.state().runs.is_empty());
    assert_eq!(harness.stored_admin_password(), DEFAULT_PASSWORD);
}

#[tokio::test]
async fn configure_uses_in_cluster_service_url() {
    let harness = Harness::new().installed().await;
    harness.service.configure(&harness.instance).await.unwrap();

    assert_eq!(
        harness.nexus.state().base_urls[0],
        "http://nexus.ci:8081/service/rest"
    );
}

#[tokio::test]
async fn configure_outside_the_cluster_goes_through_the_ingress() {
    let mut harness = Harness::with(&[], |config| config.in_cluster = false);
    harness.instance.spec.base_path = Some("/nexus".to_string());
    let harness = harness.installed().await;

    harness.service.configure(&harness.instance).await.unwrap();

    assert_eq!(
        harness.nexus.state().base_urls[0],
        "http://nexus-ci.apps.example.com/nexus/service/rest"
    );
}

#[tokio::test]
async fn configure_rotates_the_default_password_exactly_once() {
    let harness = Harness::new().installed().await;

    assert_eq!(
        harness.service.configure(&harness.instance).await.unwrap(),
        ConfigureOutcome::Done
    );
    assert_eq!(
        harness.service.configure(&harness.instance).await.unwrap(),
        ConfigureOutcome::Done
    );

    let stored = harness.stored_admin_password();
    let nexus = harness.nexus.state();
    assert_ne!(stored, DEFAULT_PASSWORD);
    assert_eq!(stored.len(), 16);
    assert_eq!(nexus.admin_password, stored);
    assert_eq!(nexus.password_changes, 1);
    assert_eq!(nexus.runs_of("update-admin-password").len(), 1);
    assert_eq!(nexus.runs_of("update-admin-password")[0]["username"], "admin");
    assert!(harness
        .platform
        .secret_value(ADMIN_SECRET, "pending-password")
        .is_none());
}

#[tokio::test]
async fn rotation_targets_the_configured_admin_user() {
    let harness = Harness::with(&[], |config| config.admin.username = "root".to_string());
    harness.nexus.state().admin_username = "root".to_string();
    let harness = harness.installed().await;

    assert_eq!(
        harness.service.configure(&harness.instance).await.unwrap(),
        ConfigureOutcome::Done
    );

    let nexus = harness.nexus.state();
    assert_eq!(nexus.runs_of("update-admin-password")[0]["username"], "root");
    assert_eq!(nexus.password_changes, 1);
    assert_eq!(nexus.admin_password, harness.stored_admin_password());
}

#[tokio::test]
async fn configure_with_empty_bundles_is_done() {
    let mut harness = Harness::with(
        &[
            ("tasks", "[]"),
            ("roles", "[]"),
            ("blobs", "[]"),
            ("repos-to-create", "[]"),
            ("repos-to-delete", "[]"),
            ("default-capabilities", "[]"),
        ],
        |_| {},
    );
    harness.instance.spec.users.clear();
    let harness = harness.installed().await;

    let ports: Vec<i32> = harness.platform.state().services["nexus"]
        .spec
        .as_ref()
        .unwrap()
        .ports
        .as_ref()
        .unwrap()
        .iter()
        .map(|p| p.port)
        .collect();
    assert_eq!(ports, vec![8081]);

    assert_eq!(
        harness.service.configure(&harness.instance).await.unwrap(),
        ConfigureOutcome::Done
    );
    assert_eq!(
        script_order(&harness),
        vec![
            "update-admin-password",
            "disable-outreach-capability",
            "enable-realm"
        ]
    );
}

#[tokio::test]
async fn configure_runs_scripts_in_order() {
    let harness = Harness::new().installed().await;
    harness.service.configure(&harness.instance).await.unwrap();

    assert_eq!(
        script_order(&harness),
        vec![
            "update-admin-password",
            "create-task",
            "disable-outreach-capability",
            "setup-capability",
            "enable-realm",
            "create-role",
            "create-blobstore",
            "create-repo-maven-proxy",
            "delete-repo",
            "setup-user",
        ]
    );

    let nexus = harness.nexus.state();
    assert_eq!(
        nexus.runs_of("disable-outreach-capability"),
        vec![&json!({})]
    );
    assert_eq!(
        nexus.runs_of("enable-realm"),
        vec![&json!({"name": "NuGetApiKey"})]
    );
}

#[tokio::test]
async fn repository_entries_select_scripts_by_type() {
    let harness = Harness::new().installed().await;
    harness.service.configure(&harness.instance).await.unwrap();

    let nexus = harness.nexus.state();
    assert_eq!(
        nexus.runs_of("create-repo-maven-proxy"),
        vec![&json!({"name": "libs", "repositoryType": "maven-proxy"})]
    );
    assert_eq!(nexus.runs_of("delete-repo"), vec![&json!({"name": "stale"})]);
}

#[tokio::test]
async fn repository_entry_without_type_is_rejected() {
    let harness = Harness::with(&[("repos-to-create", r#"[{"name":"libs"}]"#)], |_| {})
        .installed()
        .await;

    let err = harness.service.configure(&harness.instance).await.unwrap_err();

    assert!(matches!(err.root(), Error::InvalidParameters { bundle, .. } if bundle == "nexus-repos-to-create"));
    assert!(harness.nexus.state().runs_of("delete-repo").is_empty());
}

#[tokio::test]
async fn declared_users_get_random_passwords() {
    let harness = Harness::new().installed().await;
    harness.service.configure(&harness.instance).await.unwrap();

    let nexus = harness.nexus.state();
    let runs = nexus.runs_of("setup-user");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["username"], "jane");
    assert_eq!(runs[0]["first_name"], "Jane");
    assert_eq!(runs[0]["email"], "jane@example.com");
    assert_eq!(runs[0]["roles"], json!(["nx-admin"]));
    assert_eq!(runs[0]["password"].as_str().unwrap().len(), 16);
}

#[tokio::test]
async fn configure_converges_after_failing_at_any_script() {
    let baseline = Harness::new().installed().await;
    baseline.service.configure(&baseline.instance).await.unwrap();
    let expected = baseline.nexus.state().objects.clone();

    for failing in [
        "update-admin-password",
        "create-task",
        "create-role",
        "create-repo-maven-proxy",
        "delete-repo",
        "setup-user",
    ] {
        let harness = Harness::new().installed().await;
        harness.nexus.state().fail_script = Some(failing.to_string());

        let err = harness.service.configure(&harness.instance).await.unwrap_err();
        assert!(
            matches!(err.root(), Error::ScriptFailed { script, .. } if script == failing),
            "{failing}: {err}"
        );

        harness.nexus.state().fail_script = None;
        assert_eq!(
            harness.service.configure(&harness.instance).await.unwrap(),
            ConfigureOutcome::Done
        );

        let nexus = harness.nexus.state();
        assert_eq!(nexus.objects, expected, "{failing}");
        assert_eq!(nexus.password_changes, 1, "{failing}");
        assert_eq!(nexus.admin_password, harness.stored_admin_password());
    }
}

#[tokio::test]
async fn failed_pending_write_leaves_nexus_untouched() {
    let harness = Harness::new().installed().await;
    harness.platform.fail_on(Some("update_secret"));

    let err = harness.service.configure(&harness.instance).await.unwrap_err();

    assert!(matches!(&err, Error::Step { action, .. } if action == "record pending admin password"));
    let nexus = harness.nexus.state();
    assert_eq!(nexus.admin_password, DEFAULT_PASSWORD);
    assert!(nexus.runs.is_empty());
}

#[tokio::test]
async fn rotation_is_retried_with_the_recorded_pending_password() {
    let harness = Harness::new().installed().await;
    harness.nexus.state().fail_script = Some("update-admin-password".to_string());

    harness
        .service
        .configure(&harness.instance)
        .await
        .unwrap_err();
    let pending = harness
        .platform
        .secret_value(ADMIN_SECRET, "pending-password")
        .unwrap();
    assert_eq!(harness.stored_admin_password(), DEFAULT_PASSWORD);

    harness.nexus.state().fail_script = None;
    harness.service.configure(&harness.instance).await.unwrap();

    assert_eq!(harness.stored_admin_password(), pending);
    assert_eq!(harness.nexus.state().admin_password, pending);
    assert!(harness
        .platform
        .secret_value(ADMIN_SECRET, "pending-password")
        .is_none());
}

#[tokio::test]
async fn rotation_applied_remotely_but_not_committed_is_committed() {
    let harness = Harness::new().installed().await;
    harness.platform.put_secret_data(
        ADMIN_SECRET,
        &[
            ("user", "admin"),
            ("password", DEFAULT_PASSWORD),
            ("pending-password", "Rotated000000001"),
        ],
    );
    harness.nexus.state().admin_password = "Rotated000000001".to_string();

    assert_eq!(
        harness.service.configure(&harness.instance).await.unwrap(),
        ConfigureOutcome::Done
    );

    assert_eq!(harness.stored_admin_password(), "Rotated000000001");
    assert!(harness
        .platform
        .secret_value(ADMIN_SECRET, "pending-password")
        .is_none());
    let nexus = harness.nexus.state();
    assert_eq!(nexus.password_changes, 0);
    assert!(nexus.runs_of("update-admin-password").is_empty());
}

#[tokio::test]
async fn rejected_stored_and_pending_passwords_are_a_desync() {
    let harness = Harness::new().installed().await;
    harness.platform.put_secret_data(
        ADMIN_SECRET,
        &[
            ("user", "admin"),
            ("password", DEFAULT_PASSWORD),
            ("pending-password", "Pending000000001"),
        ],
    );
    harness.nexus.state().admin_password = "SomethingElse001".to_string();

    let err = harness.service.configure(&harness.instance).await.unwrap_err();

    assert!(matches!(err, Error::CredentialDesync { .. }));
    assert!(harness.nexus.state().runs.is_empty());
}

#[tokio::test]
async fn unverified_scripts_stop_before_any_script_runs() {
    let harness = Harness::new().installed().await;
    harness.nexus.state().discard_uploads = true;

    let err = harness.service.configure(&harness.instance).await.unwrap_err();

    assert!(matches!(err, Error::VerificationFailed { .. }));
    assert!(harness.nexus.state().runs.is_empty());
    assert_eq!(harness.stored_admin_password(), DEFAULT_PASSWORD);
}

#[tokio::test]
async fn missing_bundle_aborts_configuration() {
    let harness = Harness::new().installed().await;
    harness.platform.state().config_maps.remove("nexus-roles");

    let err = harness.service.configure(&harness.instance).await.unwrap_err();

    assert!(err.is_not_found());
    let nexus = harness.nexus.state();
    assert_eq!(nexus.runs_of("create-task").len(), 1);
    assert!(nexus.runs_of("create-blobstore").is_empty());
}

// ---------------------------------------------------------------------------
// Expose configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expose_creates_ci_credentials_and_annotations() {
    let harness = Harness::new().installed().await;
    harness.service.configure(&harness.instance).await.unwrap();

    let updated = harness
        .service
        .expose_configuration(&harness.instance)
        .await
        .unwrap();

    let password = harness
        .platform
        .secret_value("nexus-ci.user", "password")
        .unwrap();
    assert_eq!(
        harness.platform.secret_value("nexus-ci.user", "first_name").as_deref(),
        Some("CI")
    );

    {
        let state = harness.platform.state();
        let account = &state.ci_accounts["nexus-ci.user"];
        assert_eq!(account.spec.account_type, "password");
        assert_eq!(account.spec.credentials, "nexus-ci.user");
        assert!(state.identity_clients.is_empty());
        assert_eq!(
            state.instance.as_ref().unwrap().annotations(),
            updated.annotations()
        );
    }

    let annotations = updated.annotations();
    assert_eq!(
        annotations.get("edp.epam.com/admin-secret").map(String::as_str),
        Some(ADMIN_SECRET)
    );
    assert_eq!(
        annotations
            .get("edp.epam.com/secret-ci.user")
            .map(String::as_str),
        Some("nexus-ci.user")
    );

    let nexus = harness.nexus.state();
    let ci_user = nexus
        .runs_of("setup-user")
        .into_iter()
        .find(|params| params["username"] == "ci.user")
        .unwrap()
        .clone();
    assert_eq!(ci_user["password"], password.as_str());
    assert_eq!(ci_user["roles"], json!(["edp-ci"]));
}

#[tokio::test]
async fn expose_reuses_stored_user_password() {
    let harness = Harness::new().installed().await;
    harness.service.configure(&harness.instance).await.unwrap();

    harness
        .service
        .expose_configuration(&harness.instance)
        .await
        .unwrap();
    harness
        .service
        .expose_configuration(&harness.instance)
        .await
        .unwrap();

    let nexus = harness.nexus.state();
    let passwords: Vec<_> = nexus
        .runs_of("setup-user")
        .into_iter()
        .filter(|params| params["username"] == "ci.user")
        .map(|params| params["password"].clone())
        .collect();
    assert_eq!(passwords.len(), 2);
    assert_eq!(passwords[0], passwords[1]);
}

#[tokio::test]
async fn expose_registers_keycloak_client_when_enabled() {
    let mut harness = Harness::new();
    enable_keycloak(&mut harness);
    let harness = harness.installed().await;
    harness.service.configure(&harness.instance).await.unwrap();

    harness
        .service
        .expose_configuration(&harness.instance)
        .await
        .unwrap();

    let state = harness.platform.state();
    let client = &state.identity_clients["nexus"];
    assert_eq!(client.spec.client_id, "nexus");
    assert!(client.spec.public);
    assert_eq!(client.spec.web_url, "http://nexus-ci.apps.example.com");
}

#[tokio::test]
async fn keycloak_registration_failure_is_tolerated() {
    let mut harness = Harness::new();
    enable_keycloak(&mut harness);
    let harness = harness.installed().await;
    harness.service.configure(&harness.instance).await.unwrap();
    harness.platform.fail_on(Some("create_identity_client"));

    let updated = harness
        .service
        .expose_configuration(&harness.instance)
        .await
        .unwrap();

    assert!(updated
        .annotations()
        .contains_key("edp.epam.com/admin-secret"));
    assert!(harness.platform.state().identity_clients.is_empty());
}

#[tokio::test]
async fn expose_propagates_instance_update_failure() {
    let harness = Harness::new().installed().await;
    harness.service.configure(&harness.instance).await.unwrap();
    harness.platform.fail_on(Some("update_instance"));

    let err = harness
        .service
        .expose_configuration(&harness.instance)
        .await
        .unwrap_err();

    assert!(matches!(&err, Error::Step { action, .. } if action == "record exposed secrets"));
}

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn integration_is_a_no_op_when_disabled() {
    let harness = Harness::new().installed().await;
    let calls_before = harness.platform.state().calls.len();

    harness.service.integration(&harness.instance).await.unwrap();

    assert_eq!(harness.platform.state().calls.len(), calls_before);
}

#[tokio::test]
async fn integration_wires_the_proxy_once() {
    let mut harness = Harness::new();
    enable_keycloak(&mut harness);
    let harness = harness.installed().await;
    seed_identity_credentials(&harness);

    harness.service.integration(&harness.instance).await.unwrap();
    harness.service.integration(&harness.instance).await.unwrap();

    let state = harness.platform.state();
    let pod = state.deployments["nexus"]
        .spec
        .as_ref()
        .unwrap()
        .template
        .spec
        .as_ref()
        .unwrap();
    let proxies: Vec<_> = pod
        .containers
        .iter()
        .filter(|c| c.name == PROXY_NAME)
        .collect();
    assert_eq!(proxies.len(), 1);
    let args = proxies[0].args.as_ref().unwrap();
    assert!(args.contains(&"--client-id=nexus-client".to_string()));
    assert!(args.contains(&"--upstream-url=http://127.0.0.1:8081".to_string()));

    let ports = state.services["nexus"]
        .spec
        .as_ref()
        .unwrap()
        .ports
        .as_ref()
        .unwrap();
    assert_eq!(
        ports
            .iter()
            .filter(|p| p.name.as_deref() == Some(PROXY_NAME) && p.port == PROXY_PORT)
            .count(),
        1
    );

    let backend_port = state.ingresses["nexus"].spec.as_ref().unwrap().rules.as_ref().unwrap()[0]
        .http
        .as_ref()
        .unwrap()
        .paths[0]
        .backend
        .service
        .as_ref()
        .unwrap()
        .port
        .as_ref()
        .unwrap()
        .number;
    assert_eq!(backend_port, Some(PROXY_PORT));

    for mutation in ["update_deployment", "update_service", "update_ingress"] {
        assert_eq!(
            state.calls.iter().filter(|c| **c == mutation).count(),
            1,
            "{mutation}"
        );
    }
}

#[tokio::test]
async fn integration_requires_identity_credentials() {
    let mut harness = Harness::new();
    enable_keycloak(&mut harness);
    let harness = harness.installed().await;

    let err = harness
        .service
        .integration(&harness.instance)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn integration_requires_discovery_url() {
    let mut harness = Harness::with(&[], |config| {
        config.identity_provider.discovery_url = String::new();
    });
    enable_keycloak(&mut harness);
    let harness = harness.installed().await;
    seed_identity_credentials(&harness);

    let err = harness
        .service
        .integration(&harness.instance)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), Error::ConfigError(_)));
}

// ---------------------------------------------------------------------------
// Full lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lifecycle_from_install_to_integration() {
    let mut harness = Harness::new();
    enable_keycloak(&mut harness);

    harness.service.install(&harness.instance).await.unwrap();
    assert!(!harness.service.is_ready(&harness.instance).await.unwrap());

    harness.platform.set_available_replicas(1);
    assert!(harness.service.is_ready(&harness.instance).await.unwrap());

    harness.nexus.state().ready = false;
    assert!(matches!(
        harness.service.configure(&harness.instance).await.unwrap(),
        ConfigureOutcome::Pending { .. }
    ));
    harness.nexus.state().ready = true;
    assert_eq!(
        harness.service.configure(&harness.instance).await.unwrap(),
        ConfigureOutcome::Done
    );

    let exposed = harness
        .service
        .expose_configuration(&harness.instance)
        .await
        .unwrap();
    seed_identity_credentials(&harness);
    harness.service.integration(&exposed).await.unwrap();

    let nexus = harness.nexus.state();
    assert_eq!(nexus.password_changes, 1);
    assert_eq!(nexus.admin_password, harness.stored_admin_password());
    assert!(nexus.objects["repositories"].contains("libs"));
    assert!(!nexus.objects["repositories"].contains("stale"));
    assert!(nexus.objects["setup-user"].contains("jane"));
    assert!(nexus.objects["setup-user"].contains("ci.user"));
    drop(nexus);

    let state = harness.platform.state();
    assert!(state.identity_clients.contains_key("nexus"));
    assert_eq!(exposed.name_any(), "nexus");
}
