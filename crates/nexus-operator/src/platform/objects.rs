//! Builders for the cluster objects owned by a Nexus instance and the
//! in-place mutations applied by the integration step.
//!
//! Every built object lives in the instance's namespace, is labelled
//! `app=<instance>` and carries a controller owner reference to the instance.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ContainerPort, EnvVar, EnvVarSource, HTTPGetAction,
    LocalObjectReference, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Probe, Secret,
    SecretKeySelector, Service, ServiceAccount, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use kube::{Resource, ResourceExt};

use crate::config::IdentityProviderConfig;
use crate::crds::{
    JenkinsServiceAccount, JenkinsServiceAccountSpec, KeycloakClient, KeycloakClientSpec, Nexus,
};
use crate::error::{Error, InstanceKey, Result};

pub const NEXUS_PORT: i32 = 8081;
pub const NEXUS_PORT_NAME: &str = "nexus-http";
pub const NEXUS_CONTAINER: &str = "nexus";
pub const REST_API_PATH: &str = "/service/rest";
pub const DEFAULT_MOUNT_PATH: &str = "/nexus-data";

pub const PROXY_NAME: &str = "keycloak-proxy";
pub const PROXY_PORT: i32 = 3000;
pub const PROXY_UPSTREAM: &str = "http://127.0.0.1:8081";

pub fn admin_secret_name(instance: &str) -> String {
    format!("{instance}-admin-password")
}

pub fn user_secret_name(instance: &str, username: &str) -> String {
    format!("{instance}-{username}")
}

pub fn identity_secret_name(instance: &str) -> String {
    format!("{instance}-is-credentials")
}

pub fn labels(instance: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), instance.to_string())])
}

pub fn owner_reference(instance: &Nexus) -> Result<OwnerReference> {
    instance
        .controller_owner_ref(&())
        .ok_or(Error::MissingObjectKey("metadata.uid"))
}

/// Metadata for an object named `name` owned by `instance`.
pub fn owned_meta(instance: &Nexus, name: &str) -> Result<ObjectMeta> {
    let key = InstanceKey::of(instance)?;
    Ok(ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(key.namespace),
        labels: Some(labels(&key.name)),
        owner_references: Some(vec![owner_reference(instance)?]),
        ..Default::default()
    })
}

pub fn secret(instance: &Nexus, name: &str, data: BTreeMap<String, String>) -> Result<Secret> {
    Ok(Secret {
        metadata: owned_meta(instance, name)?,
        data: Some(
            data.into_iter()
                .map(|(k, v)| (k, ByteString(v.into_bytes())))
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}

/// Decoded view of a secret's `data` and `stringData`.
pub fn secret_string_data(secret: &Secret) -> BTreeMap<String, String> {
    let mut decoded: BTreeMap<String, String> = secret
        .data
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), String::from_utf8_lossy(&v.0).into_owned()))
        .collect();
    if let Some(string_data) = &secret.string_data {
        decoded.extend(string_data.clone());
    }
    decoded
}

/// Replace a secret's payload, dropping any `stringData`.
pub fn set_secret_string_data(secret: &mut Secret, data: BTreeMap<String, String>) {
    secret.string_data = None;
    secret.data = Some(
        data.into_iter()
            .map(|(k, v)| (k, ByteString(v.into_bytes())))
            .collect(),
    );
}

pub fn volume_claims(instance: &Nexus) -> Result<Vec<PersistentVolumeClaim>> {
    let name = instance.name_any();
    instance
        .spec
        .volumes
        .iter()
        .map(|volume| {
            Ok(PersistentVolumeClaim {
                metadata: owned_meta(instance, &format!("{name}-{}", volume.name))?,
                spec: Some(PersistentVolumeClaimSpec {
                    access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                    storage_class_name: Some(volume.storage_class.clone()),
                    resources: Some(VolumeResourceRequirements {
                        requests: Some(BTreeMap::from([(
                            "storage".to_string(),
                            Quantity(volume.capacity.clone()),
                        )])),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })
        })
        .collect()
}

pub fn service_account(instance: &Nexus) -> Result<ServiceAccount> {
    Ok(ServiceAccount {
        metadata: owned_meta(instance, &instance.name_any())?,
        ..Default::default()
    })
}

pub fn service(instance: &Nexus) -> Result<Service> {
    let name = instance.name_any();
    Ok(Service {
        metadata: owned_meta(instance, &name)?,
        spec: Some(ServiceSpec {
            selector: Some(labels(&name)),
            ports: Some(vec![ServicePort {
                name: Some(NEXUS_PORT_NAME.to_string()),
                port: NEXUS_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(NEXUS_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Bundle `<instance>-<suffix>` with the given entries.
pub fn config_map(
    instance: &Nexus,
    suffix: &str,
    data: BTreeMap<String, String>,
) -> Result<ConfigMap> {
    Ok(ConfigMap {
        metadata: owned_meta(instance, &format!("{}-{suffix}", instance.name_any()))?,
        data: Some(data),
        ..Default::default()
    })
}

pub fn deployment(instance: &Nexus) -> Result<Deployment> {
    let name = instance.name_any();
    let context_path = instance.spec.context_path();

    let volumes: Vec<Volume> = instance
        .spec
        .volumes
        .iter()
        .map(|volume| Volume {
            name: volume.name.clone(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: format!("{name}-{}", volume.name),
                read_only: None,
            }),
            ..Default::default()
        })
        .collect();

    let volume_mounts: Vec<VolumeMount> = instance
        .spec
        .volumes
        .iter()
        .map(|volume| VolumeMount {
            name: volume.name.clone(),
            mount_path: volume
                .mount_path
                .clone()
                .unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_string()),
            ..Default::default()
        })
        .collect();

    let container = Container {
        name: NEXUS_CONTAINER.to_string(),
        image: Some(format!("{}:{}", instance.spec.image, instance.spec.version)),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![ContainerPort {
            name: Some(NEXUS_PORT_NAME.to_string()),
            container_port: NEXUS_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(vec![EnvVar {
            name: "NEXUS_CONTEXT".to_string(),
            value: Some(context_path.trim_start_matches('/').to_string()),
            ..Default::default()
        }]),
        readiness_probe: Some(Probe {
            http_get: Some(HTTPGetAction {
                path: Some(format!("{context_path}{REST_API_PATH}/v1/status")),
                port: IntOrString::Int(NEXUS_PORT),
                ..Default::default()
            }),
            initial_delay_seconds: Some(60),
            period_seconds: Some(10),
            timeout_seconds: Some(5),
            ..Default::default()
        }),
        volume_mounts: Some(volume_mounts),
        ..Default::default()
    };

    let image_pull_secrets: Vec<LocalObjectReference> = instance
        .spec
        .image_pull_secrets
        .iter()
        .map(|secret| LocalObjectReference {
            name: secret.clone().into(),
        })
        .collect();

    Ok(Deployment {
        metadata: owned_meta(instance, &name)?,
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels(&name)),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(&name)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(name.clone()),
                    image_pull_secrets: Some(image_pull_secrets),
                    containers: vec![container],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn ingress_host(instance: &Nexus) -> Result<String> {
    let key = InstanceKey::of(instance)?;
    Ok(format!(
        "{}-{}.{}",
        key.name, key.namespace, instance.spec.edp_spec.dns_wildcard
    ))
}

pub fn ingress(instance: &Nexus) -> Result<Ingress> {
    let name = instance.name_any();
    let context_path = instance.spec.context_path();
    let path = if context_path.is_empty() {
        "/".to_string()
    } else {
        context_path
    };

    Ok(Ingress {
        metadata: owned_meta(instance, &name)?,
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(ingress_host(instance)?),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(path),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: name.clone(),
                                port: Some(ServiceBackendPort {
                                    number: Some(NEXUS_PORT),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Public base URL of an ingress (`https` iff it declares TLS), without trailing slash.
pub fn ingress_url(ingress: &Ingress) -> Option<String> {
    let spec = ingress.spec.as_ref()?;
    let host = spec
        .rules
        .iter()
        .flatten()
        .find_map(|rule| rule.host.clone())?;
    let scheme = if spec.tls.as_ref().is_some_and(|tls| !tls.is_empty()) {
        "https"
    } else {
        "http"
    };
    Some(format!("{scheme}://{host}"))
}

pub fn ci_service_account(instance: &Nexus, secret_name: &str) -> Result<JenkinsServiceAccount> {
    let mut account = JenkinsServiceAccount::new(
        secret_name,
        JenkinsServiceAccountSpec {
            account_type: "password".to_string(),
            credentials: secret_name.to_string(),
        },
    );
    account.metadata = owned_meta(instance, secret_name)?;
    Ok(account)
}

pub fn identity_client(instance: &Nexus, web_url: &str) -> Result<KeycloakClient> {
    let name = instance.name_any();
    let mut client = KeycloakClient::new(
        &name,
        KeycloakClientSpec {
            client_id: name.clone(),
            public: true,
            web_url: web_url.to_string(),
        },
    );
    client.metadata = owned_meta(instance, &name)?;
    Ok(client)
}

/// Sidecar authenticating requests against Keycloak before forwarding them to Nexus.
pub fn identity_proxy_container(
    config: &IdentityProviderConfig,
    client_id: &str,
    credentials_secret: &str,
) -> Container {
    Container {
        name: PROXY_NAME.to_string(),
        image: Some(config.proxy_image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec![
            format!("--discovery-url={}", config.discovery_url),
            format!("--client-id={client_id}"),
            "--client-secret=$(CLIENT_SECRET)".to_string(),
            format!("--listen=0.0.0.0:{PROXY_PORT}"),
            format!("--upstream-url={PROXY_UPSTREAM}"),
            "--skip-openid-provider-tls-verify=true".to_string(),
            "--enable-refresh-tokens=true".to_string(),
        ]),
        env: Some(vec![EnvVar {
            name: "CLIENT_SECRET".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: credentials_secret.to_string().into(),
                    key: "clientSecret".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ports: Some(vec![ContainerPort {
            name: Some(PROXY_NAME.to_string()),
            container_port: PROXY_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

pub fn proxy_service_port() -> ServicePort {
    ServicePort {
        name: Some(PROXY_NAME.to_string()),
        port: PROXY_PORT,
        protocol: Some("TCP".to_string()),
        target_port: Some(IntOrString::Int(PROXY_PORT)),
        ..Default::default()
    }
}

/// Add `port` unless a port with the same name, number and protocol exists.
/// Returns whether the service changed.
pub fn add_port(service: &mut Service, port: ServicePort) -> bool {
    let ports = service
        .spec
        .get_or_insert_with(Default::default)
        .ports
        .get_or_insert_with(Vec::new);

    let present = ports.iter().any(|existing| {
        existing.name == port.name
            && existing.port == port.port
            && existing.protocol.as_deref().unwrap_or("TCP")
                == port.protocol.as_deref().unwrap_or("TCP")
    });
    if present {
        return false;
    }

    ports.push(port);
    true
}

/// Compares only the fields this operator sets; the API server fills in the rest.
fn same_sidecar(existing: &Container, desired: &Container) -> bool {
    existing.image == desired.image
        && existing.args == desired.args
        && existing.env == desired.env
        && existing.ports == desired.ports
}

/// Put `container` into the pod template, replacing a container of the same
/// name. Returns whether the deployment changed.
pub fn inject_identity_proxy(deployment: &mut Deployment, container: Container) -> bool {
    let containers = &mut deployment
        .spec
        .get_or_insert_with(Default::default)
        .template
        .spec
        .get_or_insert_with(Default::default)
        .containers;

    match containers.iter_mut().find(|c| c.name == container.name) {
        Some(existing) if same_sidecar(existing, &container) => false,
        Some(existing) => {
            *existing = container;
            true
        }
        None => {
            containers.push(container);
            true
        }
    }
}

/// Point every backend of the ingress at `port`. Returns whether it changed.
pub fn retarget_ingress(ingress: &mut Ingress, port: i32) -> bool {
    let target = ServiceBackendPort {
        number: Some(port),
        ..Default::default()
    };
    let mut changed = false;

    let paths = ingress
        .spec
        .iter_mut()
        .flat_map(|spec| spec.rules.iter_mut().flatten())
        .flat_map(|rule| rule.http.iter_mut())
        .flat_map(|http| http.paths.iter_mut());

    for path in paths {
        if let Some(service) = path.backend.service.as_mut() {
            if service.port.as_ref() != Some(&target) {
                service.port = Some(target.clone());
                changed = true;
            }
        }
    }
    changed
}
