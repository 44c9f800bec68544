//! Workload identity lookup via the Kubernetes Pods API
//!
//! The issuance handler never talks to the cluster directly; it resolves
//! workloads through the [`WorkloadLookup`] trait so tests can substitute a
//! mock and the production path uses [`KubeWorkloadLookup`] over kube-rs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Workload lookup errors
#[derive(Debug, Error)]
pub enum LookupError {
    /// No pod exists with the requested namespace/name
    #[error("workload not found")]
    NotFound,

    /// The Kubernetes API call failed
    #[error("kubernetes error: {0}")]
    Api(#[from] kube::Error),
}

/// A network endpoint declared by one of a workload's init containers
///
/// Used purely as a delivery address for the wrapped credential, not as a
/// capability signal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InitEndpoint {
    /// Init container name
    pub name: String,
    /// Declared container ports, in declaration order
    pub ports: Vec<u16>,
}

/// Resolved identity of a running workload
///
/// A read-only snapshot of the pod fields the issuance path needs; the
/// handler borrows one record for the duration of a single request.
#[derive(Clone, Debug, Default)]
pub struct WorkloadRecord {
    /// Pod name
    pub name: String,
    /// Pod namespace
    pub namespace: String,
    /// IP of the node hosting the pod (empty if not yet assigned)
    pub host_ip: String,
    /// Pod IP (empty if not yet assigned)
    pub pod_ip: String,
    /// Pod UID
    pub uid: String,
    /// Pod annotations
    pub annotations: BTreeMap<String, String>,
    /// Init container endpoints, in declaration order
    pub init_endpoints: Vec<InitEndpoint>,
}

impl WorkloadRecord {
    /// Build a record from a Pod object
    ///
    /// Unpopulated status fields (a pod that has not been scheduled yet)
    /// become empty strings rather than errors; the handler decides what is
    /// required.
    pub fn from_pod(pod: &Pod) -> Self {
        let status = pod.status.as_ref();

        let init_endpoints = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.init_containers.as_ref())
            .map(|containers| {
                containers
                    .iter()
                    .map(|container| InitEndpoint {
                        name: container.name.clone(),
                        ports: container
                            .ports
                            .iter()
                            .flatten()
                            .map(|p| p.container_port as u16)
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            host_ip: status.and_then(|s| s.host_ip.clone()).unwrap_or_default(),
            pod_ip: status.and_then(|s| s.pod_ip.clone()).unwrap_or_default(),
            uid: pod.metadata.uid.clone().unwrap_or_default(),
            annotations: pod.metadata.annotations.clone().unwrap_or_default(),
            init_endpoints,
        }
    }
}

/// Trait abstracting workload identity resolution
///
/// This trait allows mocking the cluster metadata service in tests while
/// the production handler uses the real Pods API. Implementations must be
/// safe for concurrent use by multiple in-flight requests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkloadLookup: Send + Sync {
    /// Resolve a workload by namespace and name
    async fn get(&self, namespace: &str, name: &str) -> Result<WorkloadRecord, LookupError>;
}

/// Workload lookup backed by the Kubernetes Pods API
pub struct KubeWorkloadLookup {
    client: Client,
}

impl KubeWorkloadLookup {
    /// Create a lookup over an existing Kubernetes client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkloadLookup for KubeWorkloadLookup {
    async fn get(&self, namespace: &str, name: &str) -> Result<WorkloadRecord, LookupError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        match pods.get(name).await {
            Ok(pod) => Ok(WorkloadRecord::from_pod(&pod)),
            Err(kube::Error::Api(e)) if e.code == 404 => Err(LookupError::NotFound),
            Err(e) => Err(LookupError::Api(e)),
        }
    }
}
