use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::ClusterRole;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::{Columnar, Columns};
use crate::format::{human_age, missing};
use crate::model::{ResourceKind, Row};

pub static CONFIGMAP_COLUMNS: Columns = Columns {
    kind: ResourceKind::ConfigMaps,
    names: &["NAME", "DATA", "AGE"],
    volatile: Some("AGE"),
};

pub static SECRET_COLUMNS: Columns = Columns {
    kind: ResourceKind::Secrets,
    names: &["NAME", "TYPE", "DATA", "AGE"],
    volatile: Some("AGE"),
};

pub static SERVICE_ACCOUNT_COLUMNS: Columns = Columns {
    kind: ResourceKind::ServiceAccounts,
    names: &["NAME", "SECRET", "AGE"],
    volatile: Some("AGE"),
};

pub static NAMESPACE_COLUMNS: Columns = Columns {
    kind: ResourceKind::Namespaces,
    names: &["NAME", "STATUS", "AGE"],
    volatile: Some("AGE"),
};

pub static CLUSTER_ROLE_COLUMNS: Columns = Columns {
    kind: ResourceKind::ClusterRoles,
    names: &["NAME", "AGE"],
    volatile: Some("AGE"),
};

#[derive(Debug, Clone)]
pub struct ConfigMapRow(ConfigMap);

impl From<ConfigMap> for ConfigMapRow {
    fn from(map: ConfigMap) -> Self {
        Self(map)
    }
}

impl Columnar for ConfigMapRow {
    fn columns(&self) -> &'static Columns {
        &CONFIGMAP_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let entries = self.0.data.as_ref().map_or(0, |data| data.len())
            + self.0.binary_data.as_ref().map_or(0, |data| data.len());

        vec![
            self.object_name().to_string(),
            entries.to_string(),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct SecretRow(Secret);

impl From<Secret> for SecretRow {
    fn from(secret: Secret) -> Self {
        Self(secret)
    }
}

impl Columnar for SecretRow {
    fn columns(&self) -> &'static Columns {
        &SECRET_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    // Only entry counts leave this adapter; values are never rendered.
    fn cells(&self) -> Row {
        let entries = self.0.data.as_ref().map_or(0, |data| data.len())
            + self.0.string_data.as_ref().map_or(0, |data| data.len());

        vec![
            self.object_name().to_string(),
            self.0.type_.as_deref().unwrap_or("Opaque").to_string(),
            entries.to_string(),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ServiceAccountRow(ServiceAccount);

impl From<ServiceAccount> for ServiceAccountRow {
    fn from(account: ServiceAccount) -> Self {
        Self(account)
    }
}

impl Columnar for ServiceAccountRow {
    fn columns(&self) -> &'static Columns {
        &SERVICE_ACCOUNT_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        vec![
            self.object_name().to_string(),
            self.0.secrets.as_ref().map_or(0, Vec::len).to_string(),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct NamespaceRow(Namespace);

impl From<Namespace> for NamespaceRow {
    fn from(namespace: Namespace) -> Self {
        Self(namespace)
    }
}

impl Columnar for NamespaceRow {
    fn columns(&self) -> &'static Columns {
        &NAMESPACE_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        vec![
            self.object_name().to_string(),
            missing(
                self.0
                    .status
                    .as_ref()
                    .and_then(|status| status.phase.as_deref()),
            ),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ClusterRoleRow(ClusterRole);

impl From<ClusterRole> for ClusterRoleRow {
    fn from(role: ClusterRole) -> Self {
        Self(role)
    }
}

impl Columnar for ClusterRoleRow {
    fn columns(&self) -> &'static Columns {
        &CLUSTER_ROLE_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        vec![
            self.object_name().to_string(),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{ClusterRoleRow, ConfigMapRow, NamespaceRow, SecretRow, ServiceAccountRow};
    use crate::fixtures;
    use crate::model::NamespaceScope;
    use crate::resource::Columnar;

    fn named() -> NamespaceScope {
        NamespaceScope::Named("blee".to_string())
    }

    #[test]
    fn configmap_counts_entries() {
        let row = ConfigMapRow::from(fixtures::k8s_configmap());
        assert_eq!(&row.fields(&named())[..2], &["fred", "2"]);
    }

    #[test]
    fn secret_never_renders_values() {
        let row = SecretRow::from(fixtures::k8s_secret());
        let fields = row.fields(&named());
        assert_eq!(&fields[..3], &["fred", "Opaque", "1"]);
        assert!(fields.iter().all(|field| !field.contains("hunter2")));
    }

    #[test]
    fn service_account_counts_secrets() {
        let row = ServiceAccountRow::from(fixtures::k8s_service_account());
        assert_eq!(&row.fields(&NamespaceScope::All)[..3], &["blee", "fred", "1"]);
    }

    #[test]
    fn cluster_scoped_kinds_ignore_stray_namespace() {
        let mut namespace = fixtures::k8s_namespace();
        namespace.metadata.namespace = Some("blee".to_string());
        let row = NamespaceRow::from(namespace);
        assert_eq!(row.name(), "blee");
        assert_eq!(&row.fields(&NamespaceScope::All)[..2], &["blee", "Active"]);

        let role = ClusterRoleRow::from(fixtures::k8s_cluster_role());
        assert_eq!(role.name(), "view");
        assert_eq!(role.header(&NamespaceScope::All), vec!["NAME", "AGE"]);
    }
}
