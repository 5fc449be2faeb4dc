use k8s_openapi::api::core::v1::{EndpointSubset, Endpoints, Service, ServicePort};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::{Columnar, Columns};
use crate::format::{human_age, join_or_missing, missing};
use crate::model::{ResourceKind, Row};

pub static SERVICE_COLUMNS: Columns = Columns {
    kind: ResourceKind::Services,
    names: &["NAME", "TYPE", "CLUSTER-IP", "EXTERNAL-IP", "PORTS", "AGE"],
    volatile: Some("AGE"),
};

pub static ENDPOINTS_COLUMNS: Columns = Columns {
    kind: ResourceKind::Endpoints,
    names: &["NAME", "ENDPOINTS", "AGE"],
    volatile: Some("AGE"),
};

pub static INGRESS_COLUMNS: Columns = Columns {
    kind: ResourceKind::Ingresses,
    names: &["NAME", "HOSTS", "ADDRESS", "PORT", "AGE"],
    volatile: Some("AGE"),
};

#[derive(Debug, Clone)]
pub struct ServiceRow(Service);

impl From<Service> for ServiceRow {
    fn from(service: Service) -> Self {
        Self(service)
    }
}

impl Columnar for ServiceRow {
    fn columns(&self) -> &'static Columns {
        &SERVICE_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let spec = self.0.spec.as_ref();
        let ports = spec
            .and_then(|spec| spec.ports.as_deref())
            .unwrap_or(&[])
            .iter()
            .map(port_to_str);

        vec![
            self.object_name().to_string(),
            spec.and_then(|spec| spec.type_.as_deref())
                .unwrap_or("ClusterIP")
                .to_string(),
            missing(spec.and_then(|spec| spec.cluster_ip.as_deref())),
            self.external_ips(),
            join_or_missing(ports),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

impl ServiceRow {
    fn external_ips(&self) -> String {
        let explicit = self
            .0
            .spec
            .as_ref()
            .and_then(|spec| spec.external_ips.clone())
            .unwrap_or_default();
        let balanced = self
            .0
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|balancer| balancer.ingress.as_deref())
            .unwrap_or(&[])
            .iter()
            .filter_map(|ingress| ingress.ip.clone().or_else(|| ingress.hostname.clone()));

        join_or_missing(explicit.into_iter().chain(balanced))
    }
}

fn port_to_str(port: &ServicePort) -> String {
    let protocol = port.protocol.as_deref().unwrap_or("TCP");
    match port.node_port {
        Some(node_port) => format!("{}:{node_port}/{protocol}", port.port),
        None => format!("{}/{protocol}", port.port),
    }
}

#[derive(Debug, Clone)]
pub struct EndpointsRow(Endpoints);

impl From<Endpoints> for EndpointsRow {
    fn from(endpoints: Endpoints) -> Self {
        Self(endpoints)
    }
}

impl Columnar for EndpointsRow {
    fn columns(&self) -> &'static Columns {
        &ENDPOINTS_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let targets = self
            .0
            .subsets
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .flat_map(subset_targets);

        vec![
            self.object_name().to_string(),
            join_or_missing(targets),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

// Every ready address paired with every port; a portless subset lists bare addresses.
fn subset_targets(subset: &EndpointSubset) -> Vec<String> {
    let addresses = subset.addresses.as_deref().unwrap_or(&[]);
    let ports = subset.ports.as_deref().unwrap_or(&[]);
    addresses
        .iter()
        .flat_map(|address| {
            if ports.is_empty() {
                vec![address.ip.clone()]
            } else {
                ports
                    .iter()
                    .map(|port| format!("{}:{}", address.ip, port.port))
                    .collect()
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct IngressRow(Ingress);

impl From<Ingress> for IngressRow {
    fn from(ingress: Ingress) -> Self {
        Self(ingress)
    }
}

impl Columnar for IngressRow {
    fn columns(&self) -> &'static Columns {
        &INGRESS_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let spec = self.0.spec.as_ref();
        let hosts = spec
            .and_then(|spec| spec.rules.as_deref())
            .unwrap_or(&[])
            .iter()
            .filter_map(|rule| rule.host.as_deref());
        let addresses = self
            .0
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|balancer| balancer.ingress.as_deref())
            .unwrap_or(&[])
            .iter()
            .filter_map(|ingress| ingress.ip.as_deref().or(ingress.hostname.as_deref()));
        let tls = spec
            .and_then(|spec| spec.tls.as_ref())
            .is_some_and(|tls| !tls.is_empty());

        vec![
            self.object_name().to_string(),
            join_or_missing(hosts),
            join_or_missing(addresses),
            if tls { "80, 443" } else { "80" }.to_string(),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{EndpointsRow, IngressRow, ServiceRow};
    use crate::fixtures;
    use crate::format::MISSING;
    use crate::model::NamespaceScope;
    use crate::resource::Columnar;
    use k8s_openapi::api::networking::v1::IngressTLS;

    fn named() -> NamespaceScope {
        NamespaceScope::Named("blee".to_string())
    }

    #[test]
    fn service_renders_ports_with_node_port() {
        let row = ServiceRow::from(fixtures::k8s_service());
        assert_eq!(
            &row.fields(&named())[..5],
            &["fred", "NodePort", "10.96.0.10", MISSING, "80:30080/TCP,53/UDP"]
        );
    }

    #[test]
    fn service_lists_load_balancer_addresses() {
        let mut service = fixtures::k8s_service();
        service.status = serde_json::from_value(serde_json::json!({
            "loadBalancer": { "ingress": [{ "ip": "34.1.2.3" }, { "hostname": "lb.example" }] }
        }))
        .unwrap();
        let fields = ServiceRow::from(service).fields(&named());
        assert_eq!(fields[3], "34.1.2.3,lb.example");
    }

    #[test]
    fn endpoints_pair_addresses_with_ports() {
        let row = EndpointsRow::from(fixtures::k8s_endpoints());
        assert_eq!(row.header(&named()), vec!["NAME", "ENDPOINTS", "AGE"]);
        assert_eq!(&row.fields(&named())[..2], &["fred", "1.1.1.1:80"]);

        let mut endpoints = fixtures::k8s_endpoints();
        endpoints.subsets = serde_json::from_value(serde_json::json!([
            {
                "addresses": [{ "ip": "1.1.1.1" }, { "ip": "2.2.2.2" }],
                "ports": [{ "port": 80 }, { "port": 443 }]
            },
            { "addresses": [{ "ip": "3.3.3.3" }] }
        ]))
        .unwrap();
        assert_eq!(
            EndpointsRow::from(endpoints).fields(&named())[1],
            "1.1.1.1:80,1.1.1.1:443,2.2.2.2:80,2.2.2.2:443,3.3.3.3"
        );
    }

    #[test]
    fn endpoints_without_subsets_render_none() {
        let mut endpoints = fixtures::k8s_endpoints();
        endpoints.subsets = None;
        assert_eq!(EndpointsRow::from(endpoints).fields(&named())[1], MISSING);
    }

    #[test]
    fn ingress_reports_hosts_and_tls_ports() {
        let row = IngressRow::from(fixtures::k8s_ingress());
        assert_eq!(
            &row.fields(&named())[..4],
            &["fred", "a.example,b.example", "1.2.3.4", "80"]
        );

        let mut ingress = fixtures::k8s_ingress();
        if let Some(spec) = ingress.spec.as_mut() {
            spec.tls = Some(vec![IngressTLS::default()]);
        }
        assert_eq!(IngressRow::from(ingress).fields(&named())[3], "80, 443");
    }
}
