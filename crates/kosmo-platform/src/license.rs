//! License activation against the license server

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde::Deserialize;
use serde_json::json;

use kosmo_common::{dynamic, Error, Result, DEFAULT_NAMESPACE};

/// Default license activation endpoint
pub const LICENSE_SERVER_URL: &str = "https://license.kosmo.io/activate";

/// Name of the Secret holding the license key
pub const LICENSE_SECRET_NAME: &str = "kosmo-license";

const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(40);

/// Stable cluster identifier derived from the cluster CA certificate
///
/// Reads `kube-root-ca.crt` from kube-system, which every cluster
/// publishes to all namespaces.
pub async fn cluster_id(client: Client) -> Result<String> {
    let resource = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"));
    let api = kube::Api::<DynamicObject>::namespaced_with(client, "kube-system", &resource);

    let config_map = dynamic::get(&api, "kube-root-ca.crt")
        .await?
        .ok_or_else(|| Error::internal_with_context("license", "kube-root-ca.crt not found"))?;
    let ca = config_map.data["data"]["ca.crt"]
        .as_str()
        .ok_or_else(|| Error::internal_with_context("license", "cluster CA has no ca.crt"))?;

    Ok(hash_cert(ca))
}

/// Hash a CA certificate into the wire format of the cluster id
pub fn hash_cert(ca_pem: &str) -> String {
    let digest = blake3::hash(ca_pem.as_bytes());
    URL_SAFE.encode(digest.as_bytes())
}

#[derive(Debug, Deserialize)]
struct ActivationResponse {
    status: u16,
    #[serde(default)]
    data: String,
}

/// Exchange an order number and cluster id for a license key
pub async fn activate(server_url: &str, order_number: &str, cluster_id: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|err| Error::fetch(server_url, err.to_string()))?;

    let response: ActivationResponse = client
        .post(server_url)
        .json(&json!({
            "orderNumber": order_number,
            "clusterId": cluster_id,
        }))
        .send()
        .await
        .map_err(|err| Error::fetch(server_url, err.to_string()))?
        .json()
        .await
        .map_err(|err| Error::fetch(server_url, err.to_string()))?;

    if response.status != 201 {
        return Err(Error::fetch(server_url, response.data));
    }
    Ok(response.data)
}

/// Store the license key as an Opaque Secret in the platform namespace
pub async fn store_key(client: Client, key: &str) -> Result<()> {
    let resource = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Secret"));
    let api =
        kube::Api::<DynamicObject>::namespaced_with(client, DEFAULT_NAMESPACE, &resource);

    let mut secret = DynamicObject::new(LICENSE_SECRET_NAME, &resource).within(DEFAULT_NAMESPACE);
    secret.data = json!({
        "type": "Opaque",
        "stringData": { "payload": key },
    });
    dynamic::create(&api, secret).await
}
