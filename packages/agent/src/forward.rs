use common::tunnel::TunnelSignal;
use serde::Serialize;

/// Forwards tunnel signals to the configured local endpoint.
pub struct Forwarder {
    client: reqwest::Client,
    forward_url: String,
    local_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ForwardPayload<'a> {
    delivery_id: &'a str,
    channel_id: &'a str,
    channel_slug: &'a str,
    signal: &'a TunnelSignal,
}

impl Forwarder {
    pub fn new(forward_url: String, local_token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            forward_url,
            local_token,
        })
    }

    /// POST the signal to the local endpoint. Success iff it answers 2xx.
    pub async fn deliver_signal(
        &self,
        delivery_id: &str,
        channel_id: &str,
        channel_slug: &str,
        signal: &TunnelSignal,
    ) -> anyhow::Result<()> {
        let payload = ForwardPayload {
            delivery_id,
            channel_id,
            channel_slug,
            signal,
        };

        let mut request = self
            .client
            .post(&self.forward_url)
            .header("Content-Type", "application/json")
            .header("X-Herald-Delivery-Id", delivery_id);

        if let Some(token) = self.local_token.as_deref() {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.json(&payload).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("local forward failed: HTTP {}", response.status()))
        }
    }
}
