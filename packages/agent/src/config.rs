#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub token: String,
    pub forward_url: String,
    pub herald_url: String,
    pub local_token: Option<String>,
}
