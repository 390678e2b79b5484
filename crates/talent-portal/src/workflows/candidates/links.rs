/// Builds candidate-facing URLs around raw tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn application(&self, token: &str) -> String {
        format!("{}/apply/{}", self.base_url, token)
    }

    pub fn checkin(&self, token: &str) -> String {
        format!("{}/checkin/{}", self.base_url, token)
    }
}
