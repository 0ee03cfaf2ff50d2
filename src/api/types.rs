use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct TruthDto {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SqlQuery {
    #[serde(default)]
    pub q: Option<String>,
}
