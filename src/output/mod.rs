pub mod console;
pub mod json;
pub mod xml;

use serde::{Deserialize, Serialize};

use crate::catalog::ServiceCatalogEntry;
use crate::cert::CertPair;
use crate::error::Result;

/// Output format selection for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Console,
    Json,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" | "table" => Some(Self::Console),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Render discovered certificate pairs.
pub fn render_cert_pairs(pairs: &[CertPair], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render_cert_pairs(pairs)),
        OutputFormat::Json => json::render(&pairs),
    }
}

/// Render the service catalog.
pub fn render_services(services: &[ServiceCatalogEntry], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render_services(services)),
        OutputFormat::Json => json::render(&services),
    }
}
