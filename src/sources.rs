use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::signals::CollectedInputs;

async fn read_text(path: Option<&Path>, what: &str) -> Option<String> {
    let path = path?;
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.trim().is_empty() => {
            warn!(what, path = %path.display(), "collaborator output is empty");
            None
        }
        Ok(text) => Some(text),
        Err(err) => {
            warn!(what, path = %path.display(), error = %err, "collaborator output unavailable");
            None
        }
    }
}

async fn read_document(path: Option<&Path>) -> Option<Map<String, Value>> {
    let raw = read_text(path, "inputs").await?;
    match serde_json::from_str::<Map<String, Value>>(&raw) {
        Ok(document) => Some(document),
        Err(err) => {
            warn!(error = %err, "inputs document is not a JSON object");
            None
        }
    }
}

/// Read every collaborator output the run needs. Missing files degrade to
/// `None` for that collaborator; this never fails.
pub async fn collect(inputs: Option<&Path>, bulletin: Option<&Path>) -> CollectedInputs {
    let (document, bulletin) = tokio::join!(read_document(inputs), read_text(bulletin, "bulletin"));

    let mut collected = document
        .map(CollectedInputs::from_document)
        .unwrap_or_default();
    collected.bulletin = bulletin;

    info!(
        payloads = collected.payloads.len(),
        bulletin = collected.bulletin.is_some(),
        air_headlines = collected.air_headlines.as_ref().map_or(0, Vec::len),
        deployment_headlines = collected.deployment_headlines.as_ref().map_or(0, Vec::len),
        "collected inputs"
    );
    collected
}
