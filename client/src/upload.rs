//! Asset upload side-channel.
//!
//! The relay's contract couples upload success with visibility: when the
//! POST returns, the bytes are stored and the `addImage` broadcast (with
//! our correlation, resolving the staged placeholder) has already been
//! fanned out. There is no protocol-level "uploading" state.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use events::Node;

use crate::store::ImagePlacement;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay rejected upload: {0}")]
    Rejected(StatusCode),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadQuery {
    team_id: Uuid,
    project_id: Uuid,
    user_id: Uuid,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    file_name: String,
    correlation: Uuid,
}

/// The fetchable reference returned by the relay.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReply {
    pub node: Node,
    pub project_id: Uuid,
    pub team_id: Uuid,
}

/// Upload image bytes for a placeholder staged with
/// [`crate::store::ObjectStore::stage_image`].
///
/// # Errors
///
/// Network failure or a non-success status from the relay. The staged
/// placeholder stays pending in either case and is abandoned with the next
/// project switch.
#[allow(clippy::too_many_arguments)]
pub async fn upload_image(
    client: &reqwest::Client,
    base_url: &str,
    team_id: Uuid,
    project_id: Uuid,
    user_id: Uuid,
    placement: ImagePlacement,
    file_name: &str,
    mime_type: &str,
    bytes: Vec<u8>,
) -> Result<UploadReply, UploadError> {
    let query = UploadQuery {
        team_id,
        project_id,
        user_id,
        x: placement.x,
        y: placement.y,
        width: placement.width,
        height: placement.height,
        file_name: file_name.to_owned(),
        correlation: placement.correlation,
    };

    let response = client
        .post(format!("{base_url}/api/assets"))
        .query(&query)
        .header(reqwest::header::CONTENT_TYPE, mime_type)
        .body(bytes)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(UploadError::Rejected(response.status()));
    }
    Ok(response.json().await?)
}

/// URL the rendering layer fetches image bytes from.
#[must_use]
pub fn asset_url(base_url: &str, node: Node) -> String {
    format!("{base_url}/api/assets/{node}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_url_embeds_the_node() {
        let node = Uuid::new_v4();
        let url = asset_url("http://localhost:4000", node);
        assert_eq!(url, format!("http://localhost:4000/api/assets/{node}"));
    }
}
