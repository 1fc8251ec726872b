//! Path service surface: catalog path to resource resolution.

use serde::Deserialize;
use urlencoding::encode;

use crate::error::Result;
use crate::http::Transport;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DecoratedResource {
    pub rid: String,
}

/// Resolve a catalog path to a resource, or `None` when nothing lives there.
pub(crate) async fn get_resource_by_path(
    t: &Transport,
    path: &str,
) -> Result<Option<DecoratedResource>> {
    let request_path = format!("/compass/resources?path={}", encode(path));
    t.get_json_opt(&request_path).await
}
