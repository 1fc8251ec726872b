//! Schema service surface: versioned dataset schemas.

use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::error::Result;
use crate::http::Transport;
use crate::rpc::catalog::Attribution;

/// A dataset schema as stored by the schema service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSchema {
    pub field_schema_list: Vec<WireFieldSchema>,
    pub data_frame_reader_class: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub custom_metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFieldSchema {
    #[serde(rename = "type")]
    pub field_type: WireFieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub custom_metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_subtype: Option<Box<WireFieldSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_key_type: Option<Box<WireFieldSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_value_type: Option<Box<WireFieldSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_schemas: Option<Vec<WireFieldSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireFieldType {
    Array,
    Binary,
    Boolean,
    Byte,
    Date,
    Decimal,
    Double,
    Float,
    Integer,
    Long,
    Map,
    Short,
    String,
    Struct,
    Timestamp,
}

/// A schema pinned to the branch/transaction it was read at.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedWireSchema {
    pub branch_id: String,
    #[serde(default)]
    pub transaction_rid: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    pub schema: WireSchema,
    #[serde(default)]
    pub attribution: Option<Attribution>,
}

pub(crate) async fn put_schema(
    t: &Transport,
    dataset_rid: &str,
    branch_id: &str,
    end_transaction_rid: Option<&str>,
    schema: &WireSchema,
) -> Result<()> {
    let mut path = format!(
        "/schemas/datasets/{}/branches/{}",
        encode(dataset_rid),
        encode(branch_id)
    );
    if let Some(end) = end_transaction_rid {
        path.push_str(&format!("?endTransactionRid={}", encode(end)));
    }
    t.post_unit(&path, schema).await
}

/// Fetch the schema at a view; `None` when no schema has been put.
pub(crate) async fn get_schema(
    t: &Transport,
    dataset_rid: &str,
    branch_id: &str,
    end_transaction_rid: Option<&str>,
    version_id: Option<&str>,
) -> Result<Option<VersionedWireSchema>> {
    let mut path = format!(
        "/schemas/datasets/{}/branches/{}",
        encode(dataset_rid),
        encode(branch_id)
    );
    let mut sep = '?';
    if let Some(end) = end_transaction_rid {
        path.push_str(&format!("{sep}endTransactionRid={}", encode(end)));
        sep = '&';
    }
    if let Some(version) = version_id {
        path.push_str(&format!("{sep}versionId={}", encode(version)));
    }
    t.get_json_opt(&path).await
}
