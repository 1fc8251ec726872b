//! User-facing dataset schema model.
//!
//! A [`DatasetSchema`] is a list of typed [`Field`]s plus the file format the
//! dataset is stored in. [`FieldType`] is a closed sum type covering the
//! atomic column types and the nested array/map/struct shapes; conversion to
//! and from the wire representation is exhaustive.

use crate::error::{ClientError, Result};
use crate::rid::ResourceIdentifier;
use crate::rpc::schema::{WireFieldSchema, WireFieldType, WireSchema};

/// The type of a schema [`Field`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Boolean,
    Binary,
    Byte,
    Date,
    Decimal { precision: u32, scale: u32 },
    Double,
    Float,
    Integer,
    Long,
    Short,
    String,
    Timestamp,
    Array(Box<FieldType>),
    Map {
        key: Box<FieldType>,
        value: Box<FieldType>,
    },
    Struct(Vec<Field>),
}

impl FieldType {
    /// A decimal with the service defaults (precision 10, scale 0).
    pub fn decimal() -> Self {
        FieldType::Decimal {
            precision: 10,
            scale: 0,
        }
    }
}

/// A field in a [`DatasetSchema`]. Nested fields (array elements, map
/// keys/values) may be unnamed.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Option<String>,
    pub field_type: FieldType,
    pub nullable: bool,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Field {
    /// A named nullable field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: Some(name.into()),
            field_type,
            nullable: true,
            metadata: None,
        }
    }

    /// An unnamed nested field (array element, map key/value).
    pub fn unnamed(field_type: FieldType) -> Self {
        Self {
            name: None,
            field_type,
            nullable: true,
            metadata: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_metadata(
        mut self,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Storage format of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Avro,
    Csv,
    Parquet,
    Soho,
}

impl FileFormat {
    /// The reader class the processing layer uses for this format, plus the
    /// `format` metadata entry when the reader needs one.
    pub(crate) fn reader_class(&self) -> (&'static str, Option<&'static str>) {
        match self {
            FileFormat::Avro => ("io.atlas.spark.input.AvroDataFrameReader", Some("avro")),
            FileFormat::Csv => ("io.atlas.spark.input.TextDataFrameReader", None),
            FileFormat::Parquet => (
                "io.atlas.spark.input.ParquetDataFrameReader",
                Some("parquet"),
            ),
            FileFormat::Soho => (
                "io.atlas.spark.input.DataSourceDataFrameReader",
                Some("soho"),
            ),
        }
    }

    fn from_reader_class(class: &str) -> Option<Self> {
        match class {
            "io.atlas.spark.input.AvroDataFrameReader" => Some(FileFormat::Avro),
            "io.atlas.spark.input.TextDataFrameReader" => Some(FileFormat::Csv),
            "io.atlas.spark.input.ParquetDataFrameReader" => Some(FileFormat::Parquet),
            "io.atlas.spark.input.DataSourceDataFrameReader" => Some(FileFormat::Soho),
            _ => None,
        }
    }
}

/// The schema of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSchema {
    pub fields: Vec<Field>,
    pub format: FileFormat,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl DatasetSchema {
    /// A parquet schema over the given fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            format: FileFormat::Parquet,
            metadata: None,
        }
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_metadata(
        mut self,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub(crate) fn to_wire(&self) -> WireSchema {
        let (reader_class, format) = self.format.reader_class();
        let mut custom_metadata = self.metadata.clone().unwrap_or_default();
        if let Some(format) = format {
            custom_metadata.insert("format".to_string(), format.into());
        }
        WireSchema {
            field_schema_list: self.fields.iter().map(field_to_wire).collect(),
            data_frame_reader_class: reader_class.to_string(),
            custom_metadata,
        }
    }

    pub(crate) fn from_wire(wire: &WireSchema) -> Result<Self> {
        let fields = wire
            .field_schema_list
            .iter()
            .map(field_from_wire)
            .collect::<Result<Vec<_>>>()?;
        let format = FileFormat::from_reader_class(&wire.data_frame_reader_class)
            .ok_or_else(|| {
                ClientError::InvalidResponse(format!(
                    "unknown data frame reader class: {}",
                    wire.data_frame_reader_class
                ))
            })?;
        let mut metadata = wire.custom_metadata.clone();
        metadata.remove("format");
        Ok(Self {
            fields,
            format,
            metadata: if metadata.is_empty() {
                None
            } else {
                Some(metadata)
            },
        })
    }
}

/// A schema pinned to the branch/transaction it was read at.
#[derive(Debug, Clone)]
pub struct VersionedDatasetSchema {
    pub branch_id: String,
    pub transaction_rid: Option<ResourceIdentifier>,
    pub version_id: Option<String>,
    pub schema: DatasetSchema,
}

fn field_to_wire(field: &Field) -> WireFieldSchema {
    let mut wire = WireFieldSchema {
        field_type: WireFieldType::Boolean,
        name: field.name.clone(),
        nullable: field.nullable,
        custom_metadata: field.metadata.clone().unwrap_or_default(),
        array_subtype: None,
        map_key_type: None,
        map_value_type: None,
        sub_schemas: None,
        precision: None,
        scale: None,
    };
    wire.field_type = match &field.field_type {
        FieldType::Boolean => WireFieldType::Boolean,
        FieldType::Binary => WireFieldType::Binary,
        FieldType::Byte => WireFieldType::Byte,
        FieldType::Date => WireFieldType::Date,
        FieldType::Decimal { precision, scale } => {
            wire.precision = Some(*precision);
            wire.scale = Some(*scale);
            WireFieldType::Decimal
        }
        FieldType::Double => WireFieldType::Double,
        FieldType::Float => WireFieldType::Float,
        FieldType::Integer => WireFieldType::Integer,
        FieldType::Long => WireFieldType::Long,
        FieldType::Short => WireFieldType::Short,
        FieldType::String => WireFieldType::String,
        FieldType::Timestamp => WireFieldType::Timestamp,
        FieldType::Array(element) => {
            wire.array_subtype = Some(Box::new(field_to_wire(&Field::unnamed(
                element.as_ref().clone(),
            ))));
            WireFieldType::Array
        }
        FieldType::Map { key, value } => {
            wire.map_key_type = Some(Box::new(field_to_wire(
                &Field::unnamed(key.as_ref().clone()).not_null(),
            )));
            wire.map_value_type = Some(Box::new(field_to_wire(&Field::unnamed(
                value.as_ref().clone(),
            ))));
            WireFieldType::Map
        }
        FieldType::Struct(children) => {
            wire.sub_schemas = Some(children.iter().map(field_to_wire).collect());
            WireFieldType::Struct
        }
    };
    wire
}

fn field_from_wire(wire: &WireFieldSchema) -> Result<Field> {
    let missing = |what: &str| {
        ClientError::InvalidResponse(format!(
            "field schema of type {:?} is missing {what}",
            wire.field_type
        ))
    };
    let field_type = match wire.field_type {
        WireFieldType::Boolean => FieldType::Boolean,
        WireFieldType::Binary => FieldType::Binary,
        WireFieldType::Byte => FieldType::Byte,
        WireFieldType::Date => FieldType::Date,
        WireFieldType::Decimal => FieldType::Decimal {
            precision: wire.precision.unwrap_or(10),
            scale: wire.scale.unwrap_or(0),
        },
        WireFieldType::Double => FieldType::Double,
        WireFieldType::Float => FieldType::Float,
        WireFieldType::Integer => FieldType::Integer,
        WireFieldType::Long => FieldType::Long,
        WireFieldType::Short => FieldType::Short,
        WireFieldType::String => FieldType::String,
        WireFieldType::Timestamp => FieldType::Timestamp,
        WireFieldType::Array => {
            let element = wire.array_subtype.as_ref().ok_or_else(|| missing("arraySubtype"))?;
            FieldType::Array(Box::new(field_from_wire(element)?.field_type))
        }
        WireFieldType::Map => {
            let key = wire.map_key_type.as_ref().ok_or_else(|| missing("mapKeyType"))?;
            let value = wire
                .map_value_type
                .as_ref()
                .ok_or_else(|| missing("mapValueType"))?;
            FieldType::Map {
                key: Box::new(field_from_wire(key)?.field_type),
                value: Box::new(field_from_wire(value)?.field_type),
            }
        }
        WireFieldType::Struct => {
            let children = wire.sub_schemas.as_ref().ok_or_else(|| missing("subSchemas"))?;
            FieldType::Struct(
                children
                    .iter()
                    .map(field_from_wire)
                    .collect::<Result<Vec<_>>>()?,
            )
        }
    };
    Ok(Field {
        name: wire.name.clone(),
        field_type,
        nullable: wire.nullable,
        metadata: if wire.custom_metadata.is_empty() {
            None
        } else {
            Some(wire.custom_metadata.clone())
        },
    })
}
