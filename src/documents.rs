//! Document types crossing the data/document boundary.
//!
//! These structures are *produced* by data providers and handed to an external
//! document consumer; this crate never interprets them. A datakey describes
//! one named field of a collection; a resource document describes an external
//! dataset; a datum document describes a contiguous index range into one
//! resource.

use serde::{Deserialize, Serialize};

/// Machine-readable datatype of a signal or dataset field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// A true/false flag.
    Boolean,
    /// A signed or unsigned integer.
    Integer,
    /// A floating-point number.
    Number,
    /// A text value.
    String,
    /// A one-or-more dimensional array.
    Array,
}

/// Describes one named field: where it comes from and what it looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataKey {
    /// Address of the producing control point, `scheme://identifier`.
    pub source: String,
    /// Per-collection shape; empty for scalars.
    pub shape: Vec<usize>,
    /// Abstract datatype.
    pub dtype: Dtype,
    /// Numpy-style dtype string (e.g. `"<f8"`).
    pub dtype_numpy: String,
    /// Marker set when the data lives outside the document stream
    /// (e.g. `"STREAM:"` for externally-written datasets).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<String>,
}

/// Describes an externally-written dataset backing one data key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDoc {
    /// Mimetype of the backing store (e.g. `"application/x-hdf5"`).
    pub mimetype: String,
    /// Location of the backing store.
    pub uri: String,
    /// The data key this resource provides.
    pub data_key: String,
    /// Provider-specific parameters (dataset path, chunking, ...).
    pub parameters: serde_json::Value,
}

/// Describes a contiguous index range `[start, stop)` written into one
/// resource since the last datum was emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatumDoc {
    /// The data key this datum belongs to.
    pub data_key: String,
    /// First index covered (inclusive).
    pub start: u64,
    /// One past the last index covered (exclusive).
    pub stop: u64,
}

/// One document emitted by a streaming data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StreamDoc {
    /// A resource document, emitted once per dataset when writing begins.
    Resource(ResourceDoc),
    /// A datum document covering newly-written indices.
    Datum(DatumDoc),
}

impl StreamDoc {
    /// The data key the document refers to.
    pub fn data_key(&self) -> &str {
        match self {
            StreamDoc::Resource(r) => &r.data_key,
            StreamDoc::Datum(d) => &d.data_key,
        }
    }

    /// True for [`StreamDoc::Resource`].
    pub fn is_resource(&self) -> bool {
        matches!(self, StreamDoc::Resource(_))
    }
}
