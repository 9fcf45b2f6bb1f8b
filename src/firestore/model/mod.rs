mod database_id;
mod field_path;
mod geo_point;
mod resource_path;
mod timestamp;

pub use database_id::DatabaseId;
pub use field_path::{mask_field_path, quote_field_path};
pub use geo_point::GeoPoint;
pub use resource_path::{
    clean_path, collection_from_path, decode_path, decode_segment, document_from_path,
    encode_segment, is_reference_path, relative_path_from_document_name, relative_path_from_name,
    relative_path_from_reference, split_col_doc, validate_segment, ResourcePath,
};
pub use timestamp::Timestamp;
