mod bytes_value;
mod codec;
mod value;

pub use bytes_value::BytesValue;
pub use codec::{CodecOptions, StringHeuristics, ValueCodec};
pub use value::{FirestoreValue, ValueKind};
