//! Blocking client for the Cloud Firestore REST API.
//!
//! Field values are modelled by [`firestore::FirestoreValue`] and marshalled to and from the
//! REST `Value` union by [`firestore::ValueCodec`]. Documents are read and written through the
//! [`firestore::Firestore`] facade, which also hands out structured queries and write batches.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//!
//! use firestore_rest::firestore::{Firestore, FirestoreSettings, FirestoreValue, UpdateMask};
//!
//! # fn main() -> Result<(), firestore_rest::firestore::FirestoreError> {
//! let settings = FirestoreSettings::new("demo-project")?.with_access_token("ya29.token");
//! let firestore = Firestore::new(settings)?;
//!
//! let mut fields = BTreeMap::new();
//! fields.insert("n".to_string(), FirestoreValue::from(100));
//! fields.insert("s".to_string(), FirestoreValue::from("hello"));
//! firestore.create_document("Test Collection/Doc", &fields)?;
//!
//! fields.insert("n".to_string(), FirestoreValue::from(200));
//! firestore.update_document("Test Collection/Doc", &fields, UpdateMask::fields(["n"]))?;
//!
//! let adults = firestore
//!     .query("users")?
//!     .filter("age", ">=", 18)?
//!     .order_by("age", Some("desc"))
//!     .limit(10)?
//!     .execute()?;
//! for user in adults {
//!     println!("{user}: {:?}", user.obj());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Requests go through a [`firestore::RequestExecutor`]. The default one speaks HTTPS with
//! `reqwest` and retries transient failures. Tests and embedders can provide their own with
//! [`firestore::Firestore::with_executor`].

pub mod firestore;

#[cfg(test)]
pub mod test_support;
