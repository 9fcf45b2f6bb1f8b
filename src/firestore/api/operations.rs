use std::collections::BTreeMap;

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::mask_field_path;
use crate::firestore::value::FirestoreValue;

/// Options that turn a batched `set` into a merge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Merge every top-level field present in the written data.
    pub merge: bool,
    /// Merge only these field paths. Takes precedence over `merge`.
    pub merge_fields: Option<Vec<String>>,
}

impl SetOptions {
    pub fn merge_all() -> Self {
        Self {
            merge: true,
            merge_fields: None,
        }
    }

    /// Field paths are sent as given, so `a.b` addresses the nested field `b` of map `a`.
    pub fn merge_fields<I, S>(fields: I) -> FirestoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        if unique.is_empty() {
            return Err(invalid_argument(
                "merge_fields requires at least one field path",
            ));
        }
        Ok(Self {
            merge: false,
            merge_fields: Some(unique),
        })
    }

    pub fn is_merge(&self) -> bool {
        self.merge || self.merge_fields.is_some()
    }

    /// The update mask implied by these options for `data`, if any.
    pub(crate) fn mask_for(&self, data: &BTreeMap<String, FirestoreValue>) -> Option<Vec<String>> {
        match (&self.merge_fields, self.merge) {
            (Some(fields), _) => Some(fields.clone()),
            (None, true) => Some(top_level_mask(data)),
            (None, false) => None,
        }
    }
}

/// Which fields a document update is allowed to touch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum UpdateMask {
    /// Replace the whole document.
    #[default]
    None,
    /// Touch exactly the top-level keys of the written data.
    AllFields,
    /// Touch the listed top-level fields. A listed field missing from the data is deleted.
    Fields(Vec<String>),
}

impl UpdateMask {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UpdateMask::Fields(fields.into_iter().map(Into::into).collect())
    }

    /// Escaped `updateMask.fieldPaths` entries, or `None` when the update overwrites.
    pub(crate) fn field_paths(
        &self,
        data: &BTreeMap<String, FirestoreValue>,
    ) -> FirestoreResult<Option<Vec<String>>> {
        let paths = match self {
            UpdateMask::None => return Ok(None),
            UpdateMask::AllFields => top_level_mask(data),
            UpdateMask::Fields(fields) => fields.iter().map(|field| mask_field_path(field)).collect(),
        };
        if paths.is_empty() {
            return Err(invalid_argument("Missing fields in Mask!"));
        }
        Ok(Some(paths))
    }
}

/// Every key of `data` as a mask entry. Keys are literal names, not paths.
pub(crate) fn top_level_mask(data: &BTreeMap<String, FirestoreValue>) -> Vec<String> {
    data.keys().map(|key| mask_field_path(key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(keys: &[&str]) -> BTreeMap<String, FirestoreValue> {
        keys.iter()
            .map(|key| (key.to_string(), FirestoreValue::from(1)))
            .collect()
    }

    #[test]
    fn merge_fields_deduplicates_and_rejects_empty() {
        let options = SetOptions::merge_fields(["a", "b.c", "a"]).unwrap();
        assert_eq!(options.merge_fields, Some(vec!["a".to_string(), "b.c".to_string()]));
        assert!(options.is_merge());
        assert!(SetOptions::merge_fields(Vec::<String>::new()).is_err());
    }

    #[test]
    fn set_masks() {
        let fields = data(&["a", "x.y"]);
        assert_eq!(SetOptions::default().mask_for(&fields), None);
        assert_eq!(
            SetOptions::merge_all().mask_for(&fields),
            Some(vec!["a".to_string(), "`x.y`".to_string()])
        );
        assert_eq!(
            SetOptions::merge_fields(["x.y"]).unwrap().mask_for(&fields),
            Some(vec!["x.y".to_string()])
        );
    }

    #[test]
    fn update_mask_escapes_dotted_names() {
        let fields = data(&["a", "a.b"]);
        assert_eq!(UpdateMask::None.field_paths(&fields).unwrap(), None);
        assert_eq!(
            UpdateMask::AllFields.field_paths(&fields).unwrap(),
            Some(vec!["a".to_string(), "`a.b`".to_string()])
        );
        assert_eq!(
            UpdateMask::fields(["a.b", "gone"]).field_paths(&fields).unwrap(),
            Some(vec!["`a.b`".to_string(), "gone".to_string()])
        );
    }

    #[test]
    fn update_mask_quotes_non_identifier_names() {
        let fields = data(&["first-name", "1st", "last_name"]);
        assert_eq!(
            UpdateMask::AllFields.field_paths(&fields).unwrap(),
            Some(vec!["`1st`".to_string(), "`first-name`".to_string(), "last_name".to_string()])
        );
    }

    #[test]
    fn empty_mask_is_rejected() {
        let err = UpdateMask::AllFields.field_paths(&BTreeMap::new()).unwrap_err();
        assert!(err.is_validation());
        let err = UpdateMask::Fields(Vec::new()).field_paths(&data(&["a"])).unwrap_err();
        assert_eq!(err.message(), "Missing fields in Mask!");
    }
}
