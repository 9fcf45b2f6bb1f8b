use std::fmt::{Debug, Formatter};

use crate::firestore::constants::DOCUMENT_NAME_FIELD;
use crate::firestore::error::{invalid_argument, out_of_range, FirestoreResult};
use crate::firestore::model::quote_field_path;
use crate::firestore::remote::structured_query::{
    CollectionSelector, CompositeFilter, CompositeOperator, Direction, FieldFilter, FieldOperator,
    FieldReference, Filter, Order, StructuredQuery, UnaryFilter, UnaryOperator,
};
use crate::firestore::value::{FirestoreValue, ValueCodec, ValueKind};

use super::document::Document;

/// Runs a compiled query and decodes the resulting documents.
pub type QueryCallback = Box<dyn Fn(&StructuredQuery) -> FirestoreResult<Vec<Document>>>;

/// Builder for a structured query over one collection.
///
/// Every step consumes the builder and hands it back, so a builder that produced an error is
/// gone. [`Query::execute`] may be called any number of times and resends the same query.
pub struct Query {
    structured: StructuredQuery,
    codec: ValueCodec,
    callback: QueryCallback,
}

impl Query {
    /// `collection_id` may be empty, in which case no `from` clause is sent.
    pub fn new<F>(collection_id: &str, codec: ValueCodec, callback: F) -> Self
    where
        F: Fn(&StructuredQuery) -> FirestoreResult<Vec<Document>> + 'static,
    {
        let mut structured = StructuredQuery::default();
        if !collection_id.is_empty() {
            structured.from.push(CollectionSelector {
                collection_id: collection_id.to_string(),
            });
        }
        Self {
            structured,
            codec,
            callback: Box::new(callback),
        }
    }

    /// Adds `field` to the projection. A blank name selects only the document name.
    pub fn select(mut self, field: &str) -> Self {
        let field = if field.trim().is_empty() {
            DOCUMENT_NAME_FIELD
        } else {
            field
        };
        self.structured.select.fields.push(field_reference(field));
        self
    }

    /// Adds a filter, AND-ed with any filter already present.
    ///
    /// `operator` is matched case-insensitively with underscores ignored: `==`, `===`, `<`,
    /// `<=`, `>`, `>=`, `contains`, `containsany`, `in`, plus the unary `null`/`isnull` and
    /// `nan`/`isnan` which ignore a non-null `value`. Whatever the operator, a null `value`
    /// becomes an `IS_NULL` filter and a NaN `value` an `IS_NAN` filter.
    pub fn filter(mut self, field: &str, operator: &str, value: impl Into<FirestoreValue>) -> FirestoreResult<Self> {
        let filter = self.build_filter(field, operator, value.into())?;
        self.structured.filter = Some(match self.structured.filter.take() {
            None => filter,
            Some(Filter::CompositeFilter(mut composite)) => {
                composite.filters.push(filter);
                Filter::CompositeFilter(composite)
            }
            Some(existing) => Filter::CompositeFilter(CompositeFilter {
                op: CompositeOperator::And,
                filters: vec![existing, filter],
            }),
        });
        Ok(self)
    }

    /// Appends a sort order. A direction starting with `dec` or `desc`, in any case, sorts
    /// descending; anything else, including `None`, ascending.
    pub fn order_by(mut self, field: &str, direction: Option<&str>) -> Self {
        self.structured.order_by.push(Order {
            field: field_reference(field),
            direction: parse_direction(direction),
        });
        self
    }

    pub fn offset(mut self, offset: i64) -> FirestoreResult<Self> {
        if offset < 0 {
            return Err(out_of_range("Offset must be >= 0!"));
        }
        self.structured.offset = Some(offset);
        Ok(self)
    }

    pub fn limit(mut self, limit: i64) -> FirestoreResult<Self> {
        if limit < 0 {
            return Err(out_of_range("Limit must be >= 0!"));
        }
        self.structured.limit = Some(limit);
        Ok(self)
    }

    /// Results `start` (inclusive) to `end` (exclusive).
    pub fn range(mut self, start: i64, end: i64) -> FirestoreResult<Self> {
        if start < 0 {
            return Err(out_of_range("Range start must be >= 0!"));
        }
        if end < 0 {
            return Err(out_of_range("Range end must be >= 0!"));
        }
        if start >= end {
            return Err(out_of_range("Range start must be less than range end!"));
        }
        self.structured.offset = Some(start);
        self.structured.limit = Some(end - start);
        Ok(self)
    }

    pub fn structured_query(&self) -> &StructuredQuery {
        &self.structured
    }

    pub fn execute(&self) -> FirestoreResult<Vec<Document>> {
        (self.callback)(&self.structured)
    }

    fn build_filter(&self, field: &str, operator: &str, value: FirestoreValue) -> FirestoreResult<Filter> {
        match value.kind() {
            ValueKind::Null => return Ok(unary_filter(field, UnaryOperator::IsNull)),
            ValueKind::Double(double) if double.is_nan() => {
                return Ok(unary_filter(field, UnaryOperator::IsNan))
            }
            _ => {}
        }
        let normalized = operator.to_lowercase().replace('_', "");
        if let Some(op) = unary_operator(&normalized) {
            return Ok(unary_filter(field, op));
        }
        let op = field_operator(&normalized)
            .ok_or_else(|| invalid_argument(format!("Invalid Operator given: {operator}")))?;
        Ok(Filter::FieldFilter(FieldFilter {
            field: field_reference(field),
            op,
            value: self.codec.wrap(&value),
        }))
    }
}

impl Debug for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("structured", &self.structured)
            .finish_non_exhaustive()
    }
}

fn field_reference(field: &str) -> FieldReference {
    FieldReference {
        field_path: quote_field_path(field),
    }
}

fn unary_filter(field: &str, op: UnaryOperator) -> Filter {
    Filter::UnaryFilter(UnaryFilter {
        field: field_reference(field),
        op,
    })
}

fn field_operator(normalized: &str) -> Option<FieldOperator> {
    match normalized {
        "==" | "===" => Some(FieldOperator::Equal),
        "<" => Some(FieldOperator::LessThan),
        "<=" => Some(FieldOperator::LessThanOrEqual),
        ">" => Some(FieldOperator::GreaterThan),
        ">=" => Some(FieldOperator::GreaterThanOrEqual),
        "contains" => Some(FieldOperator::ArrayContains),
        "containsany" => Some(FieldOperator::ArrayContainsAny),
        "in" => Some(FieldOperator::In),
        _ => None,
    }
}

fn unary_operator(normalized: &str) -> Option<UnaryOperator> {
    match normalized {
        "null" | "isnull" => Some(UnaryOperator::IsNull),
        "nan" | "isnan" => Some(UnaryOperator::IsNan),
        _ => None,
    }
}

fn parse_direction(direction: Option<&str>) -> Direction {
    match direction.map(str::to_uppercase) {
        Some(direction) if direction.starts_with("DEC") || direction.starts_with("DESC") => {
            Direction::Descending
        }
        _ => Direction::Ascending,
    }
}
