//! ABOUTME: Converts untyped JSON row values into typed tokio-postgres bind parameters
//! ABOUTME: The only place that needs to know both `FieldType` and a wire protocol type

use chrono::{DateTime, Utc};
use p8fs_core::model::FieldType;
use p8fs_core::{P8fsError, Result};
use serde_json::Value;
use tokio_postgres::types::{ToSql, Type};
use uuid::Uuid;

/// One bound parameter, already coerced to the concrete type the column
/// expects. Boxed as `dyn ToSql` since a row's parameter list is
/// heterogeneous and built at runtime from a [`ModelDescriptor`].
pub type BoundParam = Box<dyn ToSql + Sync + Send>;

/// Coerce `value` into the Rust type `ty` expects, erroring out rather than
/// silently truncating or stringifying on a type mismatch (§4.D "typed
/// binding"). `Null` always binds as SQL `NULL` regardless of `ty`.
pub fn bind_field(field_name: &str, ty: FieldType, value: &Value) -> Result<BoundParam> {
    if value.is_null() {
        return Ok(Box::new(Option::<i32>::None));
    }

    let mismatch = || P8fsError::validation(format!("field {field_name} has the wrong JSON shape for {ty:?}"));

    match ty {
        FieldType::Uuid => {
            let s = value.as_str().ok_or_else(mismatch)?;
            let id = Uuid::parse_str(s).map_err(|_| mismatch())?;
            Ok(Box::new(id))
        }
        FieldType::Text => {
            let s = value.as_str().ok_or_else(mismatch)?.to_string();
            Ok(Box::new(s))
        }
        FieldType::Integer => {
            let n = value.as_i64().ok_or_else(mismatch)?;
            Ok(Box::new(i32::try_from(n).map_err(|_| mismatch())?))
        }
        FieldType::BigInt => {
            let n = value.as_i64().ok_or_else(mismatch)?;
            Ok(Box::new(n))
        }
        FieldType::Float => {
            let n = value.as_f64().ok_or_else(mismatch)?;
            Ok(Box::new(n))
        }
        FieldType::Boolean => {
            let b = value.as_bool().ok_or_else(mismatch)?;
            Ok(Box::new(b))
        }
        FieldType::Timestamp => {
            let s = value.as_str().ok_or_else(mismatch)?;
            let ts: DateTime<Utc> = s.parse().map_err(|_| mismatch())?;
            Ok(Box::new(ts))
        }
        FieldType::Json => Ok(Box::new(value.clone())),
        FieldType::Vector(_) => {
            let floats: Vec<f32> = value
                .as_array()
                .ok_or_else(mismatch)?
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32).ok_or_else(mismatch))
                .collect::<Result<_>>()?;
            Ok(Box::new(pgvector::Vector::from(floats)))
        }
    }
}

/// Postgres wire type a bound parameter of this `FieldType` reports as,
/// used only for diagnostics since `tokio_postgres` infers types from the
/// `ToSql` impl at bind time.
#[must_use]
pub fn wire_type(ty: FieldType) -> Type {
    match ty {
        FieldType::Uuid => Type::UUID,
        FieldType::Text => Type::TEXT,
        FieldType::Integer => Type::INT4,
        FieldType::BigInt => Type::INT8,
        FieldType::Float => Type::FLOAT8,
        FieldType::Boolean => Type::BOOL,
        FieldType::Timestamp => Type::TIMESTAMPTZ,
        FieldType::Json => Type::JSONB,
        FieldType::Vector(_) => Type::TEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_binds_regardless_of_declared_type() {
        assert!(bind_field("x", FieldType::Text, &Value::Null).is_ok());
        assert!(bind_field("x", FieldType::Vector(3), &Value::Null).is_ok());
    }

    #[test]
    fn non_uuid_string_is_a_mismatch() {
        let result = bind_field("id", FieldType::Uuid, &json!("not-a-uuid"));
        assert!(result.is_err());
    }

    #[test]
    fn vector_requires_an_array_of_numbers() {
        assert!(bind_field("content_embedding", FieldType::Vector(3), &json!([0.1, 0.2, 0.3])).is_ok());
        assert!(bind_field("content_embedding", FieldType::Vector(3), &json!("nope")).is_err());
    }
}
