//! Translation of storage filters into SQL.

use medportal_storage::{Condition, Filter, ID_FIELD, StorageError};
use serde_json::{Value, json};
use sqlx_core::query_as::QueryAs;
use sqlx_postgres::{PgArguments, Postgres};

use crate::schema::validate_identifier;

/// A positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlParam {
    Text(String),
    Json(Value),
    TextArray(Vec<String>),
}

/// ` WHERE ...` (or empty) plus its parameters.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct WhereClause {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Builds the WHERE clause for `filter`. Placeholders start at `$first`.
pub(crate) fn where_clause(filter: &Filter, first: usize) -> Result<WhereClause, StorageError> {
    let mut parts = Vec::with_capacity(filter.conditions().len());
    let mut params = Vec::new();

    for condition in filter.conditions() {
        let field = condition.field();
        if field != ID_FIELD {
            validate_identifier(field)
                .map_err(|e| StorageError::invalid_document(e.to_string()))?;
        }
        let n = first + params.len();
        match condition {
            Condition::Eq { value, .. } if field == ID_FIELD => {
                parts.push(format!("id = ${n}"));
                params.push(SqlParam::Text(as_text(value)));
            }
            Condition::Eq { value, .. } => {
                parts.push(format!("resource->'{field}' = ${n}"));
                params.push(SqlParam::Json(value.clone()));
            }
            Condition::ArrayContains { value, .. } => {
                parts.push(format!("resource->'{field}' @> ${n}"));
                params.push(SqlParam::Json(json!([value])));
            }
            Condition::In { values, .. } => {
                let column = text_column(field);
                parts.push(format!("{column} = ANY(${n})"));
                params.push(SqlParam::TextArray(values.iter().map(as_text).collect()));
            }
            Condition::TextContains { needle, .. } => {
                parts.push(format!(r"resource->>'{field}' ILIKE ${n} ESCAPE '\'"));
                params.push(SqlParam::Text(format!("%{}%", escape_like(needle))));
            }
            Condition::Range { gte, lt, .. } => {
                let column = text_column(field);
                if let Some(gte) = gte {
                    let n = first + params.len();
                    parts.push(format!(r#"{column} COLLATE "C" >= ${n}"#));
                    params.push(SqlParam::Text(gte.clone()));
                }
                if let Some(lt) = lt {
                    let n = first + params.len();
                    parts.push(format!(r#"{column} COLLATE "C" < ${n}"#));
                    params.push(SqlParam::Text(lt.clone()));
                }
            }
        }
    }

    if parts.is_empty() {
        return Ok(WhereClause::default());
    }
    Ok(WhereClause {
        sql: format!(" WHERE {}", parts.join(" AND ")),
        params,
    })
}

/// SQL removing `$1` from the array `field` of every row holding it.
/// `$1` is the value as JSONB.
pub(crate) fn pull_sql(collection: &str, field: &str) -> Result<String, StorageError> {
    validate_identifier(collection).map_err(|e| StorageError::invalid_document(e.to_string()))?;
    validate_identifier(field).map_err(|e| StorageError::invalid_document(e.to_string()))?;
    Ok(format!(
        r#"UPDATE "{collection}"
           SET resource = jsonb_set(
                   resource,
                   '{{{field}}}',
                   COALESCE(
                       (SELECT jsonb_agg(e) FROM jsonb_array_elements(resource->'{field}') e WHERE e <> $1),
                       '[]'::jsonb
                   )
               ),
               updated_at = now()
           WHERE resource->'{field}' @> jsonb_build_array($1::jsonb)"#
    ))
}

/// SQL merging the JSONB object `$2` into the top level of row `$1`.
pub(crate) fn set_fields_sql(collection: &str) -> Result<String, StorageError> {
    validate_identifier(collection).map_err(|e| StorageError::invalid_document(e.to_string()))?;
    Ok(format!(
        r#"UPDATE "{collection}"
           SET resource = resource || $2::jsonb, updated_at = now()
           WHERE id = $1
           RETURNING id, created_at, updated_at, resource"#
    ))
}

/// SQL appending `$2` to the array `field` of row `$1`. Rows whose `field`
/// holds a non-array value are left alone.
pub(crate) fn push_sql(collection: &str, field: &str) -> Result<String, StorageError> {
    validate_identifier(collection).map_err(|e| StorageError::invalid_document(e.to_string()))?;
    validate_identifier(field).map_err(|e| StorageError::invalid_document(e.to_string()))?;
    Ok(format!(
        r#"UPDATE "{collection}"
           SET resource = jsonb_set(
                   resource,
                   '{{{field}}}',
                   COALESCE(resource->'{field}', '[]'::jsonb) || jsonb_build_array($2::jsonb)
               ),
               updated_at = now()
           WHERE id = $1
             AND jsonb_typeof(COALESCE(resource->'{field}', '[]'::jsonb)) = 'array'
           RETURNING id, created_at, updated_at, resource"#
    ))
}

/// Binds every parameter in order.
pub(crate) fn bind_params<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    params: Vec<SqlParam>,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(v) => query.bind(v),
            SqlParam::Json(v) => query.bind(v),
            SqlParam::TextArray(v) => query.bind(v),
        };
    }
    query
}

fn text_column(field: &str) -> String {
    if field == ID_FIELD {
        "id".to_string()
    } else {
        format!("resource->>'{field}'")
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escapes LIKE wildcards so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
