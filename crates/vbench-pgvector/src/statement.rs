//! Multi-row `INSERT` generation with positional bind parameters.

use std::fmt::Write as _;

use serde_json::Value;

use vbench_core::types::Batch;

use crate::schema::TableSchema;

/// Postgres caps a single statement at 65535 bind parameters.
pub const MAX_BIND_PARAMS: usize = 65_535;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: usize,
    pub params: Vec<SqlParam>,
}

/// `[v1,v2,...]`, the text form both extensions accept for vector input.
pub fn vector_literal(v: &[f32]) -> String {
    let mut out = String::with_capacity(v.len() * 8 + 2);
    out.push('[');
    for (i, x) in v.iter().enumerate() {
        if i > 0 { out.push(','); }
        let _ = write!(out, "{}", x);
    }
    out.push(']');
    out
}

/// NULLs are inlined rather than bound: an untyped NULL parameter would be
/// sent as text and fail assignment to non-text columns.
fn scalar_param(v: &Value) -> Option<SqlParam> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(SqlParam::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(SqlParam::Int(i)),
            None => n.as_f64().map(SqlParam::Float),
        },
        Value::String(s) => Some(SqlParam::Text(s.clone())),
        // rejected by schema::check_values before statements are built
        Value::Array(_) | Value::Object(_) => Some(SqlParam::Text(v.to_string())),
    }
}

pub struct InsertBuilder<'a> {
    table: &'a str,
    vector_type: &'a str,
    max_params: usize,
}

impl<'a> InsertBuilder<'a> {
    pub fn new(table: &'a str, vector_type: &'a str) -> Self {
        Self { table, vector_type, max_params: MAX_BIND_PARAMS }
    }

    pub fn with_max_params(mut self, max_params: usize) -> Self {
        self.max_params = max_params;
        self
    }

    /// One statement per group of rows that fits under the parameter cap.
    /// The batch must already have passed shape, value and schema checks.
    pub fn build(&self, schema: &TableSchema, batch: &Batch) -> Vec<InsertStatement> {
        let per_row = schema.column_list().len();
        let rows_per_stmt = (self.max_params / per_row).max(1);
        let columns: Vec<String> = schema.column_list().into_iter().map(str::to_string).collect();
        let header = format!("INSERT INTO {} ({}) VALUES ", self.table, columns.join(", "));

        let mut out = Vec::new();
        let indices: Vec<usize> = (0..batch.len()).collect();
        for chunk in indices.chunks(rows_per_stmt) {
            let mut sql = header.clone();
            let mut params = Vec::with_capacity(chunk.len() * per_row);
            for (n, &i) in chunk.iter().enumerate() {
                if n > 0 { sql.push_str(", "); }
                params.push(SqlParam::Int(batch.ids[i]));
                let _ = write!(sql, "(${}", params.len());
                params.push(SqlParam::Text(vector_literal(&batch.vectors[i])));
                let _ = write!(sql, ", ${}::{}", params.len(), self.vector_type);
                for column in schema.columns() {
                    let value = batch.metadata[i].as_ref().and_then(|m| m.get(column)).and_then(scalar_param);
                    match value {
                        Some(p) => {
                            params.push(p);
                            let _ = write!(sql, ", ${}", params.len());
                        }
                        None => sql.push_str(", NULL"),
                    }
                }
                sql.push(')');
            }
            out.push(InsertStatement { sql, columns: columns.clone(), rows: chunk.len(), params });
        }
        out
    }
}
