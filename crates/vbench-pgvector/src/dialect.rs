//! SQL flavours of the two Postgres vector extensions.
//!
//! pgvector and pgvecto.rs expose the same capability (a vector column plus an
//! HNSW index) with incompatible syntax. Everything that differs between them
//! lives behind [`Dialect`]; the upload and index code never branches on the
//! engine variant.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use vbench_core::types::EngineVariant;

pub trait Dialect: Send + Sync + fmt::Debug {
    fn variant(&self) -> EngineVariant;

    /// Column type used in the `$n::<type>` cast of vector literals.
    fn vector_type(&self) -> &'static str;

    /// Operator class for `metric`, or `None` when the dialect has no index
    /// support for it.
    fn distance_operator_for(&self, metric: &str) -> Option<&'static str>;

    fn build_create_index_statement(
        &self,
        table: &str,
        operator: &str,
        options: &IndexMap<String, Value>,
    ) -> String;

    /// Single-row, single-column query returning `true` while an index build
    /// is still running.
    fn indexing_status_query(&self) -> &'static str;
}

pub fn dialect_for(variant: EngineVariant) -> Box<dyn Dialect> {
    match variant {
        EngineVariant::Pgvector => Box::new(Pgvector),
        EngineVariant::PgvectoRs => Box::new(PgvectoRs),
    }
}

/// Values for the `WITH (k=v)` clause: strings unquoted, numbers as-is.
fn option_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Values inside the pgvecto.rs TOML document; strings become TOML strings.
fn toml_value(v: &Value) -> String {
    match v {
        Value::String(s) => {
            let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\"", escaped)
        }
        other => other.to_string(),
    }
}

fn normalize_metric(metric: &str) -> String {
    metric.trim().to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Pgvector;

impl Dialect for Pgvector {
    fn variant(&self) -> EngineVariant { EngineVariant::Pgvector }

    fn vector_type(&self) -> &'static str { "vector" }

    fn distance_operator_for(&self, metric: &str) -> Option<&'static str> {
        match normalize_metric(metric).as_str() {
            "l2" => Some("vector_l2_ops"),
            "cosine" => Some("vector_cosine_ops"),
            "dot" => Some("vector_ip_ops"),
            _ => None,
        }
    }

    fn build_create_index_statement(
        &self,
        table: &str,
        operator: &str,
        options: &IndexMap<String, Value>,
    ) -> String {
        let mut sql = format!("CREATE INDEX ON {} USING hnsw (vector {})", table, operator);
        if !options.is_empty() {
            let opts = options
                .iter()
                .map(|(k, v)| format!("{}={}", k, option_value(v)))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" WITH ({})", opts));
        }
        sql.push(';');
        sql
    }

    fn indexing_status_query(&self) -> &'static str {
        "SELECT EXISTS (SELECT 1 FROM pg_stat_progress_create_index)"
    }
}

/// Top-level pgvecto.rs settings applied unless overridden in `index_params`.
const PGVECTO_RS_DEFAULTS: [(&str, &str); 2] = [
    ("optimizing.optimizing_threads", "8"),
    ("segment.max_sealed_segment_size", "5000000"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PgvectoRs;

impl PgvectoRs {
    /// Renders the TOML document passed as `options=$$...$$`.
    ///
    /// Keys under `optimizing.` or `segment.` are top-level settings; any other
    /// key is an HNSW parameter and goes below `[indexing.hnsw]`.
    fn options_document(options: &IndexMap<String, Value>) -> String {
        let is_top_level = |k: &str| k.starts_with("optimizing.") || k.starts_with("segment.");
        let mut top: IndexMap<String, String> = PGVECTO_RS_DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut hnsw = Vec::new();
        for (k, v) in options {
            if is_top_level(k) {
                top.insert(k.clone(), toml_value(v));
            } else {
                hnsw.push(format!("{}={}", k, toml_value(v)));
            }
        }
        let mut doc = String::new();
        for (k, v) in &top {
            doc.push_str(&format!("{}={}\n", k, v));
        }
        doc.push_str("[indexing.hnsw]\n");
        for line in hnsw {
            doc.push_str(&line);
            doc.push('\n');
        }
        doc
    }
}

impl Dialect for PgvectoRs {
    fn variant(&self) -> EngineVariant { EngineVariant::PgvectoRs }

    fn vector_type(&self) -> &'static str { "vecf16" }

    fn distance_operator_for(&self, metric: &str) -> Option<&'static str> {
        match normalize_metric(metric).as_str() {
            "l2" => Some("vecf16_l2_ops"),
            "cosine" => Some("vecf16_cos_ops"),
            "dot" => Some("vecf16_dot_ops"),
            _ => None,
        }
    }

    fn build_create_index_statement(
        &self,
        table: &str,
        operator: &str,
        options: &IndexMap<String, Value>,
    ) -> String {
        format!(
            "CREATE INDEX ON {} USING vectors (vector {}) WITH (options=$$\n{}$$);",
            table,
            operator,
            Self::options_document(options)
        )
    }

    fn indexing_status_query(&self) -> &'static str {
        "SELECT COALESCE(bool_or(idx_indexing), false) FROM pg_vector_index_info"
    }
}
