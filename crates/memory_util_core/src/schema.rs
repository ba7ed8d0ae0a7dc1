//! Analytics table layout the delivery stream converts records into.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Int,
    BigInt,
    Float,
    Double,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

const fn column(name: &'static str, column_type: ColumnType) -> Column {
    Column { name, column_type }
}

pub const COLUMNS: [Column; 11] = [
    column("function_name", ColumnType::String),
    column("log_group_name", ColumnType::String),
    column("architecture", ColumnType::String),
    column("provisioned_memory_mb", ColumnType::Int),
    column("min_memory_used_mb", ColumnType::Int),
    column("avg_memory_used_mb", ColumnType::Float),
    column("max_memory_used_mb", ColumnType::Int),
    column("over_provisioned_memory_mb", ColumnType::Int),
    column("avg_billed_duration_ms", ColumnType::Float),
    column("invocations", ColumnType::BigInt),
    column("potential_savings", ColumnType::Double),
];

pub const PARTITION_KEYS: [Column; 1] = [column("metric_collection_date", ColumnType::Date)];

#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub columns: &'static [Column],
    pub partition_keys: &'static [Column],
}

pub fn table_schema() -> TableSchema {
    TableSchema {
        columns: &COLUMNS,
        partition_keys: &PARTITION_KEYS,
    }
}
