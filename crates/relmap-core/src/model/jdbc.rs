//! Object/relational type mapping descriptors.

use std::fmt;
use std::sync::Arc;

/// SQL-level type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JdbcType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Real,
    Double,
    Char,
    Varchar,
    Text,
    Binary,
    Date,
    Time,
    Timestamp,
    Uuid,
    Json,
    /// Array column of the given element type (e.g. `text[]`).
    Array(&'static JdbcType),
}

impl JdbcType {
    pub fn sql_name(&self) -> String {
        match self {
            JdbcType::Array(element) => format!("ARRAY<{}>", element.sql_name()),
            other => other.scalar_name().to_string(),
        }
    }

    fn scalar_name(&self) -> &'static str {
        match self {
            JdbcType::Boolean => "BOOLEAN",
            JdbcType::SmallInt => "SMALLINT",
            JdbcType::Integer => "INTEGER",
            JdbcType::BigInt => "BIGINT",
            JdbcType::Decimal => "DECIMAL",
            JdbcType::Real => "REAL",
            JdbcType::Double => "DOUBLE",
            JdbcType::Char => "CHAR",
            JdbcType::Varchar => "VARCHAR",
            JdbcType::Text => "TEXT",
            JdbcType::Binary => "BINARY",
            JdbcType::Date => "DATE",
            JdbcType::Time => "TIME",
            JdbcType::Timestamp => "TIMESTAMP",
            JdbcType::Uuid => "UUID",
            JdbcType::Json => "JSON",
            JdbcType::Array(_) => "ARRAY",
        }
    }

    /// Parse a type name case-insensitively; arrays as `ARRAY<VARCHAR>`.
    pub fn from_name(name: &str) -> Option<JdbcType> {
        let up = name.trim().to_ascii_uppercase();
        if let Some(inner) = up
            .strip_prefix("ARRAY<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return scalar_ref(inner.trim()).map(JdbcType::Array);
        }
        scalar_ref(&up).copied()
    }

    pub fn is_array(&self) -> bool {
        matches!(self, JdbcType::Array(_))
    }

    pub fn element_type(&self) -> Option<JdbcType> {
        match self {
            JdbcType::Array(element) => Some(**element),
            _ => None,
        }
    }

    /// Host value type conventionally carried by this SQL type.
    pub fn default_value_type(&self) -> String {
        match self {
            JdbcType::Boolean => "bool".into(),
            JdbcType::SmallInt => "i16".into(),
            JdbcType::Integer => "i32".into(),
            JdbcType::BigInt => "i64".into(),
            JdbcType::Real => "f32".into(),
            JdbcType::Double => "f64".into(),
            JdbcType::Char => "char".into(),
            JdbcType::Binary => "Vec<u8>".into(),
            JdbcType::Decimal
            | JdbcType::Varchar
            | JdbcType::Text
            | JdbcType::Date
            | JdbcType::Time
            | JdbcType::Timestamp
            | JdbcType::Uuid
            | JdbcType::Json => "String".into(),
            JdbcType::Array(element) => format!("Vec<{}>", element.default_value_type()),
        }
    }
}

fn scalar_ref(name: &str) -> Option<&'static JdbcType> {
    let ty: &'static JdbcType = match name {
        "BOOLEAN" | "BOOL" => &JdbcType::Boolean,
        "SMALLINT" => &JdbcType::SmallInt,
        "INTEGER" | "INT" => &JdbcType::Integer,
        "BIGINT" => &JdbcType::BigInt,
        "DECIMAL" | "NUMERIC" => &JdbcType::Decimal,
        "REAL" => &JdbcType::Real,
        "DOUBLE" => &JdbcType::Double,
        "CHAR" => &JdbcType::Char,
        "VARCHAR" => &JdbcType::Varchar,
        "TEXT" => &JdbcType::Text,
        "BINARY" | "VARBINARY" => &JdbcType::Binary,
        "DATE" => &JdbcType::Date,
        "TIME" => &JdbcType::Time,
        "TIMESTAMP" => &JdbcType::Timestamp,
        "UUID" => &JdbcType::Uuid,
        "JSON" => &JdbcType::Json,
        _ => return None,
    };
    Some(ty)
}

impl fmt::Display for JdbcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_name())
    }
}

/// Describes how a host value maps onto a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JdbcMapping {
    jdbc_type: JdbcType,
    value_type: Arc<str>,
}

impl JdbcMapping {
    pub fn new(jdbc_type: JdbcType) -> Self {
        Self {
            value_type: Arc::from(jdbc_type.default_value_type()),
            jdbc_type,
        }
    }

    pub fn with_value_type(jdbc_type: JdbcType, value_type: &str) -> Self {
        Self {
            jdbc_type,
            value_type: Arc::from(value_type),
        }
    }

    pub fn jdbc_type(&self) -> JdbcType {
        self.jdbc_type
    }

    pub fn value_type(&self) -> &str {
        &self.value_type
    }
}

impl From<JdbcType> for JdbcMapping {
    fn from(jdbc_type: JdbcType) -> Self {
        JdbcMapping::new(jdbc_type)
    }
}

impl fmt::Display for JdbcMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.value_type, self.jdbc_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_type() {
        let ty = JdbcType::Array(&JdbcType::Varchar);
        assert!(ty.is_array());
        assert_eq!(ty.element_type(), Some(JdbcType::Varchar));
        assert_eq!(ty.to_string(), "ARRAY<VARCHAR>");
        assert_eq!(JdbcMapping::new(ty).value_type(), "Vec<String>");
    }

    #[test]
    fn test_from_name() {
        assert_eq!(JdbcType::from_name("bigint"), Some(JdbcType::BigInt));
        assert_eq!(
            JdbcType::from_name("array<varchar>"),
            Some(JdbcType::Array(&JdbcType::Varchar))
        );
        assert_eq!(JdbcType::from_name("geometry"), None);
        assert_eq!(JdbcType::from_name("ARRAY<ARRAY<INT>>"), None);
    }

    #[test]
    fn test_mapping_display() {
        let mapping = JdbcMapping::with_value_type(JdbcType::Integer, "u16");
        assert_eq!(mapping.to_string(), "u16 <-> INTEGER");
        assert_eq!(JdbcMapping::from(JdbcType::BigInt).value_type(), "i64");
    }
}
