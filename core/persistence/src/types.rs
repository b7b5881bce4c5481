use bigdecimal::{BigDecimal, Zero};
use diesel::backend::Backend;
use diesel::deserialize::{FromSql, Result as DeserializeResult};
use diesel::serialize::{Output, Result as SerializeResult, ToSql};
use diesel::sql_types::Text;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::io::Write;
use std::ops::Add;
use std::str::FromStr;

/// Decimal amount persisted as text, so no precision is lost in SQLite.
/// Serialized to JSON as a string; deserialization accepts strings and numbers.
#[derive(Debug, Clone, AsExpression, FromSqlRow, Default, PartialEq, PartialOrd, Eq, Ord)]
#[sql_type = "Text"]
pub struct BigDecimalField(pub BigDecimal);

impl BigDecimalField {
    pub fn is_negative(&self) -> bool {
        self.0 < BigDecimal::zero()
    }
}

impl From<BigDecimalField> for BigDecimal {
    fn from(x: BigDecimalField) -> Self {
        x.0
    }
}

impl From<BigDecimal> for BigDecimalField {
    fn from(x: BigDecimal) -> Self {
        Self(x)
    }
}

impl From<u32> for BigDecimalField {
    fn from(x: u32) -> Self {
        Self(BigDecimal::from(x))
    }
}

impl FromStr for BigDecimalField {
    type Err = bigdecimal::ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(BigDecimal::from_str(s.trim())?))
    }
}

impl Display for BigDecimalField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<DB> ToSql<Text, DB> for BigDecimalField
where
    DB: Backend,
    String: ToSql<Text, DB>,
{
    fn to_sql<W: Write>(&self, out: &mut Output<W, DB>) -> SerializeResult {
        let s = self.0.to_string();
        s.to_sql(out)
    }
}

impl<DB> FromSql<Text, DB> for BigDecimalField
where
    DB: Backend,
    String: FromSql<Text, DB>,
{
    fn from_sql(bytes: Option<&DB::RawValue>) -> DeserializeResult<Self> {
        let s = String::from_sql(bytes)?;
        match BigDecimal::from_str(&s) {
            Ok(x) => Ok(BigDecimalField(x)),
            Err(e) => Err(e.into()),
        }
    }
}

impl Serialize for BigDecimalField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

struct BigDecimalVisitor;

impl<'de> Visitor<'de> for BigDecimalVisitor {
    type Value = BigDecimalField;

    fn expecting(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("a decimal number or a string containing one")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        BigDecimalField::from_str(v).map_err(|e| E::custom(format!("invalid decimal '{}': {}", v, e)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(BigDecimalField(BigDecimal::from(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(BigDecimalField(BigDecimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        // Goes through the shortest round-trip text form, not the binary expansion.
        self.visit_str(&v.to_string())
    }
}

impl<'de> Deserialize<'de> for BigDecimalField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(BigDecimalVisitor)
    }
}

pub trait Summable {
    fn sum(self) -> BigDecimalField;
}

impl<T> Summable for T
where
    T: IntoIterator,
    T::Item: Into<BigDecimal>,
{
    fn sum(self) -> BigDecimalField {
        self.into_iter()
            .map(Into::into)
            .fold(BigDecimal::zero(), <BigDecimal as Add<BigDecimal>>::add)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("\"10.25\"", "10.25" ; "string")]
    #[test_case("7", "7" ; "integer")]
    #[test_case("0.1", "0.1" ; "float keeps short form")]
    fn test_deserialize_decimal(json: &str, expected: &str) {
        let value: BigDecimalField = serde_json::from_str(json).unwrap();
        assert_eq!(value, BigDecimalField::from_str(expected).unwrap());
    }

    #[test]
    fn test_sum_keeps_precision() {
        let parts = ["0.1", "0.2", "1000000000000.005"]
            .iter()
            .map(|part| BigDecimalField::from_str(part).unwrap());
        assert_eq!(Summable::sum(parts).to_string(), "1000000000000.305");
    }

    #[test]
    fn test_serialize_as_string() {
        let value = BigDecimalField::from_str("12.50").unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"12.50\"");
    }
}
