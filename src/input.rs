use crate::ledger::balance::{Balance, Metadata};
use crate::ledger::OwnerId;
use crate::money::{serde_money, Amount};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("malformed CSV: {0}")]
    Csv(String), // CSV is malformed

    #[error("invalid balance: {0}")]
    Format(String), // Data format is incorrect
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

impl From<<BalanceRecord as TryInto<Balance>>::Error> for Error {
    fn from(err: <BalanceRecord as TryInto<Balance>>::Error) -> Self {
        Self::Format(err.to_string())
    }
}

// I have a BalanceRecord type because the backend format is nowhere near the
// "domain" type, i.e. Balance: ids are numbers or strings, amounts are
// numbers, strings or null, dates come in several formats.
//
// The same record is used for the JSON API and for CSV exports of it, so
// both share the exact same field names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BalanceRecord {
    #[serde(rename = "id_saldos", default, deserialize_with = "lenient::opt_text")]
    pub id: Option<String>,

    #[serde(rename = "id_agente", default, deserialize_with = "lenient::opt_text")]
    pub owner_id: Option<String>,

    #[serde(rename = "monto", default, deserialize_with = "serde_money::deserialize")]
    pub amount: Amount,

    #[serde(rename = "saldo", default, deserialize_with = "serde_money::deserialize")]
    pub remaining: Amount,

    #[serde(
        rename = "monto_por_facturar",
        default,
        deserialize_with = "serde_money::deserialize"
    )]
    pub billable: Amount,

    #[serde(rename = "fecha_creacion", default, deserialize_with = "lenient::opt_text")]
    pub created_at: Option<String>,

    #[serde(rename = "activo", default = "lenient::active_by_default", deserialize_with = "lenient::active")]
    pub active: bool,

    #[serde(rename = "metodo_pago", default, deserialize_with = "lenient::opt_text")]
    pub payment_method: Option<String>,

    #[serde(rename = "referencia", default, deserialize_with = "lenient::opt_text")]
    pub reference: Option<String>,

    #[serde(rename = "comentario", default, deserialize_with = "lenient::opt_text")]
    pub comment: Option<String>,

    #[serde(rename = "tipo_tarjeta", default, deserialize_with = "lenient::opt_text")]
    pub card_type: Option<String>,
}

impl TryFrom<BalanceRecord> for Balance {
    type Error = &'static str;
    fn try_from(record: BalanceRecord) -> Result<Self, Self::Error> {
        let id = match record.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => return Err("missing balance id"),
        };

        Ok(Self {
            id,
            owner_id: record.owner_id.unwrap_or_default(),
            original_amount: record.amount,
            remaining_amount: record.remaining,
            billable_amount: record.billable,
            created_at: record.created_at.as_deref().and_then(parse_created_at),
            is_active: record.active,
            metadata: Metadata {
                payment_method: record.payment_method,
                reference: record.reference,
                card_type: record.card_type,
                comment: record.comment,
            },
        })
    }
}

/// Dates we can't read are treated as missing, so the balance is used last.
pub fn parse_created_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.naive_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Records that don't say who owns them belong to `owner_id`. Balances owned
/// by someone else are dropped.
pub fn assign_owner(mut balance: Balance, owner_id: &str) -> Option<Balance> {
    if balance.owner_id.is_empty() {
        balance.owner_id = OwnerId::from(owner_id);
    }

    if balance.owner_id != owner_id {
        tracing::warn!(
            balance_id = %balance.id,
            owner_id = %balance.owner_id,
            expected = owner_id,
            "skipping balance owned by another agent"
        );
        return None;
    }

    Some(balance)
}

/// Turn the records the API returned for an agent into balances.
///
/// Here, we simply skip the records we can't use and keep the others: a broken
/// balance shouldn't prevent the agent from paying with the rest.
pub fn into_balances(records: Vec<BalanceRecord>, owner_id: &str) -> Vec<Balance> {
    records
        .into_iter()
        .filter_map(|record| match Balance::try_from(record) {
            Ok(balance) => assign_owner(balance, owner_id),
            Err(err) => {
                tracing::warn!(error = err, "skipping unusable balance record");
                None
            }
        })
        .collect()
}

// When parsing a CSV file, I'm making the assumption that we want to
// completely abort on errors: it makes sense to fix the file (or the code),
// then try again.
pub fn parse(input: impl std::io::Read) -> Result<Vec<Balance>, Error> {
    let buffered = std::io::BufReader::new(input);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(buffered);

    reader
        .deserialize::<BalanceRecord>()
        .map(convert)
        .collect()
}

// Convert from a csv deserialise result into a balance result.
fn convert(record: Result<BalanceRecord, csv::Error>) -> Result<Balance, Error> {
    Ok(record?.try_into()?)
}

mod lenient {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    pub fn active_by_default() -> bool {
        true
    }

    /// 0/1, booleans, or their string forms. Null means active.
    pub fn active<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        deserializer.deserialize_any(ActiveVisitor)
    }

    /// Text that may have been sent as a number.
    pub fn opt_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        deserializer.deserialize_option(OptTextVisitor)
    }

    struct ActiveVisitor;

    impl<'de> Visitor<'de> for ActiveVisitor {
        type Value = bool;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a boolean, 0 or 1")
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> Result<bool, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<bool, E> {
            Ok(value != 0)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<bool, E> {
            Ok(value != 0)
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<bool, E> {
            Ok(value != 0.0)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<bool, E> {
            match value.trim().to_lowercase().as_str() {
                "" | "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(true)
        }

        fn visit_none<E: de::Error>(self) -> Result<bool, E> {
            Ok(true)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<bool, D::Error> {
            deserializer.deserialize_any(ActiveVisitor)
        }
    }

    struct OptTextVisitor;

    impl<'de> Visitor<'de> for OptTextVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a number")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()).filter(|v| !v.is_empty()))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_any(OptTextVisitor)
        }
    }
}
