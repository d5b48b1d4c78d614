//! Serde adapters for calendar dates (`YYYY-MM-DD`).

use serde::{Deserialize, Deserializer, Serializer};
use time::{format_description::FormatItem, macros::format_description, Date};

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn format_date(date: Date) -> Result<String, time::error::Format> {
    date.format(DATE_FORMAT)
}

pub fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw, DATE_FORMAT)
}

pub mod iso_date {
    use super::*;

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        let raw = format_date(*date).map_err(serde::ser::Error::custom)?;
        s.serialize_str(&raw)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(d)?;
        parse_date(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::super::*;

        pub fn serialize<S: Serializer>(date: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => super::serialize(d, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|raw| parse_date(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use time::macros::date;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "iso_date")]
        day: Date,
        #[serde(default, with = "iso_date::option")]
        maybe: Option<Date>,
    }

    #[test]
    fn dates_use_calendar_strings() {
        let h = Holder {
            day: date!(2024 - 02 - 29),
            maybe: None,
        };
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, r#"{"day":"2024-02-29","maybe":null}"#);
    }

    #[test]
    fn missing_optional_date_defaults_to_none() {
        let h: Holder = serde_json::from_str(r#"{"day":"1995-07-04"}"#).unwrap();
        assert_eq!(h.day, date!(1995 - 07 - 04));
        assert_eq!(h.maybe, None);
    }

    #[test]
    fn invalid_date_is_rejected() {
        assert!(serde_json::from_str::<Holder>(r#"{"day":"1995-13-40"}"#).is_err());
    }
}
