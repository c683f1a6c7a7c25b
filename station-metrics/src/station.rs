use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Clone)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> StationId {
        StationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for StationId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// Divvy publishes uuid-like string ids but other GBFS systems publish plain integers, and the
/// warehouse returns whatever was loaded. Both forms become the same string id.
impl<'de> Deserialize<'de> for StationId {
    fn deserialize<D>(deserializer: D) -> Result<StationId, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StringOrInt;

        impl<'de> serde::de::Visitor<'de> for StringOrInt {
            type Value = StationId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("string or int")
            }

            fn visit_str<E>(self, string: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let trimmed = string.trim();
                if trimmed.is_empty() {
                    return Err(E::invalid_value(serde::de::Unexpected::Str(string), &self));
                }
                Ok(StationId(trimmed.to_owned()))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(StationId(v.to_string()))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(StationId(v.to_string()))
            }
        }

        deserializer.deserialize_any(StringOrInt)
    }
}

/// One physical station as of one load cycle.
///
/// The counts and static attributes come from a data source, the `out_of_service_*` and
/// `*_utilization` columns are always recomputed by [`crate::derivation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub station_id: StationId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub capacity: u32,
    pub num_bikes_available: u32,
    pub num_docks_available: u32,
    pub out_of_service_bikes: u32,
    pub bike_utilization: f64,
    pub dock_utilization: f64,
    pub out_of_service_ratio: f64,
    pub last_reported: DateTime<Utc>,
}

impl StationRecord {
    /// A record with only the sourced columns filled in, derived columns are zero until the
    /// record goes through [`crate::derivation::derive`].
    pub fn from_counts(
        station_id: StationId,
        name: String,
        (lat, lon): (f64, f64),
        capacity: u32,
        (num_bikes_available, num_docks_available): (u32, u32),
        last_reported: DateTime<Utc>,
    ) -> StationRecord {
        StationRecord {
            station_id,
            name,
            lat,
            lon,
            capacity,
            num_bikes_available,
            num_docks_available,
            out_of_service_bikes: 0,
            bike_utilization: 0.,
            dock_utilization: 0.,
            out_of_service_ratio: 0.,
            last_reported,
        }
    }
}

/// Ordered stations, unique by `station_id`. Every transformation builds a new table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationTable {
    records: Vec<StationRecord>,
    index: HashMap<StationId, usize>,
}

impl StationTable {
    /// Builds a table in input order. When a `station_id` repeats the first record wins, so
    /// `table.len()` may be less than the number of records passed in.
    pub fn from_records(records: impl IntoIterator<Item = StationRecord>) -> StationTable {
        let mut table = StationTable::default();
        for record in records {
            if table.index.contains_key(&record.station_id) {
                continue;
            }
            table
                .index
                .insert(record.station_id.clone(), table.records.len());
            table.records.push(record);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StationRecord> {
        self.records.iter()
    }

    pub fn get(&self, station_id: &StationId) -> Option<&StationRecord> {
        self.index.get(station_id).map(|&idx| &self.records[idx])
    }

    pub fn map(&self, f: impl Fn(&StationRecord) -> StationRecord) -> StationTable {
        StationTable::from_records(self.records.iter().map(f))
    }

    pub fn filter(&self, predicate: impl Fn(&StationRecord) -> bool) -> StationTable {
        StationTable::from_records(self.records.iter().filter(|r| predicate(r)).cloned())
    }

    /// The freshest `last_reported` in the table
    pub fn last_reported(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.last_reported).max()
    }
}

impl<'t> IntoIterator for &'t StationTable {
    type Item = &'t StationRecord;
    type IntoIter = std::slice::Iter<'t, StationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Serialize for StationTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(&self.records)
    }
}

#[cfg(test)]
pub(crate) fn record(id: &str, capacity: u32, bikes: u32, docks: u32) -> StationRecord {
    use chrono::TimeZone;
    StationRecord::from_counts(
        StationId::new(id),
        format!("Station {}", id),
        (41.88, -87.63),
        capacity,
        (bikes, docks),
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    )
}
