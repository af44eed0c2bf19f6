//! Record trait and lifecycle helpers
//!
//! A record is a serde struct with a flattened [`RecordMeta`]. Its map view
//! (`to_map` / `from_map`) is what crosses the backend boundary; `save`,
//! `delete` and `get_by_id` bridge one instance to the backend contract.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::orm::backend::{Backend, RecordMap};
use crate::orm::error::{OrmError, OrmResult};
use crate::orm::query::QueryBuilder;

/// Identity and timestamps shared by every record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

pub trait Record: Serialize + DeserializeOwned + Sized {
    /// Identifier of the record type at the backend (table or label)
    const RECORD_TYPE: &'static str;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn id(&self) -> Option<i64> {
        self.meta().id
    }

    /// Field-name to value view, optionally without null fields
    fn to_map(&self, exclude_none: bool) -> OrmResult<RecordMap> {
        let mut map = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            other => {
                return Err(OrmError::Validation(format!(
                    "{} serialized to {} instead of a map",
                    Self::RECORD_TYPE,
                    other
                )))
            }
        };
        if exclude_none {
            map.retain(|_, value| !value.is_null());
        }
        Ok(map)
    }

    /// Rebuild a record from its map view
    fn from_map(map: RecordMap) -> OrmResult<Self> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    fn query(backend: &dyn Backend) -> QueryBuilder<'_, Self> {
        QueryBuilder::new(backend)
    }

    /// Insert when the record has no identity yet, otherwise update it.
    ///
    /// Both timestamps are stamped on insert; only `updated_at` on update. If
    /// the backend call fails the metadata is left as it was.
    fn save(&mut self, backend: &dyn Backend) -> OrmResult<()> {
        let previous = self.meta().clone();
        let now = Utc::now();

        let result = match previous.id {
            None => {
                let meta = self.meta_mut();
                meta.created_at = Some(now);
                meta.updated_at = Some(now);
                self.to_map(false)
                    .and_then(|map| backend.insert(Self::RECORD_TYPE, &map))
                    .map(|id| self.meta_mut().id = Some(id))
            }
            Some(id) => {
                self.meta_mut().updated_at = Some(now);
                self.to_map(false)
                    .and_then(|map| backend.update(Self::RECORD_TYPE, id, &map))
            }
        };

        if result.is_err() {
            *self.meta_mut() = previous;
        }
        result
    }

    /// Remove the record. Does nothing if it was never persisted.
    fn delete(&self, backend: &dyn Backend) -> OrmResult<()> {
        match self.id() {
            Some(id) => backend.delete(Self::RECORD_TYPE, id),
            None => Ok(()),
        }
    }

    fn get_by_id(backend: &dyn Backend, id: i64) -> OrmResult<Option<Self>> {
        backend
            .get_by_id(Self::RECORD_TYPE, id)?
            .map(Self::from_map)
            .transpose()
    }
}
