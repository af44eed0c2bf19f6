#![allow(dead_code)]

use aerodata::orm::error::{BackendError, OrmResult};
use aerodata::{Backend, Filter, QueryIntent, RecordMap};
use std::sync::Mutex;

/// One call received by the recording backend
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Execute { record_type: String, intent: QueryIntent },
    Count { record_type: String, filters: Vec<Filter> },
    GetById { record_type: String, id: i64 },
    Insert { record_type: String, data: RecordMap },
    Update { record_type: String, id: i64, data: RecordMap },
    Delete { record_type: String, id: i64 },
}

/// Backend that records every call and answers from canned data
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Mutex<Vec<Call>>,
    pub rows: Vec<RecordMap>,
    pub count: u64,
    pub next_id: Mutex<i64>,
    pub fail_writes: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Self::default()
        }
    }

    pub fn with_rows(rows: Vec<RecordMap>) -> Self {
        Self {
            rows,
            ..Self::new()
        }
    }

    pub fn with_count(count: u64) -> Self {
        Self {
            count,
            ..Self::new()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_write(&self) -> OrmResult<()> {
        if self.fail_writes {
            Err(BackendError::Constraint("rejected by test backend".into()).into())
        } else {
            Ok(())
        }
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn connect(&self) -> OrmResult<()> {
        Ok(())
    }

    fn disconnect(&self) -> OrmResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn execute_query(&self, record_type: &str, intent: &QueryIntent) -> OrmResult<Vec<RecordMap>> {
        self.record(Call::Execute {
            record_type: record_type.to_string(),
            intent: intent.clone(),
        });
        let rows = self.rows.iter().skip(intent.offset.unwrap_or(0));
        Ok(match intent.limit {
            Some(limit) => rows.take(limit).cloned().collect(),
            None => rows.cloned().collect(),
        })
    }

    fn count_query(&self, record_type: &str, filters: &[Filter]) -> OrmResult<u64> {
        self.record(Call::Count {
            record_type: record_type.to_string(),
            filters: filters.to_vec(),
        });
        Ok(self.count)
    }

    fn get_by_id(&self, record_type: &str, id: i64) -> OrmResult<Option<RecordMap>> {
        self.record(Call::GetById {
            record_type: record_type.to_string(),
            id,
        });
        Ok(self
            .rows
            .iter()
            .find(|row| row.get("id").and_then(|v| v.as_i64()) == Some(id))
            .cloned())
    }

    fn insert(&self, record_type: &str, data: &RecordMap) -> OrmResult<i64> {
        self.record(Call::Insert {
            record_type: record_type.to_string(),
            data: data.clone(),
        });
        self.check_write()?;
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        Ok(id)
    }

    fn update(&self, record_type: &str, id: i64, data: &RecordMap) -> OrmResult<()> {
        self.record(Call::Update {
            record_type: record_type.to_string(),
            id,
            data: data.clone(),
        });
        self.check_write()
    }

    fn delete(&self, record_type: &str, id: i64) -> OrmResult<()> {
        self.record(Call::Delete {
            record_type: record_type.to_string(),
            id,
        });
        self.check_write()
    }
}

pub fn map(value: serde_json::Value) -> RecordMap {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
