//! Records, batches, and the per-cycle batch maker.
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Metadata attached to every record
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHeader {
    /// Where in the source the record came from (e.g. `file::position`)
    pub source_id: String,
    /// Instance name of the stage that created the record
    pub stage_creator: String,
    pub attributes: BTreeMap<String, String>,
}

/// Unit of data flowing through a pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    header: RecordHeader,
    value: Value,
}

impl Record {
    pub fn new(source_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            header: RecordHeader {
                source_id: source_id.into(),
                ..RecordHeader::default()
            },
            value: value.into(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.attributes.insert(name.into(), value.into());
        self
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// A record a stage rejected, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub record: Record,
    /// Instance name of the rejecting stage
    pub stage: String,
    pub message: String,
}

/// Ordered records of one production cycle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    source_offset: String,
    records: Vec<Record>,
}

impl Batch {
    pub fn new(source_offset: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            source_offset: source_offset.into(),
            records,
        }
    }

    /// Offset the batch was produced from
    pub fn source_offset(&self) -> &str {
        &self.source_offset
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Append-only collector for the output of one stage in one cycle.
///
/// The batch maker does not enforce a size limit; origins stop reading once
/// they reach the requested batch size.
#[derive(Debug)]
pub struct BatchMaker {
    instance_name: String,
    records: Vec<Record>,
    error_records: Vec<ErrorRecord>,
}

impl BatchMaker {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            records: Vec::new(),
            error_records: Vec::new(),
        }
    }

    /// Instance name of the stage filling this batch maker
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Append a record; stamps the creating stage if the record has none
    pub fn add(&mut self, mut record: Record) {
        if record.header.stage_creator.is_empty() {
            record.header.stage_creator = self.instance_name.clone();
        }
        self.records.push(record);
    }

    /// Route a record to the error stream instead of the output
    pub fn to_error(&mut self, record: Record, message: impl Into<String>) {
        self.error_records.push(ErrorRecord {
            record,
            stage: self.instance_name.clone(),
            message: message.into(),
        });
    }

    /// Records collected so far, in insertion order
    pub fn get_stage_output(&self) -> &[Record] {
        &self.records
    }

    pub fn error_records(&self) -> &[ErrorRecord] {
        &self.error_records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the batch maker into the batch for the next stage and the rejected records
    pub fn into_batch(self, source_offset: impl Into<String>) -> (Batch, Vec<ErrorRecord>) {
        (Batch::new(source_offset, self.records), self.error_records)
    }
}
