use std::io::Write;

use serde::Serialize;

use crate::data::osm::NormalizedRecord;
use crate::errors::Result;

/// Where normalized records go as soon as they are built.
pub trait RecordSink {
    fn accept(&mut self, record: NormalizedRecord) -> Result<()>;
}

impl RecordSink for Vec<NormalizedRecord> {
    fn accept(&mut self, record: NormalizedRecord) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Writes one JSON document per record, each followed by a newline.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W, pretty: bool) -> Self {
        JsonLinesSink {
            writer,
            pretty,
        }
    }

    /// Writes any serializable value with the same layout as the records.
    pub fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, value)?;
        } else {
            serde_json::to_writer(&mut self.writer, value)?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn accept(&mut self, record: NormalizedRecord) -> Result<()> {
        self.write_value(&record)
    }
}
