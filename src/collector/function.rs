//! Min/max aggregation over a sortable field.

use std::sync::Arc;

use crate::collector::Collector;
use crate::document::field_value::FieldValue;
use crate::document::indexable::SortValue;
use crate::error::{PikeError, Result};
use crate::index::segment::SegmentReader;
use crate::query::definition::{FunctionKind, FunctionRequest};
use crate::query::result::FunctionResult;
use crate::schema::{FieldMap, FieldTypeInstance};

/// Tracks the extreme value of one field over the matching documents. The
/// first document holding the extreme wins ties. A field without a sort key
/// makes the collector a no-op.
#[derive(Debug)]
pub struct FunctionCollector {
    instance: Arc<FieldTypeInstance>,
    function: FunctionKind,
    best: Option<(SortValue, FieldValue)>,
    segment: Option<Arc<SegmentReader>>,
}

impl FunctionCollector {
    pub fn new(request: &FunctionRequest, field_map: &FieldMap) -> Result<Self> {
        let instance = field_map.get(&request.field).ok_or_else(|| {
            PikeError::query(format!(
                "Cannot compute the function {} because the field is unknown: {}",
                request.function.name(),
                request.field
            ))
        })?;
        Ok(FunctionCollector {
            instance: Arc::clone(instance),
            function: request.function,
            best: None,
            segment: None,
        })
    }

    fn improves(&self, key: &SortValue) -> bool {
        match &self.best {
            None => true,
            Some((best, _)) => match self.function {
                FunctionKind::Min => key < best,
                FunctionKind::Max => key > best,
            },
        }
    }

    pub fn result(self) -> FunctionResult {
        let (key, value) = match self.best {
            Some((key, value)) => (Some(key), Some(value.to_json())),
            None => (None, None),
        };
        FunctionResult {
            field: self.instance.name().to_string(),
            function: self.function,
            value,
            key,
        }
    }
}

impl Collector for FunctionCollector {
    fn set_segment(&mut self, segment: &Arc<SegmentReader>, _doc_base: u64) -> Result<()> {
        self.segment = Some(Arc::clone(segment));
        Ok(())
    }

    fn collect(&mut self, doc: u32, _score: f32) -> Result<()> {
        let Some(segment) = &self.segment else {
            return Ok(());
        };
        let Some(value) = segment.doc_value(self.instance.name(), doc) else {
            return Ok(());
        };
        let Some(key) = self.instance.sort_key(value) else {
            return Ok(());
        };
        if self.improves(&key) {
            let display = self.instance.convert(value);
            self.best = Some((key, display));
        }
        Ok(())
    }
}
