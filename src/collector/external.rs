//! Pluggable collectors, looked up by name.
//!
//! A request names a registered collector and passes it JSON parameters. Each
//! registry entry carries the function merging the outputs of several shards,
//! so federated searches combine them without knowing what they compute.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::collector::Collector;
use crate::document::indexable::DocValue;
use crate::error::{PikeError, Result};
use crate::index::segment::SegmentReader;
use crate::query::definition::CollectorRequest;
use crate::schema::{FieldMap, ValueKind};

/// A collector producing a JSON output.
pub trait ExternalCollector: Collector {
    fn output(&self) -> Value;

    fn as_collector(&mut self) -> &mut dyn Collector;
}

type ExternalFactory = fn(&Value, &FieldMap) -> Result<Box<dyn ExternalCollector>>;
type OutputMerge = fn(&[Value]) -> Value;

/// Registered collectors: name, factory, shard output merge.
pub const EXTERNAL_COLLECTORS: &[(&str, ExternalFactory, OutputMerge)] = &[
    ("count", count, sum_outputs),
    ("max_score", max_score, max_outputs),
    ("sum_long", sum_long, sum_outputs),
];

fn lookup(name: &str) -> Result<&'static (&'static str, ExternalFactory, OutputMerge)> {
    EXTERNAL_COLLECTORS
        .iter()
        .find(|(n, _, _)| *n == name)
        .ok_or_else(|| PikeError::query(format!("Unknown collector: {name}")))
}

/// Instantiate the collector a request names.
pub fn create(request: &CollectorRequest, field_map: &FieldMap) -> Result<Box<dyn ExternalCollector>> {
    let (_, factory, _) = lookup(&request.collector)?;
    factory(&request.params, field_map)
}

/// Combine per-shard outputs of the named collector.
pub fn merge_outputs(name: &str, outputs: &[Value]) -> Result<Value> {
    let (_, _, merge) = lookup(name)?;
    Ok(merge(outputs))
}

fn sum_outputs(outputs: &[Value]) -> Value {
    if outputs.iter().all(|v| v.is_u64() || v.is_null()) {
        json!(outputs.iter().filter_map(Value::as_u64).sum::<u64>())
    } else {
        json!(outputs.iter().filter_map(Value::as_i64).sum::<i64>())
    }
}

fn max_outputs(outputs: &[Value]) -> Value {
    outputs
        .iter()
        .filter_map(Value::as_f64)
        .reduce(f64::max)
        .map_or(Value::Null, |v| json!(v))
}

fn count(_params: &Value, _field_map: &FieldMap) -> Result<Box<dyn ExternalCollector>> {
    Ok(Box::new(CountCollector::default()))
}

fn max_score(_params: &Value, _field_map: &FieldMap) -> Result<Box<dyn ExternalCollector>> {
    Ok(Box::new(MaxScoreCollector::default()))
}

fn sum_long(params: &Value, field_map: &FieldMap) -> Result<Box<dyn ExternalCollector>> {
    let field = params
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| PikeError::query("The sum_long collector needs a \"field\" parameter"))?;
    let instance = field_map.require(field)?;
    if instance.doc_value_kind() != Some(ValueKind::Long) {
        return Err(PikeError::query(format!(
            "The field {field} has no long column"
        )));
    }
    Ok(Box::new(SumLongCollector {
        field: field.to_string(),
        sum: 0,
        segment: None,
    }))
}

/// Number of matches.
#[derive(Debug, Default)]
pub struct CountCollector {
    count: u64,
}

impl Collector for CountCollector {
    fn set_segment(&mut self, _segment: &Arc<SegmentReader>, _doc_base: u64) -> Result<()> {
        Ok(())
    }

    fn collect(&mut self, _doc: u32, _score: f32) -> Result<()> {
        self.count += 1;
        Ok(())
    }
}

impl ExternalCollector for CountCollector {
    fn output(&self) -> Value {
        json!(self.count)
    }

    fn as_collector(&mut self) -> &mut dyn Collector {
        self
    }
}

/// Highest score among the matches.
#[derive(Debug, Default)]
pub struct MaxScoreCollector {
    max: Option<f32>,
}

impl Collector for MaxScoreCollector {
    fn set_segment(&mut self, _segment: &Arc<SegmentReader>, _doc_base: u64) -> Result<()> {
        Ok(())
    }

    fn collect(&mut self, _doc: u32, score: f32) -> Result<()> {
        self.max = Some(self.max.map_or(score, |max| max.max(score)));
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        true
    }
}

impl ExternalCollector for MaxScoreCollector {
    fn output(&self) -> Value {
        self.max.map_or(Value::Null, |max| json!(max))
    }

    fn as_collector(&mut self) -> &mut dyn Collector {
        self
    }
}

/// Sum of a long column over the matches.
#[derive(Debug)]
pub struct SumLongCollector {
    field: String,
    sum: i64,
    segment: Option<Arc<SegmentReader>>,
}

impl Collector for SumLongCollector {
    fn set_segment(&mut self, segment: &Arc<SegmentReader>, _doc_base: u64) -> Result<()> {
        self.segment = Some(Arc::clone(segment));
        Ok(())
    }

    fn collect(&mut self, doc: u32, _score: f32) -> Result<()> {
        if let Some(DocValue::Long(v)) = self.segment.as_ref().and_then(|s| s.doc_value(&self.field, doc)) {
            self.sum = self.sum.wrapping_add(*v);
        }
        Ok(())
    }
}

impl ExternalCollector for SumLongCollector {
    fn output(&self) -> Value {
        json!(self.sum)
    }

    fn as_collector(&mut self) -> &mut dyn Collector {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::catalog::AnalyzerCatalog;
    use crate::schema::{FieldDeclaration, FieldTemplate};

    fn field_map() -> FieldMap {
        FieldMap::compile(
            vec![
                FieldDeclaration::new("qty", FieldTemplate::LongValue),
                FieldDeclaration::new("title", FieldTemplate::Text),
            ],
            AnalyzerCatalog::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_by_name() {
        let map = field_map();
        assert!(create(&CollectorRequest::new("count"), &map).is_ok());
        assert!(create(&CollectorRequest::new("max_score"), &map).unwrap().needs_scores());
        assert!(matches!(
            create(&CollectorRequest::new("histogram"), &map),
            Err(PikeError::Query(_))
        ));
    }

    #[test]
    fn test_sum_long_validates_field() {
        let map = field_map();
        let ok = CollectorRequest::new("sum_long").with_params(json!({"field": "qty"}));
        assert!(create(&ok, &map).is_ok());

        let text = CollectorRequest::new("sum_long").with_params(json!({"field": "title"}));
        assert!(create(&text, &map).is_err());
        assert!(create(&CollectorRequest::new("sum_long"), &map).is_err());
    }

    #[test]
    fn test_merge_outputs() {
        assert_eq!(merge_outputs("count", &[json!(2), json!(5)]).unwrap(), json!(7));
        assert_eq!(merge_outputs("sum_long", &[json!(-2), json!(5)]).unwrap(), json!(3));
        assert_eq!(
            merge_outputs("max_score", &[Value::Null, json!(1.5), json!(0.5)]).unwrap(),
            json!(1.5)
        );
        assert_eq!(merge_outputs("max_score", &[Value::Null]).unwrap(), Value::Null);
    }
}
