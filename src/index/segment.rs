//! Immutable segments and their per-commit views.
//!
//! A segment is written once by [`SegmentBuilder`] (or by merging) and never
//! changes. Deletions and value-only updates are recorded in separate
//! generation-numbered files and applied by [`SegmentReader`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bit_vec::BitVec;
use serde::{Deserialize, Serialize};

use crate::document::document::ID_FIELD;
use crate::document::field_value::FieldValue;
use crate::document::indexable::{DocValue, IndexableField};
use crate::error::{PikeError, Result};
use crate::index::file_format::{self, DELETES_MAGIC, SEGMENT_MAGIC, VALUES_MAGIC};
use crate::index::manifest::SegmentMeta;
use crate::storage::Storage;

/// One document in a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: u32,
    pub freq: u32,
}

/// One field of a document rewritten by a value-only update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedValue {
    pub column: DocValue,
    /// Replaces the stored value; `None` when the field is not stored.
    pub stored: Option<FieldValue>,
}

impl UpdatedValue {
    pub fn column(column: DocValue) -> Self {
        UpdatedValue { column, stored: None }
    }
}

/// Values written by value-only updates: field to doc to value.
pub type ValueOverlay = BTreeMap<String, BTreeMap<u32, UpdatedValue>>;

/// The content of one segment file. Per-document vectors are indexed by the
/// segment-local doc id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentData {
    pub ids: Vec<String>,

    /// field -> term -> postings sorted by doc
    pub postings: BTreeMap<String, BTreeMap<Vec<u8>, Vec<Posting>>>,

    /// Token count per doc, for tokenized fields.
    pub norms: BTreeMap<String, Vec<u32>>,

    /// (value, doc) sorted by value then doc.
    pub points: BTreeMap<String, Vec<(i64, u32)>>,

    pub doc_values: BTreeMap<String, Vec<Option<DocValue>>>,

    /// dim -> doc -> labels
    pub facets: BTreeMap<String, Vec<Vec<String>>>,

    pub stored: Vec<BTreeMap<String, FieldValue>>,
}

fn add_posting(list: &mut Vec<Posting>, doc: u32) {
    match list.last_mut() {
        Some(last) if last.doc == doc => last.freq += 1,
        _ => list.push(Posting { doc, freq: 1 }),
    }
}

impl SegmentData {
    fn len(&self) -> usize {
        self.ids.len()
    }

    /// Pad every per-document vector to the document count and sort points.
    fn seal(&mut self) {
        let len = self.len();
        for lengths in self.norms.values_mut() {
            lengths.resize(len, 0);
        }
        for values in self.doc_values.values_mut() {
            values.resize(len, None);
        }
        for labels in self.facets.values_mut() {
            labels.resize(len, Vec::new());
        }
        for points in self.points.values_mut() {
            points.sort_unstable();
        }
        for terms in self.postings.values_mut() {
            terms.retain(|_, list| !list.is_empty());
        }
        self.postings.retain(|_, terms| !terms.is_empty());
    }

    /// Merge the live documents of `readers`, in order, into one segment.
    /// Value overlays are folded into the columns and the stored values.
    pub fn merge(readers: &[Arc<SegmentReader>]) -> SegmentData {
        let mut merged = SegmentData::default();

        for reader in readers {
            let data = reader.data();
            let start = merged.len();
            let mut remap: Vec<Option<u32>> = vec![None; data.len()];
            for doc in 0..data.len() as u32 {
                if reader.is_live(doc) {
                    remap[doc as usize] = Some(merged.ids.len() as u32);
                    merged.ids.push(data.ids[doc as usize].clone());
                    let mut stored = data.stored[doc as usize].clone();
                    for (field, value) in reader.overlay_values(doc) {
                        stored.insert(field.clone(), value.clone());
                    }
                    merged.stored.push(stored);
                }
            }

            for (field, terms) in &data.postings {
                let target = merged.postings.entry(field.clone()).or_default();
                for (term, list) in terms {
                    let out = target.entry(term.clone()).or_default();
                    out.extend(list.iter().filter_map(|p| {
                        remap[p.doc as usize].map(|doc| Posting { doc, freq: p.freq })
                    }));
                }
            }

            for (field, lengths) in &data.norms {
                let target = merged.norms.entry(field.clone()).or_default();
                target.resize(start, 0);
                target.extend(
                    lengths
                        .iter()
                        .enumerate()
                        .filter(|(doc, _)| remap[*doc].is_some())
                        .map(|(_, len)| *len),
                );
            }

            for (field, points) in &data.points {
                let target = merged.points.entry(field.clone()).or_default();
                target.extend(
                    points
                        .iter()
                        .filter_map(|(value, doc)| remap[*doc as usize].map(|d| (*value, d))),
                );
            }

            let columns: BTreeSet<&String> = data
                .doc_values
                .keys()
                .chain(reader.overlay().keys())
                .collect();
            for field in columns {
                let target = merged.doc_values.entry(field.clone()).or_default();
                target.resize(start, None);
                for doc in 0..data.len() as u32 {
                    if remap[doc as usize].is_some() {
                        target.push(reader.doc_value(field, doc).cloned());
                    }
                }
            }

            for (dim, labels) in &data.facets {
                let target = merged.facets.entry(dim.clone()).or_default();
                target.resize(start, Vec::new());
                target.extend(
                    labels
                        .iter()
                        .enumerate()
                        .filter(|(doc, _)| remap[*doc].is_some())
                        .map(|(_, l)| l.clone()),
                );
            }
        }

        merged.seal();
        merged
    }
}

/// Accumulates encoded documents into a new segment.
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    data: SegmentData,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.ids.is_empty()
    }

    /// Append one document and return its segment-local doc id.
    pub fn add_document(&mut self, identity: &str, fields: &[IndexableField]) -> u32 {
        let doc = self.data.ids.len() as u32;
        let data = &mut self.data;
        data.ids.push(identity.to_string());
        data.stored.push(BTreeMap::new());

        add_posting(
            data.postings
                .entry(ID_FIELD.to_string())
                .or_default()
                .entry(identity.as_bytes().to_vec())
                .or_default(),
            doc,
        );

        for field in fields {
            match field {
                IndexableField::Tokens { field, terms } => {
                    let postings = data.postings.entry(field.clone()).or_default();
                    for term in terms {
                        add_posting(postings.entry(term.as_bytes().to_vec()).or_default(), doc);
                    }
                    let lengths = data.norms.entry(field.clone()).or_default();
                    lengths.resize(doc as usize + 1, 0);
                    lengths[doc as usize] += terms.len() as u32;
                }
                IndexableField::Term { field, term } => {
                    add_posting(
                        data.postings
                            .entry(field.clone())
                            .or_default()
                            .entry(term.clone())
                            .or_default(),
                        doc,
                    );
                }
                IndexableField::Point { field, value } => {
                    data.points.entry(field.clone()).or_default().push((*value, doc));
                }
                IndexableField::DocValue { field, value } => {
                    let column = data.doc_values.entry(field.clone()).or_default();
                    column.resize(doc as usize + 1, None);
                    column[doc as usize] = Some(value.clone());
                }
                IndexableField::Stored { field, value } => {
                    let stored = &mut data.stored[doc as usize];
                    match stored.remove(field) {
                        None => {
                            stored.insert(field.clone(), value.clone());
                        }
                        Some(FieldValue::List(mut items)) => {
                            items.push(value.clone());
                            stored.insert(field.clone(), FieldValue::List(items));
                        }
                        Some(previous) => {
                            stored.insert(
                                field.clone(),
                                FieldValue::List(vec![previous, value.clone()]),
                            );
                        }
                    }
                }
                IndexableField::Facet { dim, label } | IndexableField::FacetLabel { dim, label } => {
                    let labels = data.facets.entry(dim.clone()).or_default();
                    labels.resize(doc as usize + 1, Vec::new());
                    labels[doc as usize].push(label.clone());
                }
            }
        }
        doc
    }

    pub fn build(mut self) -> SegmentData {
        self.data.seal();
        self.data
    }
}

/// A segment as seen by one commit: immutable data plus that commit's live
/// documents and value overlay.
#[derive(Debug, Clone)]
pub struct SegmentReader {
    meta: SegmentMeta,
    data: Arc<SegmentData>,
    live: Arc<BitVec>,
    overlay: Arc<ValueOverlay>,
}

impl SegmentReader {
    /// A reader for freshly built data with every document live.
    pub fn new(meta: SegmentMeta, data: Arc<SegmentData>) -> Self {
        let live = BitVec::from_elem(data.len(), true);
        SegmentReader {
            meta,
            data,
            live: Arc::new(live),
            overlay: Arc::new(ValueOverlay::new()),
        }
    }

    /// Load a committed segment with its deletion and overlay files.
    pub fn load(storage: &dyn Storage, meta: &SegmentMeta) -> Result<Self> {
        let data: SegmentData = file_format::read_file(storage, &meta.segment_file(), SEGMENT_MAGIC)?;
        if data.len() != meta.doc_count as usize {
            return Err(PikeError::storage(format!(
                "{}: expected {} documents, found {}",
                meta.segment_file(),
                meta.doc_count,
                data.len()
            )));
        }

        let live = match meta.deletes_file() {
            Some(name) => {
                let bytes: Vec<u8> = file_format::read_file(storage, &name, DELETES_MAGIC)?;
                let mut live = BitVec::from_bytes(&bytes);
                live.truncate(data.len());
                live
            }
            None => BitVec::from_elem(data.len(), true),
        };

        let overlay = match meta.values_file() {
            Some(name) => file_format::read_file(storage, &name, VALUES_MAGIC)?,
            None => ValueOverlay::new(),
        };

        Ok(SegmentReader {
            meta: meta.clone(),
            data: Arc::new(data),
            live: Arc::new(live),
            overlay: Arc::new(overlay),
        })
    }

    pub fn write_data(storage: &dyn Storage, meta: &SegmentMeta, data: &SegmentData) -> Result<()> {
        file_format::write_file(storage, &meta.segment_file(), SEGMENT_MAGIC, data)
    }

    /// A view with another live set, written to `meta`'s deletion file.
    pub fn with_deletes(&self, storage: &dyn Storage, meta: SegmentMeta, live: BitVec) -> Result<Self> {
        if let Some(name) = meta.deletes_file() {
            file_format::write_file(storage, &name, DELETES_MAGIC, &live.to_bytes())?;
        }
        Ok(SegmentReader {
            meta,
            data: Arc::clone(&self.data),
            live: Arc::new(live),
            overlay: Arc::clone(&self.overlay),
        })
    }

    /// A view with another value overlay, written to `meta`'s overlay file.
    pub fn with_overlay(&self, storage: &dyn Storage, meta: SegmentMeta, overlay: ValueOverlay) -> Result<Self> {
        if let Some(name) = meta.values_file() {
            file_format::write_file(storage, &name, VALUES_MAGIC, &overlay)?;
        }
        Ok(SegmentReader {
            meta,
            data: Arc::clone(&self.data),
            live: Arc::clone(&self.live),
            overlay: Arc::new(overlay),
        })
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn data(&self) -> &SegmentData {
        &self.data
    }

    pub fn live(&self) -> &BitVec {
        &self.live
    }

    pub fn overlay(&self) -> &ValueOverlay {
        &self.overlay
    }

    pub fn doc_count(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn live_count(&self) -> u32 {
        self.meta.live_docs()
    }

    pub fn is_live(&self, doc: u32) -> bool {
        self.live.get(doc as usize).unwrap_or(false)
    }

    pub fn identity(&self, doc: u32) -> &str {
        &self.data.ids[doc as usize]
    }

    /// The live document holding `identity`.
    pub fn find_live(&self, identity: &str) -> Option<u32> {
        self.postings(ID_FIELD, identity.as_bytes())
            .iter()
            .map(|p| p.doc)
            .find(|doc| self.is_live(*doc))
    }

    pub fn postings(&self, field: &str, term: &[u8]) -> &[Posting] {
        self.data
            .postings
            .get(field)
            .and_then(|terms| terms.get(term))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Token count of a tokenized field in one document.
    pub fn norm(&self, field: &str, doc: u32) -> u32 {
        self.data
            .norms
            .get(field)
            .and_then(|lengths| lengths.get(doc as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn norms(&self, field: &str) -> &[u32] {
        self.data.norms.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn points(&self, field: &str) -> &[(i64, u32)] {
        self.data.points.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Column value, overlay first.
    pub fn doc_value(&self, field: &str, doc: u32) -> Option<&DocValue> {
        if let Some(value) = self.overlay.get(field).and_then(|values| values.get(&doc)) {
            return Some(&value.column);
        }
        self.data
            .doc_values
            .get(field)
            .and_then(|values| values.get(doc as usize))
            .and_then(Option::as_ref)
    }

    pub fn facet_labels(&self, dim: &str, doc: u32) -> &[String] {
        self.data
            .facets
            .get(dim)
            .and_then(|labels| labels.get(doc as usize))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn stored(&self, doc: u32) -> &BTreeMap<String, FieldValue> {
        &self.data.stored[doc as usize]
    }

    /// Updated stored values of one document, replacing those of [`stored`].
    ///
    /// [`stored`]: SegmentReader::stored
    pub fn overlay_values(&self, doc: u32) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.overlay.iter().filter_map(move |(field, values)| {
            values
                .get(&doc)
                .and_then(|value| value.stored.as_ref())
                .map(|stored| (field, stored))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn tokens(field: &str, terms: &[&str]) -> IndexableField {
        IndexableField::Tokens {
            field: field.into(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn sample() -> SegmentData {
        let mut builder = SegmentBuilder::new();
        builder.add_document(
            "a",
            &[
                tokens("body", &["red", "wine", "red"]),
                IndexableField::Point { field: "year".into(), value: 2020 },
                IndexableField::DocValue { field: "price".into(), value: DocValue::Long(10) },
                IndexableField::Stored { field: "tag".into(), value: "x".into() },
                IndexableField::Stored { field: "tag".into(), value: "y".into() },
            ],
        );
        builder.add_document(
            "b",
            &[
                tokens("body", &["white"]),
                IndexableField::Point { field: "year".into(), value: 2010 },
                IndexableField::Facet { dim: "color".into(), label: "white".into() },
            ],
        );
        builder.build()
    }

    #[test]
    fn test_builder() {
        let data = sample();
        let reader = SegmentReader::new(SegmentMeta::new(1, 2), Arc::new(data.clone()));

        assert_eq!(reader.postings("body", b"red"), &[Posting { doc: 0, freq: 2 }]);
        assert_eq!(reader.norms("body"), &[3, 1]);
        assert_eq!(reader.points("year"), &[(2010, 1), (2020, 0)]);
        assert_eq!(reader.doc_value("price", 1), None);
        assert_eq!(reader.facet_labels("color", 1), &["white".to_string()]);
        assert_eq!(reader.facet_labels("color", 0), &[] as &[String]);
        assert_eq!(reader.find_live("b"), Some(1));
        assert_eq!(
            data.stored[0]["tag"],
            FieldValue::List(vec!["x".into(), "y".into()])
        );
    }

    #[test]
    fn test_deletes_and_overlay_round_trip() {
        let storage = MemoryStorage::new();
        let meta = SegmentMeta::new(1, 2);
        let data = sample();
        SegmentReader::write_data(&storage, &meta, &data).unwrap();

        let reader = SegmentReader::load(&storage, &meta).unwrap();
        let mut live = reader.live().clone();
        live.set(0, false);
        let deleted_meta = SegmentMeta { deleted: 1, deletes_gen: 4, ..meta.clone() };
        let reader = reader.with_deletes(&storage, deleted_meta, live).unwrap();

        let overlay = ValueOverlay::from([(
            "price".to_string(),
            BTreeMap::from([(1u32, UpdatedValue::column(DocValue::Long(99)))]),
        )]);
        let final_meta = SegmentMeta { values_gen: 5, ..reader.meta().clone() };
        let reader = reader.with_overlay(&storage, final_meta.clone(), overlay).unwrap();

        let loaded = SegmentReader::load(&storage, &final_meta).unwrap();
        assert!(!loaded.is_live(0));
        assert!(loaded.is_live(1));
        assert_eq!(loaded.find_live("a"), None);
        assert_eq!(loaded.doc_value("price", 1), Some(&DocValue::Long(99)));
        assert_eq!(reader.live_count(), 1);
    }

    #[test]
    fn test_merge_drops_deleted_and_folds_overlay() {
        let first = SegmentReader::new(SegmentMeta::new(1, 2), Arc::new(sample()));
        let mut live = first.live().clone();
        live.set(0, false);
        let storage = MemoryStorage::new();
        let first = first
            .with_deletes(&storage, SegmentMeta { deleted: 1, ..SegmentMeta::new(1, 2) }, live)
            .unwrap();
        let overlay = ValueOverlay::from([
            (
                "price".to_string(),
                BTreeMap::from([(1u32, UpdatedValue::column(DocValue::Long(5)))]),
            ),
            (
                "tag".to_string(),
                BTreeMap::from([(
                    1u32,
                    UpdatedValue {
                        column: DocValue::Bytes(b"z".to_vec()),
                        stored: Some("z".into()),
                    },
                )]),
            ),
        ]);
        let first = first
            .with_overlay(&storage, first.meta().clone(), overlay)
            .unwrap();
        let second = SegmentReader::new(SegmentMeta::new(2, 2), Arc::new(sample()));

        let merged = SegmentData::merge(&[Arc::new(first), Arc::new(second)]);
        assert_eq!(merged.ids, vec!["b", "a", "b"]);
        assert_eq!(merged.norms["body"], vec![1, 3, 1]);
        assert_eq!(
            merged.doc_values["price"],
            vec![Some(DocValue::Long(5)), Some(DocValue::Long(10)), None]
        );
        assert_eq!(merged.points["year"], vec![(2010, 0), (2010, 2), (2020, 1)]);
        assert_eq!(merged.stored[0]["tag"], FieldValue::from("z"));
        assert_eq!(
            merged.stored[1]["tag"],
            FieldValue::List(vec!["x".into(), "y".into()])
        );
        assert!(!merged.stored[0].contains_key("price"));
        assert_eq!(merged.postings[ID_FIELD][b"b".as_slice()].len(), 2);
        assert!(!merged.postings["body"].contains_key(b"zzz".as_slice()));
    }
}
