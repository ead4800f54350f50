//! On-disk shape of clue batches.
//!
//! A batch file is a JSON array that is either *flat* (`[{category, q, a, wiki_slug}, ...]`,
//! the final-round files) or *grouped* (`[{category, questions: [{q, a, wiki_slug}, ...]}, ...]`).
//! The first record decides which one we are dealing with.

use std::path::Path;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{ser::PrettyFormatter, Map, Value};

use crate::{Error, Result};

const CATEGORY: &str = "category";
const QUESTION: &str = "q";
const ANSWER: &str = "a";
const WIKI_SLUG: &str = "wiki_slug";
const QUESTIONS: &str = "questions";

/// A single question/answer pair and the Wikipedia slug its answer resolved to.
///
/// The record is kept as the JSON object it was read from, so keys come back out
/// in the same order, with the same values, whether we understand them or not.
/// Only [`Clue::set_wiki_slug`] ever changes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clue {
    fields: Map<String, Value>,
}

impl Clue {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(QUESTION.into(), Value::String(question.into()));
        fields.insert(ANSWER.into(), Value::String(answer.into()));
        Self { fields }
    }

    /// Only present on flat records.
    pub fn category(&self) -> Option<&str> {
        self.str_field(CATEGORY)
    }

    pub fn question(&self) -> Option<&str> {
        self.str_field(QUESTION)
    }

    /// The answer text, if there is one and it's a string.
    pub fn answer(&self) -> Option<&str> {
        self.str_field(ANSWER)
    }

    /// `None` means never attempted or the lookup failed, never an empty string.
    pub fn wiki_slug(&self) -> Option<&str> {
        self.str_field(WIKI_SLUG).filter(|slug| !slug.is_empty())
    }

    /// Stores the lookup result. An existing `wiki_slug` keeps its place, a new one goes last.
    pub fn set_wiki_slug(&mut self, slug: Option<String>) {
        self.fields
            .insert(WIKI_SLUG.into(), slug.map_or(Value::Null, Value::String));
    }

    pub fn is_resolved(&self) -> bool {
        self.wiki_slug().is_some()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// All the clues of one category on one game board.
///
/// Like [`Clue`], every key other than `questions` is kept as read, and
/// `questions` is written back at the position it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryGroup {
    fields: Map<String, Value>,
    questions_at: usize,
    pub questions: Vec<Clue>,
}

impl CategoryGroup {
    pub fn category(&self) -> Option<&str> {
        self.fields.get(CATEGORY).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl Serialize for CategoryGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i == self.questions_at {
                map.serialize_entry(QUESTIONS, &self.questions)?;
            }
            map.serialize_entry(key, value)?;
        }
        if self.questions_at >= self.fields.len() {
            map.serialize_entry(QUESTIONS, &self.questions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let mut fields = Map::new();
        let mut questions = None;
        for (i, (key, value)) in Map::deserialize(deserializer)?.into_iter().enumerate() {
            if key == QUESTIONS {
                questions = Some((i, value));
            } else {
                fields.insert(key, value);
            }
        }

        let (questions_at, questions) = questions.ok_or_else(|| <D::Error as de::Error>::missing_field(QUESTIONS))?;
        let questions = Vec::<Clue>::deserialize(questions).map_err(<D::Error as de::Error>::custom)?;
        Ok(Self {
            fields,
            questions_at,
            questions,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Flat(Vec<Clue>),
    Grouped(Vec<CategoryGroup>),
}

impl Batch {
    /// Parses a batch, detecting its shape from the first record.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let records: Vec<Value> = match serde_json::from_slice(bytes)? {
            Value::Array(records) => records,
            other => {
                return Err(Error::BatchShape(format!(
                    "expected a JSON array, found {}",
                    json_kind(&other)
                )))
            }
        };

        let grouped = records
            .first()
            .and_then(Value::as_object)
            .is_some_and(|first| first.contains_key(QUESTIONS));

        let batch = if grouped {
            Batch::Grouped(serde_json::from_value(Value::Array(records))?)
        } else {
            Batch::Flat(serde_json::from_value(Value::Array(records))?)
        };
        Ok(batch)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_slice(&bytes)
    }

    /// Number of top level records.
    pub fn len(&self) -> usize {
        match self {
            Batch::Flat(clues) => clues.len(),
            Batch::Grouped(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clue_count(&self) -> usize {
        match self {
            Batch::Flat(clues) => clues.len(),
            Batch::Grouped(groups) => groups.iter().map(|g| g.questions.len()).sum(),
        }
    }

    /// Flattens the batch into mutable references to every clue, in file order.
    /// Writing through these updates the batch in place, so no rehydration step is needed.
    pub fn clues_mut(&mut self) -> Vec<&mut Clue> {
        match self {
            Batch::Flat(clues) => clues.iter_mut().collect(),
            Batch::Grouped(groups) => groups
                .iter_mut()
                .flat_map(|g| g.questions.iter_mut())
                .collect(),
        }
    }

    pub fn clues(&self) -> Box<dyn Iterator<Item = &Clue> + '_> {
        match self {
            Batch::Flat(clues) => Box::new(clues.iter()),
            Batch::Grouped(groups) => Box::new(groups.iter().flat_map(|g| g.questions.iter())),
        }
    }

    pub fn to_pretty_json(&self) -> Result<Vec<u8>> {
        match self {
            Batch::Flat(clues) => to_pretty_json(clues),
            Batch::Grouped(groups) => to_pretty_json(groups),
        }
    }
}

/// Pretty prints with a 4 space indent. `serde_json` never escapes non-ASCII,
/// so accents and the like end up in the file as they are.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(4096);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Replaces `path` in one step: the bytes go to a sibling `.tmp` file which is then renamed over it.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    tokio::fs::write(tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(tmp, path).await {
        let _ = tokio::fs::remove_file(tmp).await;
        return Err(e.into());
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPED: &str = r#"[
        {"category": "CAPITALS", "questions": [
            {"q": "This city", "a": "Paris", "wiki_slug": null},
            {"q": "On the Danube", "a": "Vienna"}
        ]},
        {"category": "RIVERS", "questions": [{"q": "Longest", "a": "the Nile"}]}
    ]"#;

    #[test]
    fn detects_grouped_shape_from_first_record() {
        let batch = Batch::from_slice(GROUPED.as_bytes()).unwrap();
        let Batch::Grouped(groups) = &batch else {
            panic!("expected a grouped batch, got {batch:?}");
        };
        assert_eq!(groups.len(), 2);
        assert_eq!(batch.clue_count(), 3);
        assert_eq!(groups[0].questions[1].answer(), Some("Vienna"));
        assert_eq!(groups[0].questions[1].wiki_slug(), None);
    }

    #[test]
    fn detects_flat_shape() {
        let raw = r#"[{"category": "FJ", "q": "Q", "a": "A"}]"#;
        let batch = Batch::from_slice(raw.as_bytes()).unwrap();
        assert!(matches!(&batch, Batch::Flat(c) if c[0].category() == Some("FJ")));
    }

    #[test]
    fn empty_array_is_an_empty_flat_batch() {
        let batch = Batch::from_slice(b"[]").unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.to_pretty_json().unwrap(), b"[]");
    }

    #[test]
    fn rejects_non_array_documents() {
        let err = Batch::from_slice(br#"{"category": "X"}"#).unwrap_err();
        assert!(matches!(err, Error::BatchShape(_)), "{err}");
    }

    #[test]
    fn rejects_records_that_do_not_fit_the_detected_shape() {
        let raw = r#"[{"category": "A", "questions": []}, {"q": "no questions key"}]"#;
        assert!(matches!(Batch::from_slice(raw.as_bytes()), Err(Error::Json(_))));
    }

    #[test]
    fn mutation_through_flattened_clues_keeps_nesting() {
        let mut batch = Batch::from_slice(GROUPED.as_bytes()).unwrap();
        for (i, clue) in batch.clues_mut().into_iter().enumerate() {
            clue.set_wiki_slug(Some(format!("slug_{i}")));
        }
        let Batch::Grouped(groups) = &batch else {
            panic!("shape changed");
        };
        assert_eq!(groups[0].category(), Some("CAPITALS"));
        assert_eq!(groups[0].questions[0].wiki_slug(), Some("slug_0"));
        assert_eq!(groups[0].questions[1].wiki_slug(), Some("slug_1"));
        assert_eq!(groups[1].questions[0].wiki_slug(), Some("slug_2"));
    }

    #[test]
    fn pretty_output_keeps_key_order_unknown_keys_and_unicode() {
        let raw = r#"[{"category":"ÉCOLE","questions":[{"q":"Où?","a":"Zürich","value":400}]}]"#;
        let batch = Batch::from_slice(raw.as_bytes()).unwrap();
        let out = String::from_utf8(batch.to_pretty_json().unwrap()).unwrap();

        let expected = r#"[
    {
        "category": "ÉCOLE",
        "questions": [
            {
                "q": "Où?",
                "a": "Zürich",
                "value": 400
            }
        ]
    }
]"#;
        assert_eq!(out, expected);
    }

    #[test]
    fn null_and_odd_keys_survive_a_round_trip() {
        let raw = r#"[
            {"category": null, "q": null, "a": null, "wiki_slug": null},
            {"a": 1945, "q": "Year", "category": ["X"]}
        ]"#;
        let batch = Batch::from_slice(raw.as_bytes()).unwrap();
        let Batch::Flat(clues) = &batch else {
            panic!("expected a flat batch, got {batch:?}");
        };
        assert_eq!(clues[0].answer(), None);
        assert_eq!(clues[1].answer(), None);
        assert_eq!(clues[1].question(), Some("Year"));

        let out = batch.to_pretty_json().unwrap();
        let reparsed: Value = serde_json::from_slice(&out).unwrap();
        let original: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(reparsed, original);

        let keys: Vec<_> = clues[1].fields().keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "q", "category"]);
    }

    #[test]
    fn grouped_records_keep_questions_in_place() {
        let raw = r#"[{"round": "DJ", "questions": [{"q": "Q", "a": "A"}], "category": null}]"#;
        let batch = Batch::from_slice(raw.as_bytes()).unwrap();
        let out = String::from_utf8(batch.to_pretty_json().unwrap()).unwrap();

        let round = out.find("\"round\"").unwrap();
        let questions = out.find("\"questions\"").unwrap();
        let category = out.find("\"category\": null").unwrap();
        assert!(round < questions && questions < category, "{out}");
    }

    #[test]
    fn new_slug_goes_after_existing_keys() {
        let raw = r#"[{"q": "Q", "a": "Paris", "value": 200}, {"wiki_slug": null, "q": "Q", "a": "Rome"}]"#;
        let mut batch = Batch::from_slice(raw.as_bytes()).unwrap();
        for clue in batch.clues_mut() {
            let slug = clue.answer().map(str::to_owned);
            clue.set_wiki_slug(slug);
        }

        let keys: Vec<Vec<&str>> = batch
            .clues()
            .map(|c| c.fields().keys().map(String::as_str).collect())
            .collect();
        assert_eq!(keys[0], ["q", "a", "value", "wiki_slug"]);
        assert_eq!(keys[1], ["wiki_slug", "q", "a"]);
    }

    #[tokio::test]
    async fn write_atomic_replaces_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        tokio::fs::write(&path, b"[1, 2, 3, 4, 5, 6]").await.unwrap();

        write_atomic(&path, b"[]").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"[]");
        assert!(!dir.path().join("batch.json.tmp").exists());
    }
}
