//! Event record schema
//!
//! Column presence is negotiated once when the table is read; feature code asks
//! the [`ColumnSet`] instead of probing raw rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Columns the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    NodeId,
    Title,
    Description,
    Category,
    Organizer,
    Location,
    Source,
    IsFree,
    DateStart,
}

impl Column {
    /// Header name in the cleaned CSV
    pub fn name(&self) -> &'static str {
        match self {
            Column::NodeId => "node_id",
            Column::Title => "title",
            Column::Description => "description",
            Column::Category => "category",
            Column::Organizer => "organizer",
            Column::Location => "location",
            Column::Source => "source",
            Column::IsFree => "is_free",
            Column::DateStart => "date_start",
        }
    }

    /// Parse a header name (case and surrounding whitespace ignored)
    pub fn from_header(header: &str) -> Option<Self> {
        let header = header.trim().to_lowercase();
        Self::all().into_iter().find(|c| c.name() == header)
    }

    /// All known columns
    pub fn all() -> [Column; 9] {
        [
            Column::NodeId,
            Column::Title,
            Column::Description,
            Column::Category,
            Column::Organizer,
            Column::Location,
            Column::Source,
            Column::IsFree,
            Column::DateStart,
        ]
    }

    /// Columns label-encoded into the categorical block, in block order
    pub fn categorical() -> [Column; 4] {
        [Column::Category, Column::Organizer, Column::Location, Column::Source]
    }

    /// Columns concatenated into the text document, in order
    pub fn textual() -> [Column; 3] {
        [Column::Title, Column::Description, Column::Category]
    }

    fn bit(&self) -> u16 {
        1 << (*self as u16)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Set of columns present in a source table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnSet(u16);

impl ColumnSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, column: Column) -> Self {
        self.insert(column);
        self
    }

    pub fn insert(&mut self, column: Column) {
        self.0 |= column.bit();
    }

    /// Capability check: does the source carry this column?
    pub fn has(&self, column: Column) -> bool {
        self.0 & column.bit() != 0
    }

    /// Present columns in declaration order
    pub fn columns(&self) -> Vec<Column> {
        Column::all().into_iter().filter(|c| self.has(*c)).collect()
    }
}

impl FromIterator<Column> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, c| set.with(c))
    }
}

/// One event row
///
/// `title` and `description` are always present; a source without them yields
/// empty strings. Every other attribute is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub node_id: usize,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub organizer: Option<String>,
    pub location: Option<String>,
    pub source: Option<String>,
    pub is_free: Option<bool>,
    pub date_start: Option<String>,
}

impl EventRecord {
    /// Create a record with only a title and description
    pub fn new(node_id: usize, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            node_id,
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_organizer(mut self, organizer: impl Into<String>) -> Self {
        self.organizer = Some(organizer.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_free(mut self, is_free: bool) -> Self {
        self.is_free = Some(is_free);
        self
    }

    pub fn with_date(mut self, date_start: impl Into<String>) -> Self {
        self.date_start = Some(date_start.into());
        self
    }

    /// String value of an optional attribute column
    pub fn text(&self, column: Column) -> Option<&str> {
        match column {
            Column::Title => Some(&self.title),
            Column::Description => Some(&self.description),
            Column::Category => self.category.as_deref(),
            Column::Organizer => self.organizer.as_deref(),
            Column::Location => self.location.as_deref(),
            Column::Source => self.source.as_deref(),
            Column::DateStart => self.date_start.as_deref(),
            Column::NodeId | Column::IsFree => None,
        }
    }
}

/// The event table read once per run
#[derive(Debug, Clone)]
pub struct EventTable {
    records: Vec<EventRecord>,
    columns: ColumnSet,
    /// Header names exactly as found in the source
    source_columns: Vec<String>,
    /// File the table was read from, if any
    path: Option<PathBuf>,
}

impl EventTable {
    /// Build a table from in-memory records
    pub fn new(records: Vec<EventRecord>, columns: ColumnSet) -> Self {
        let source_columns = columns.columns().iter().map(|c| c.name().to_string()).collect();
        Self {
            records,
            columns,
            source_columns,
            path: None,
        }
    }

    pub(crate) fn from_parts(
        records: Vec<EventRecord>,
        columns: ColumnSet,
        source_columns: Vec<String>,
        path: PathBuf,
    ) -> Self {
        Self {
            records,
            columns,
            source_columns,
            path: Some(path),
        }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn columns(&self) -> ColumnSet {
        self.columns
    }

    /// Capability check resolved at ingestion
    pub fn has(&self, column: Column) -> bool {
        self.columns.has(column)
    }

    pub fn source_columns(&self) -> &[String] {
        &self.source_columns
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}
