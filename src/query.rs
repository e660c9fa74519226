//! Lobby query construction and evaluation
//!
//! This module defines the filter and sort predicates a client can attach to
//! a directory query, plus the evaluation logic the reference directory uses
//! to answer them.

use crate::types::LobbySnapshot;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A lobby field a filter or sort may address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryField {
    AvailableSlots,
    MaxPlayers,
    PlayerCount,
    Name,
    CreatedAt,
    /// A named public metadata key
    Metadata(String),
}

/// Comparison operator applied by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    GreaterThan,
    LessThan,
    Equals,
}

/// A filter or sort operand: numeric or string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Compare two operands, coercing text to a number when the other side
    /// is numeric and the text parses as one. Mismatched kinds are unordered.
    fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => a.partial_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Text(a), FieldValue::Number(b)) => {
                a.parse::<f64>().ok().and_then(|a| a.partial_cmp(b))
            }
            (FieldValue::Number(a), FieldValue::Text(b)) => {
                b.parse::<f64>().ok().and_then(|b| a.partial_cmp(&b))
            }
        }
    }
}

/// A single predicate over a lobby field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub field: QueryField,
    pub op: FilterOp,
    pub value: FieldValue,
}

impl QueryFilter {
    pub fn greater_than(field: QueryField, value: f64) -> Self {
        Self {
            field,
            op: FilterOp::GreaterThan,
            value: FieldValue::Number(value),
        }
    }

    pub fn less_than(field: QueryField, value: f64) -> Self {
        Self {
            field,
            op: FilterOp::LessThan,
            value: FieldValue::Number(value),
        }
    }

    pub fn equals(field: QueryField, value: f64) -> Self {
        Self {
            field,
            op: FilterOp::Equals,
            value: FieldValue::Number(value),
        }
    }

    pub fn equals_text(field: QueryField, value: impl Into<String>) -> Self {
        Self {
            field,
            op: FilterOp::Equals,
            value: FieldValue::Text(value.into()),
        }
    }

    /// Filter for lobbies with at least one open slot
    pub fn has_open_slot() -> Self {
        Self::greater_than(QueryField::AvailableSlots, 0.0)
    }

    /// Evaluate this filter against a snapshot. A field the lobby does not
    /// carry (an absent metadata key) never matches.
    pub fn matches(&self, lobby: &LobbySnapshot) -> bool {
        let Some(actual) = field_value(lobby, &self.field) else {
            return false;
        };
        let Some(ordering) = actual.compare(&self.value) else {
            return false;
        };
        match self.op {
            FilterOp::GreaterThan => ordering == Ordering::Greater,
            FilterOp::LessThan => ordering == Ordering::Less,
            FilterOp::Equals => ordering == Ordering::Equal,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort specification for query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySort {
    pub field: QueryField,
    pub order: SortOrder,
}

impl QuerySort {
    pub fn ascending(field: QueryField) -> Self {
        Self {
            field,
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(field: QueryField) -> Self {
        Self {
            field,
            order: SortOrder::Descending,
        }
    }
}

/// A complete query: filters, optional sort, and a result limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub filters: Vec<QueryFilter>,
    pub sort: Option<QuerySort>,
    pub limit: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: None,
            limit: 25,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query for lobbies that can still be joined
    pub fn open_lobbies() -> Self {
        Self::new().with_filter(QueryFilter::has_open_slot())
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sort(mut self, sort: QuerySort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, lobby: &LobbySnapshot) -> bool {
        self.filters.iter().all(|f| f.matches(lobby))
    }
}

/// Extract the comparable value of a field from a snapshot
fn field_value(lobby: &LobbySnapshot, field: &QueryField) -> Option<FieldValue> {
    match field {
        QueryField::AvailableSlots => Some(FieldValue::Number(lobby.available_slots() as f64)),
        QueryField::MaxPlayers => Some(FieldValue::Number(lobby.max_players as f64)),
        QueryField::PlayerCount => Some(FieldValue::Number(lobby.players.len() as f64)),
        QueryField::Name => Some(FieldValue::Text(lobby.name.clone())),
        QueryField::CreatedAt => Some(FieldValue::Number(
            lobby.created_at.timestamp_millis() as f64
        )),
        QueryField::Metadata(key) => lobby
            .metadata
            .get(key)
            .map(|entry| FieldValue::Text(entry.value.clone())),
    }
}

/// Order query results by the requested sort field, ties broken by creation
/// time descending (newest first). The tiebreaker alone applies when no sort
/// is given.
pub fn sort_lobbies(lobbies: &mut [LobbySnapshot], sort: Option<&QuerySort>) {
    lobbies.sort_by(|a, b| {
        let primary = sort
            .map(|sort| {
                let ordering = match (
                    field_value(a, &sort.field),
                    field_value(b, &sort.field),
                ) {
                    (Some(va), Some(vb)) => va.compare(&vb).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match sort.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            })
            .unwrap_or(Ordering::Equal);

        primary.then_with(|| b.created_at.cmp(&a.created_at))
    });
}
