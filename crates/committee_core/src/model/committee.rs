//! Committee record and its write-side inputs.
//!
//! # Invariants
//! - `committee_no`, `title` and `boss_name` are never blank once stored.
//! - `committee_no` is safe to embed in an attachment file name.
//! - `(committee_no, year(committee_date))` is unique by application rule.

use super::patch::FieldPatch;
use super::validation::{normalize_committee_no, optional_text, require_text, ValidationError};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub type CommitteeId = i64;

/// Persisted committee row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    pub id: CommitteeId,
    /// Business number; repeats across years.
    pub committee_no: String,
    /// Declared document date. Its year names attachment files.
    pub committee_date: NaiveDate,
    pub title: String,
    pub boss_name: String,
    pub sex: Option<String>,
    pub count: Option<i64>,
    pub notes: Option<String>,
    /// Day the record was first submitted.
    pub submitted_date: NaiveDate,
    pub submitting_user_id: Option<i64>,
}

impl Committee {
    /// Year used for the `(committee_no, year)` uniqueness rule.
    pub fn year(&self) -> i32 {
        self.committee_date.year()
    }
}

/// Fields accepted when a committee is first submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommittee {
    pub committee_no: String,
    pub committee_date: NaiveDate,
    pub title: String,
    pub boss_name: String,
    pub sex: Option<String>,
    pub count: Option<i64>,
    pub notes: Option<String>,
}

impl NewCommittee {
    pub fn new(
        committee_no: impl Into<String>,
        committee_date: NaiveDate,
        title: impl Into<String>,
        boss_name: impl Into<String>,
    ) -> Self {
        Self {
            committee_no: committee_no.into(),
            committee_date,
            title: title.into(),
            boss_name: boss_name.into(),
            sex: None,
            count: None,
            notes: None,
        }
    }

    /// Returns a trimmed, validated copy ready for insertion.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        if let Some(count) = self.count {
            ensure_count(count)?;
        }
        Ok(Self {
            committee_no: normalize_committee_no(&self.committee_no)?,
            committee_date: self.committee_date,
            title: require_text("title", &self.title)?,
            boss_name: require_text("boss_name", &self.boss_name)?,
            sex: optional_text(self.sex.clone()),
            count: self.count,
            notes: optional_text(self.notes.clone()),
        })
    }
}

/// Partial update of a committee. Every updatable field is listed here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitteePatch {
    pub committee_no: FieldPatch<String>,
    pub committee_date: FieldPatch<NaiveDate>,
    pub title: FieldPatch<String>,
    pub boss_name: FieldPatch<String>,
    pub sex: FieldPatch<String>,
    pub count: FieldPatch<i64>,
    pub notes: FieldPatch<String>,
}

impl CommitteePatch {
    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.committee_no.is_keep()
            && self.committee_date.is_keep()
            && self.title.is_keep()
            && self.boss_name.is_keep()
            && self.sex.is_keep()
            && self.count.is_keep()
            && self.notes.is_keep()
    }

    /// Applies present fields onto `committee`, returning the names of the
    /// fields whose value actually changed.
    ///
    /// Validation happens before any assignment, so an error leaves
    /// `committee` untouched.
    pub fn apply_to(self, committee: &mut Committee) -> Result<Vec<&'static str>, ValidationError> {
        let committee_no = required(self.committee_no, "committee_no")?
            .map(|value| normalize_committee_no(&value))
            .transpose()?;
        let committee_date = required(self.committee_date, "committee_date")?;
        let title = required(self.title, "title")?
            .map(|value| require_text("title", &value))
            .transpose()?;
        let boss_name = required(self.boss_name, "boss_name")?
            .map(|value| require_text("boss_name", &value))
            .transpose()?;
        if let Some(count) = self.count.as_set() {
            ensure_count(*count)?;
        }

        let mut changed = Vec::new();
        assign(&mut committee.committee_no, committee_no, "committee_no", &mut changed);
        assign(&mut committee.committee_date, committee_date, "committee_date", &mut changed);
        assign(&mut committee.title, title, "title", &mut changed);
        assign(&mut committee.boss_name, boss_name, "boss_name", &mut changed);
        if normalize_optional(self.sex).apply_optional(&mut committee.sex) {
            changed.push("sex");
        }
        if self.count.apply_optional(&mut committee.count) {
            changed.push("count");
        }
        if normalize_optional(self.notes).apply_optional(&mut committee.notes) {
            changed.push("notes");
        }
        Ok(changed)
    }
}

fn required<T>(patch: FieldPatch<T>, field: &'static str) -> Result<Option<T>, ValidationError> {
    match patch {
        FieldPatch::Keep => Ok(None),
        FieldPatch::Set(value) => Ok(Some(value)),
        FieldPatch::Clear => Err(ValidationError::RequiredField(field)),
    }
}

fn assign<T: PartialEq>(
    slot: &mut T,
    value: Option<T>,
    field: &'static str,
    changed: &mut Vec<&'static str>,
) {
    if let Some(value) = value {
        if *slot != value {
            *slot = value;
            changed.push(field);
        }
    }
}

/// Blank text in a `Set` is treated as clearing the nullable field.
fn normalize_optional(patch: FieldPatch<String>) -> FieldPatch<String> {
    match patch {
        FieldPatch::Set(value) => match optional_text(Some(value)) {
            Some(value) => FieldPatch::Set(value),
            None => FieldPatch::Clear,
        },
        other => other,
    }
}

fn ensure_count(count: i64) -> Result<(), ValidationError> {
    if count < 0 {
        return Err(ValidationError::OutOfRange {
            field: "count",
            value: count,
        });
    }
    Ok(())
}
