//! Employee and membership records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type EmployeeId = i64;

/// Stored as a small integer: 1 = male, 2 = female, anything else unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    pub fn from_db(value: Option<i64>) -> Self {
        match value {
            Some(1) => Self::Male,
            Some(2) => Self::Female,
            _ => Self::Unknown,
        }
    }

    pub fn to_db(self) -> Option<i64> {
        match self {
            Self::Male => Some(1),
            Self::Female => Some(2),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub emp_id: EmployeeId,
    pub name: String,
    /// Numeric identifier issued outside this system.
    pub employee_desc: Option<i64>,
    pub gender: Gender,
}

/// One committee/employee junction row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub committee_id: i64,
    pub employee_id: EmployeeId,
    pub created_at: NaiveDateTime,
    pub created_by_user_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::Gender;

    #[test]
    fn gender_codes_map_both_ways() {
        assert_eq!(Gender::from_db(Some(1)), Gender::Male);
        assert_eq!(Gender::from_db(Some(2)), Gender::Female);
        assert_eq!(Gender::from_db(Some(9)), Gender::Unknown);
        assert_eq!(Gender::from_db(None), Gender::Unknown);
        assert_eq!(Gender::Female.to_db(), Some(2));
    }
}
