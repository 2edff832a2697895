//! Family member model.
//!
//! # Responsibility
//! - Define the person record stored inside one tree.
//! - Validate member input (`MemberData`) before it reaches the graph.
//!
//! # Invariants
//! - Names are stored trimmed and never blank.
//! - `date_of_death` is never earlier than `birthday`.
//! - Members carry no relationship fields; couples are authoritative.

use super::tree::TreeId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable family member identifier.
pub type MemberId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Stable storage value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    /// Parses a storage value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Member attributes supplied by callers on add/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberData {
    pub first_name: String,
    pub last_name: String,
    pub birthday: NaiveDate,
    pub date_of_death: Option<NaiveDate>,
    pub gender: Gender,
}

impl MemberData {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        birthday: NaiveDate,
        gender: Gender,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            birthday,
            date_of_death: None,
            gender,
        }
    }

    /// Sets the death date.
    pub fn died(mut self, date_of_death: NaiveDate) -> Self {
        self.date_of_death = Some(date_of_death);
        self
    }

    /// Returns a trimmed copy or the first validation failure.
    pub fn normalized(&self) -> Result<Self, MemberValidationError> {
        let first_name = self.first_name.trim();
        if first_name.is_empty() {
            return Err(MemberValidationError::BlankFirstName);
        }
        let last_name = self.last_name.trim();
        if last_name.is_empty() {
            return Err(MemberValidationError::BlankLastName);
        }
        if let Some(date_of_death) = self.date_of_death {
            if date_of_death < self.birthday {
                return Err(MemberValidationError::DeathBeforeBirth {
                    birthday: self.birthday,
                    date_of_death,
                });
            }
        }

        Ok(Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            birthday: self.birthday,
            date_of_death: self.date_of_death,
            gender: self.gender,
        })
    }
}

/// Member input validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberValidationError {
    BlankFirstName,
    BlankLastName,
    DeathBeforeBirth {
        birthday: NaiveDate,
        date_of_death: NaiveDate,
    },
}

impl Display for MemberValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankFirstName => write!(f, "first name must not be blank"),
            Self::BlankLastName => write!(f, "last name must not be blank"),
            Self::DeathBeforeBirth {
                birthday,
                date_of_death,
            } => write!(
                f,
                "date of death {date_of_death} is earlier than birthday {birthday}"
            ),
        }
    }
}

impl Error for MemberValidationError {}

/// Stored member of one family tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: MemberId,
    pub tree_id: TreeId,
    pub first_name: String,
    pub last_name: String,
    pub birthday: NaiveDate,
    pub date_of_death: Option<NaiveDate>,
    pub gender: Gender,
}

impl FamilyMember {
    pub fn from_data(id: MemberId, tree_id: TreeId, data: MemberData) -> Self {
        Self {
            id,
            tree_id,
            first_name: data.first_name,
            last_name: data.last_name,
            birthday: data.birthday,
            date_of_death: data.date_of_death,
            gender: data.gender,
        }
    }

    /// Replaces every attribute while keeping identity and tree.
    pub fn apply(&mut self, data: MemberData) {
        self.first_name = data.first_name;
        self.last_name = data.last_name;
        self.birthday = data.birthday;
        self.date_of_death = data.date_of_death;
        self.gender = data.gender;
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Member reference as submitted by a client.
///
/// A reference without identity means "no member" rather than an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub id: Option<MemberId>,
}

impl MemberRef {
    pub fn anonymous() -> Self {
        Self { id: None }
    }
}

impl From<MemberId> for MemberRef {
    fn from(value: MemberId) -> Self {
        Self { id: Some(value) }
    }
}
