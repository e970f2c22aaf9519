use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::appointments::OfficeCalendar;
use crate::error::AppError;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").unwrap());

const MIN_ADDRESS_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Male" => Some(Gender::Male),
            "Female" => Some(Gender::Female),
            "Other" => Some(Gender::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
    pub address: String,
    pub barangay: String,
    pub occupation: Option<String>,
    pub nationality: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Body of a profile save. Optional fields left out keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub barangay: String,
    pub occupation: Option<String>,
    pub nationality: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

impl ProfileInput {
    /// Checks fields in form order and folds the input over `existing`.
    pub fn apply(
        self,
        user_id: Uuid,
        existing: Option<UserProfile>,
        calendar: &OfficeCalendar,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AppError> {
        let first_name = self.first_name.trim();
        if first_name.is_empty() {
            return Err(AppError::invalid("first_name", "First name is required!"));
        }
        let last_name = self.last_name.trim();
        if last_name.is_empty() {
            return Err(AppError::invalid("last_name", "Last name is required!"));
        }
        let email = non_empty(self.email);
        if let Some(email) = &email {
            if !EMAIL.is_match(email) {
                return Err(AppError::invalid("email", "Please enter a valid email address."));
            }
        }
        let gender = Gender::parse(&self.gender)
            .ok_or_else(|| AppError::invalid("gender", "Please select a valid gender."))?;
        let address = self.address.trim();
        if address.chars().count() < MIN_ADDRESS_CHARS {
            return Err(AppError::invalid(
                "address",
                "Address must be at least 3 characters long.",
            ));
        }
        let barangay = self.barangay.trim();
        if barangay.is_empty() {
            return Err(AppError::invalid("barangay", "Please select a barangay."));
        }
        if let Some(dob) = self.date_of_birth {
            if dob > calendar.today(now) {
                return Err(AppError::invalid(
                    "date_of_birth",
                    "Date of birth cannot be in the future.",
                ));
            }
        }

        let mut p = existing.unwrap_or_else(|| UserProfile {
            user_id,
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            date_of_birth: None,
            gender,
            address: String::new(),
            barangay: String::new(),
            occupation: None,
            nationality: None,
            emergency_contact: None,
            profile_picture_url: None,
            created_at: now,
            updated_at: now,
        });

        p.first_name = first_name.to_string();
        p.last_name = last_name.to_string();
        // a blank email leaves the stored one alone
        if email.is_some() {
            p.email = email;
        }
        if self.date_of_birth.is_some() {
            p.date_of_birth = self.date_of_birth;
        }
        p.gender = gender;
        p.address = address.to_string();
        p.barangay = barangay.to_string();
        if self.occupation.is_some() {
            p.occupation = non_empty(self.occupation);
        }
        if self.nationality.is_some() {
            p.nationality = non_empty(self.nationality);
        }
        if let Some(c) = self.emergency_contact {
            p.emergency_contact = Some(EmergencyContact {
                name: c.name.trim().to_string(),
                phone: c.phone.trim().to_string(),
                relationship: c.relationship.trim().to_string(),
            })
            .filter(|c| !c.name.is_empty() || !c.phone.is_empty());
        }
        p.updated_at = now;
        Ok(p)
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
