use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role. Only an Admin may change it after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Tutor,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Tutor => "Tutor",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Registered account keyed by its email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub tutor_profile: Option<TutorProfile>,
    pub created_at: DateTime<Utc>,
    /// Store-managed write counter used for compare-and-set updates.
    #[serde(default)]
    pub revision: u64,
}

/// Teaching background advertised on the public tutor listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorProfile {
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
}

/// Self-service profile fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

/// Profile projection served to anyone who asks for a user by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileView {
    pub email: String,
    pub role: Role,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub photo: Option<String>,
}

impl From<&User> for UserProfileView {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            role: user.role,
            name: user.name.clone(),
            phone: user.phone.clone(),
            address: user.address.clone(),
            photo: user.photo.clone(),
        }
    }
}

/// Public tutor listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorCard {
    pub name: String,
    pub email: String,
    pub subjects: Vec<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub area: Option<String>,
}

impl From<&User> for TutorCard {
    fn from(user: &User) -> Self {
        let profile = user.tutor_profile.clone().unwrap_or_default();
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            subjects: profile.subjects,
            experience: profile.experience,
            education: profile.education,
            area: profile.area,
        }
    }
}

/// The only fields the disclosure gate ever releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactCard {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&User> for ContactCard {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TuitionId(pub String);

impl fmt::Display for TuitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Review state of a tuition post. `Paid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TuitionStatus {
    Pending,
    Approved,
    Paid,
}

impl TuitionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TuitionStatus::Pending => "Pending",
            TuitionStatus::Approved => "Approved",
            TuitionStatus::Paid => "Paid",
        }
    }
}

/// Descriptive payload supplied by the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuitionDetails {
    pub subject: String,
    pub class_level: String,
    pub budget: u32,
    pub location: String,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial edit merged over an existing post's details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuitionDetailsPatch {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub class_level: Option<String>,
    #[serde(default)]
    pub budget: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TuitionDetailsPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn apply_to(self, details: &mut TuitionDetails) {
        if let Some(subject) = self.subject {
            details.subject = subject;
        }
        if let Some(class_level) = self.class_level {
            details.class_level = class_level;
        }
        if let Some(budget) = self.budget {
            details.budget = budget;
        }
        if let Some(location) = self.location {
            details.location = location;
        }
        if self.schedule.is_some() {
            details.schedule = self.schedule;
        }
        if self.notes.is_some() {
            details.notes = self.notes;
        }
    }
}

/// A student's request for a tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuitionPost {
    pub id: TuitionId,
    pub student_email: String,
    #[serde(flatten)]
    pub details: TuitionDetails,
    pub status: TuitionStatus,
    pub hired_tutor_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Store-managed write counter used for compare-and-set updates.
    pub revision: u64,
}

impl TuitionPost {
    pub fn is_hired(&self) -> bool {
        self.status == TuitionStatus::Paid || self.hired_tutor_email.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Application state. `PaidConfirmed` means the tutor was hired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Applied,
    #[serde(rename = "Paid-Confirmed")]
    PaidConfirmed,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::PaidConfirmed => "Paid-Confirmed",
        }
    }
}

/// Free-form pitch a tutor attaches to an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPitch {
    #[serde(default)]
    pub tutor_name: Option<String>,
    #[serde(default)]
    pub qualifications: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub expected_salary: Option<u32>,
}

/// Request to bid on a tuition post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDraft {
    pub tuition_id: TuitionId,
    pub tutor_email: String,
    pub student_email: String,
    #[serde(flatten)]
    pub pitch: ApplicationPitch,
}

/// A tutor's bid on a tuition post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub tuition_id: TuitionId,
    pub tutor_email: String,
    /// Owner of the referenced post when the application was created.
    pub student_email: String,
    #[serde(flatten)]
    pub pitch: ApplicationPitch,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

/// Application joined with the descriptive fields of its post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationWithPost {
    #[serde(flatten)]
    pub application: Application,
    pub tuition_subject: Option<String>,
    pub tuition_class: Option<String>,
    pub tuition_location: Option<String>,
}
