use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ids::SchemeId;

/// A named, reusable bundle of dataset configurations.
///
/// Membership lives in the store's association table rather than on the
/// struct, because it changes independently of the scheme record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Scheme {
    pub id: SchemeId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Scheme {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: SchemeId::new(),
            name: name.into(),
            description,
            created_at: Utc::now(),
        }
    }
}
