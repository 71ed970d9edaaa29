use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use super::Image;

/// Profile of the current user.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Subscription level, e.g. `premium` or `free`.
    #[serde(default)]
    pub product: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Image>,
}

impl User {
    /// Display name, or the user id when none is set.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}
