use serde::{Deserialize, Deserializer};

use crate::models::user::UserRow;

/// Interest fields arrive either as a list or as an already-joined string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InterestFields {
    List(Vec<String>),
    Joined(String),
}

impl InterestFields {
    pub fn into_stored(self) -> String {
        match self {
            InterestFields::List(fields) => fields.join(","),
            InterestFields::Joined(joined) => joined,
        }
    }
}

/// Partial profile update.
///
/// Outer `None` means the key was absent and the column is left alone;
/// `Some(None)` means the key was sent as `null` and the column is cleared.
#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, deserialize_with = "present")]
    pub nickname: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub profile_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub background_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub interest_fields: Option<Option<InterestFields>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProfilePatch {
    pub fn apply(self, user: &mut UserRow) {
        if let Some(nickname) = self.nickname {
            user.nickname = nickname;
        }
        if let Some(profile_image) = self.profile_image {
            user.profile_image = profile_image;
        }
        if let Some(background_image) = self.background_image {
            user.background_image = background_image;
        }
        if let Some(fields) = self.interest_fields {
            user.interest_fields = fields.map(InterestFields::into_stored);
        }
    }
}
