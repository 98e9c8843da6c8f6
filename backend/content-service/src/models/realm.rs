use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local mirror of a realm owned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Realm {
    pub id: Uuid,
    pub alias: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub is_public: bool,
    pub is_community: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmMember {
    pub realm_id: Uuid,
    pub account_id: Uuid,
    pub power_level: i32,
}
