use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The entity collections OnHub knows about. Maps each kind to its storage
/// collection key and its REST path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Folder,
    File,
    Team,
    ChatMessage,
    TeamInvitation,
    TeamActivity,
    ActiveSession,
    SavedQuery,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Folder,
        EntityKind::File,
        EntityKind::Team,
        EntityKind::ChatMessage,
        EntityKind::TeamInvitation,
        EntityKind::TeamActivity,
        EntityKind::ActiveSession,
        EntityKind::SavedQuery,
    ];

    /// Storage key for the collection (one JSON record set per key).
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Folder => "onhub_folders",
            EntityKind::File => "onhub_files",
            EntityKind::Team => "onhub_teams",
            EntityKind::ChatMessage => "onhub_chat_messages",
            EntityKind::TeamInvitation => "onhub_team_invitations",
            EntityKind::TeamActivity => "onhub_team_activity",
            EntityKind::ActiveSession => "onhub_sessions",
            EntityKind::SavedQuery => "onhub_queries",
        }
    }

    /// Path segment under `/wp-json/onhub/v1/`.
    pub fn path_segment(self) -> &'static str {
        match self {
            EntityKind::Folder => "folders",
            EntityKind::File => "files",
            EntityKind::Team => "teams",
            EntityKind::ChatMessage => "chat_messages",
            EntityKind::TeamInvitation => "team_invitations",
            EntityKind::TeamActivity => "team_activity",
            EntityKind::ActiveSession => "sessions",
            EntityKind::SavedQuery => "queries",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path_segment() == segment)
    }
}

/// Fields every stored record carries. Flattened into each entity so the
/// JSON shape stays flat (`{ "id": ..., "created_at": ..., ... }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Meta {
    fn default() -> Self {
        let now = Utc::now();
        Meta {
            id: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A storable record. The store assigns `meta.id` and both timestamps on
/// create; callers construct entities with `Meta::default()`.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn meta(&self) -> &Meta;
    fn meta_mut(&mut self) -> &mut Meta;

    fn id(&self) -> &str {
        &self.meta().id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(flatten)]
    pub meta: Meta,
    pub name: String,
    pub parent_id: Option<String>,
    pub team_id: Option<String>,
    pub owner: String,
    pub color: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Where the folder lived before it was trashed. Set by soft-delete,
    /// cleared by restore.
    pub original_parent_id: Option<String>,
    #[serde(default)]
    pub shared_with: Vec<String>,
}

impl Entity for Folder {
    const KIND: EntityKind = EntityKind::Folder;
    fn meta(&self) -> &Meta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

/// Content-type tag for files. The tag decides which editor the UI opens;
/// the store treats `content` as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Docx,
    Xlsx,
    Kbn,
    Gnt,
    Crn,
    Flux,
    Pptx,
    Psd,
    Img,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(flatten)]
    pub meta: Meta,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default)]
    pub content: String,
    /// `local://<key>` blob reference or a remote URL.
    pub file_url: Option<String>,
    pub folder_id: Option<String>,
    pub original_folder_id: Option<String>,
    pub team_id: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shared_with: Vec<String>,
}

impl Entity for FileEntry {
    const KIND: EntityKind = EntityKind::File;
    fn meta(&self) -> &Meta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(flatten)]
    pub meta: Meta,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub color: Option<String>,
}

impl Entity for Team {
    const KIND: EntityKind = EntityKind::Team;
    fn meta(&self) -> &Meta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(flatten)]
    pub meta: Meta,
    pub team_id: Option<String>,
    pub sender: String,
    pub content: String,
}

impl Entity for ChatMessage {
    const KIND: EntityKind = EntityKind::ChatMessage;
    fn meta(&self) -> &Meta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl Default for InvitationStatus {
    fn default() -> Self {
        InvitationStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamInvitation {
    #[serde(flatten)]
    pub meta: Meta,
    pub team_id: String,
    pub inviter: String,
    pub invitee_email: String,
    #[serde(default)]
    pub status: InvitationStatus,
}

impl Entity for TeamInvitation {
    const KIND: EntityKind = EntityKind::TeamInvitation;
    fn meta(&self) -> &Meta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamActivity {
    #[serde(flatten)]
    pub meta: Meta,
    pub team_id: String,
    pub actor: String,
    pub action: String,
    pub target: Option<String>,
}

impl Entity for TeamActivity {
    const KIND: EntityKind = EntityKind::TeamActivity;
    fn meta(&self) -> &Meta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    #[serde(flatten)]
    pub meta: Meta,
    pub user: String,
    pub token: String,
}

impl Entity for ActiveSession {
    const KIND: EntityKind = EntityKind::ActiveSession;
    fn meta(&self) -> &Meta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    #[serde(flatten)]
    pub meta: Meta,
    pub owner: String,
    pub name: String,
    pub query: String,
}

impl Entity for SavedQuery {
    const KIND: EntityKind = EntityKind::SavedQuery;
    fn meta(&self) -> &Meta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_path_segment() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_path_segment(kind.path_segment()), Some(kind));
        }
        assert_eq!(EntityKind::from_path_segment("widgets"), None);
    }

    #[test]
    fn folder_json_shape_is_flat() {
        let folder = Folder {
            meta: Meta::default(),
            name: "docs".into(),
            parent_id: None,
            team_id: None,
            owner: "a@x.com".into(),
            color: Some("#ff0000".into()),
            deleted: false,
            deleted_at: None,
            original_parent_id: None,
            shared_with: vec![],
        };
        let value = serde_json::to_value(&folder).unwrap();
        assert!(value.get("id").is_some());
        assert!(value.get("created_at").is_some());
        assert!(value.get("meta").is_none());
    }

    #[test]
    fn file_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(FileKind::Kbn).unwrap(), "kbn");
        assert_eq!(
            serde_json::from_value::<FileKind>("docx".into()).unwrap(),
            FileKind::Docx
        );
    }
}
