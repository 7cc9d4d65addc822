pub mod api;
pub mod events;
pub mod models;

pub use events::{ChangeEvent, ChangeOp};
pub use models::{
    ActiveSession, ChatMessage, Entity, EntityKind, FileEntry, FileKind, Folder, InvitationStatus,
    Meta, SavedQuery, Team, TeamActivity, TeamInvitation,
};
