//! Profiles and their in-memory store
//!
//! A [`Profile`] is a pure value: the ordered filter chain plus the seven
//! channel strips, under a user-facing label. The [`ProfileStore`] owns
//! every saved profile and hands out detached copies for editing; nothing
//! the session does to its copy is visible here until an explicit commit.

use crate::domain::filter::FilterStage;
use crate::domain::mixer::{ChannelState, CHANNEL_COUNT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, StoreError>;

/// Tag every interchange document must carry.
pub const DOCUMENT_TYPE: &str = "audioProfile";

/// Interchange document version this build reads and writes.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The document is not a profile export at all.
    #[error("invalid profile document: {0}")]
    InvalidDocument(String),

    /// The document is a profile export from an incompatible version.
    #[error("unsupported document version {0}")]
    UnsupportedVersion(u32),

    /// The referenced profile does not exist in the store.
    #[error("unknown profile id {0}")]
    UnknownProfile(u32),
}

/// One saved equalizer and mixer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: u32,
    pub label: String,
    /// Signal order: element 0 is the first stage after the source.
    pub filter_chain: Vec<FilterStage>,
    pub channels: Vec<ChannelState>,
}

impl Profile {
    pub fn new(id: u32, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            filter_chain: Vec::new(),
            channels: default_channels(),
        }
    }

    /// Restore the channel-count invariant after deserialization or import.
    ///
    /// The strip always holds exactly [`CHANNEL_COUNT`] entries, indexed in
    /// order, with the last one acting as master.
    pub fn normalize(&mut self) {
        self.channels.truncate(CHANNEL_COUNT);
        while self.channels.len() < CHANNEL_COUNT {
            self.channels.push(ChannelState::new(self.channels.len()));
        }
        for (index, channel) in self.channels.iter_mut().enumerate() {
            channel.index = index;
            channel.gain = channel.gain.max(0.0);
        }
    }
}

fn default_channels() -> Vec<ChannelState> {
    (0..CHANNEL_COUNT).map(ChannelState::new).collect()
}

/// Profile payload as it travels in an interchange document, without the
/// store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub label: String,
    pub filter_chain: Vec<FilterStage>,
    pub channels: Vec<ChannelState>,
}

impl From<&Profile> for ProfileData {
    fn from(profile: &Profile) -> Self {
        Self {
            label: profile.label.clone(),
            filter_chain: profile.filter_chain.clone(),
            channels: profile.channels.clone(),
        }
    }
}

/// Import/export interchange document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub profiles: Vec<ProfileData>,
}

impl ProfileDocument {
    pub fn new(profiles: Vec<ProfileData>) -> Self {
        Self {
            kind: DOCUMENT_TYPE.to_string(),
            version: DOCUMENT_VERSION,
            profiles,
        }
    }
}

/// In-memory collection of profiles with one active selection
///
/// The store is never empty: deleting the last profile immediately creates
/// a fresh one, so there is always something to activate.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    profiles: Vec<Profile>,
    active_id: u32,
}

impl ProfileStore {
    pub fn new() -> Self {
        let first = Profile::new(1, "Profile 1");
        Self {
            active_id: first.id,
            profiles: vec![first],
        }
    }

    /// Rebuild a store from persisted parts, restoring every invariant.
    pub fn from_parts(mut profiles: Vec<Profile>, active_id: Option<u32>) -> Self {
        for profile in &mut profiles {
            profile.normalize();
        }
        let mut store = Self {
            profiles,
            active_id: 0,
        };
        if store.profiles.is_empty() {
            let id = store.create();
            store.active_id = id;
            return store;
        }
        store.active_id = match active_id {
            Some(id) if store.profiles.iter().any(|p| p.id == id) => id,
            _ => store.profiles[0].id,
        };
        store
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn active_id(&self) -> u32 {
        self.active_id
    }

    pub fn get(&self, id: u32) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    fn next_free_id(&self) -> u32 {
        let mut id = 1;
        while self.profiles.iter().any(|p| p.id == id) {
            id += 1;
        }
        id
    }

    fn unique_label(&self, base: &str) -> String {
        if !self.profiles.iter().any(|p| p.label == base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{} ({})", base, n);
            if !self.profiles.iter().any(|p| p.label == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Create a fresh empty profile and return its id.
    pub fn create(&mut self) -> u32 {
        let id = self.next_free_id();
        let label = self.unique_label(&format!("Profile {}", id));
        info!(id, label, "profile created");
        self.profiles.push(Profile::new(id, label));
        id
    }

    /// Delete a profile. The store refills itself if this was the last
    /// one, and the active selection moves off a deleted profile.
    pub fn delete(&mut self, id: u32) -> Result<()> {
        let index = self
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::UnknownProfile(id))?;
        self.profiles.remove(index);
        info!(id, "profile deleted");

        if self.profiles.is_empty() {
            let fresh = self.create();
            self.active_id = fresh;
        } else if self.active_id == id {
            self.active_id = self.profiles[0].id;
        }
        Ok(())
    }

    /// Mark a profile active and return a detached copy for the session.
    ///
    /// Edits to the copy stay invisible here until [`Self::commit`].
    pub fn activate(&mut self, id: u32) -> Result<Profile> {
        let profile = self
            .profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or(StoreError::UnknownProfile(id))?
            .clone();
        self.active_id = id;
        debug!(id, "profile activated");
        Ok(profile)
    }

    /// Write an edited copy back over the stored profile with the same id.
    pub fn commit(&mut self, profile: &Profile) -> Result<()> {
        let slot = self
            .profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or(StoreError::UnknownProfile(profile.id))?;
        *slot = profile.clone();
        slot.normalize();
        debug!(id = profile.id, "profile committed");
        Ok(())
    }

    pub fn rename(&mut self, id: u32, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        let slot = self
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::UnknownProfile(id))?;
        slot.label = label;
        Ok(())
    }

    /// Copy an existing profile under a fresh id and a suffixed label.
    pub fn duplicate(&mut self, id: u32) -> Result<u32> {
        let source = self
            .profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or(StoreError::UnknownProfile(id))?
            .clone();
        let new_id = self.next_free_id();
        let label = self.unique_label(&format!("{} copy", source.label));
        self.profiles.push(Profile {
            id: new_id,
            label,
            ..source
        });
        info!(from = id, to = new_id, "profile duplicated");
        Ok(new_id)
    }

    /// Build the interchange document for every stored profile.
    pub fn export(&self) -> ProfileDocument {
        ProfileDocument::new(self.profiles.iter().map(ProfileData::from).collect())
    }

    /// Append every profile from a document, assigning fresh ids and
    /// de-colliding labels. Rejected documents leave the store untouched.
    pub fn import(&mut self, document: &ProfileDocument) -> Result<Vec<u32>> {
        if document.kind != DOCUMENT_TYPE {
            return Err(StoreError::InvalidDocument(format!(
                "unexpected type tag {:?}",
                document.kind
            )));
        }
        if document.version != DOCUMENT_VERSION {
            return Err(StoreError::UnsupportedVersion(document.version));
        }

        let mut imported = Vec::with_capacity(document.profiles.len());
        for data in &document.profiles {
            let id = self.next_free_id();
            let mut profile = Profile {
                id,
                label: self.unique_label(&data.label),
                filter_chain: data.filter_chain.clone(),
                channels: data.channels.clone(),
            };
            profile.normalize();
            self.profiles.push(profile);
            imported.push(id);
        }
        info!(count = imported.len(), "profiles imported");
        Ok(imported)
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::{FilterKind, FilterStage};

    #[test]
    fn test_store_starts_with_one_profile() {
        let store = ProfileStore::new();
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id(), 1);
        assert_eq!(store.profiles()[0].label, "Profile 1");
        assert_eq!(store.profiles()[0].channels.len(), CHANNEL_COUNT);
    }

    #[test]
    fn test_create_scans_for_lowest_free_id() {
        let mut store = ProfileStore::new();
        let second = store.create();
        let third = store.create();
        assert_eq!((second, third), (2, 3));

        store.delete(2).unwrap();
        assert_eq!(store.create(), 2, "freed id must be reused first");
    }

    #[test]
    fn test_deleting_last_profile_refills_store() {
        let mut store = ProfileStore::new();
        store.delete(1).unwrap();

        assert_eq!(store.len(), 1);
        let fresh = &store.profiles()[0];
        assert!(fresh.filter_chain.is_empty());
        assert_eq!(store.active_id(), fresh.id);
    }

    #[test]
    fn test_delete_moves_active_selection() {
        let mut store = ProfileStore::new();
        let second = store.create();
        store.activate(second).unwrap();

        store.delete(second).unwrap();
        assert_eq!(store.active_id(), 1);
    }

    #[test]
    fn test_delete_unknown_id_is_reported() {
        let mut store = ProfileStore::new();
        let err = store.delete(42).unwrap_err();
        assert!(matches!(err, StoreError::UnknownProfile(42)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_activation_hands_out_a_detached_copy() {
        let mut store = ProfileStore::new();
        let mut active = store.activate(1).unwrap();

        active
            .filter_chain
            .push(FilterStage::new(FilterKind::Peaking, 440.0));
        assert!(
            store.get(1).unwrap().filter_chain.is_empty(),
            "edits must stay invisible until commit"
        );

        store.commit(&active).unwrap();
        assert_eq!(store.get(1).unwrap().filter_chain.len(), 1);
    }

    #[test]
    fn test_commit_unknown_profile_is_rejected() {
        let mut store = ProfileStore::new();
        let ghost = Profile::new(99, "Ghost");
        let err = store.commit(&ghost).unwrap_err();
        assert!(matches!(err, StoreError::UnknownProfile(99)));
    }

    #[test]
    fn test_duplicate_suffixes_label() {
        let mut store = ProfileStore::new();
        let copy = store.duplicate(1).unwrap();
        assert_eq!(store.get(copy).unwrap().label, "Profile 1 copy");

        let copy2 = store.duplicate(1).unwrap();
        assert_eq!(store.get(copy2).unwrap().label, "Profile 1 copy (2)");
    }

    #[test]
    fn test_normalize_restores_channel_invariant() {
        let mut profile = Profile::new(1, "P");
        profile.channels.truncate(3);
        profile.normalize();
        assert_eq!(profile.channels.len(), CHANNEL_COUNT);
        for (i, c) in profile.channels.iter().enumerate() {
            assert_eq!(c.index, i);
        }

        profile.channels.push(ChannelState::new(99));
        profile.normalize();
        assert_eq!(profile.channels.len(), CHANNEL_COUNT);
    }

    #[test]
    fn test_export_then_import_appends_with_fresh_ids() {
        let mut store = ProfileStore::new();
        store.rename(1, "Warm Vinyl").unwrap();

        let document = store.export();
        assert_eq!(document.kind, DOCUMENT_TYPE);
        assert_eq!(document.version, DOCUMENT_VERSION);

        let imported = store.import(&document).unwrap();
        assert_eq!(imported, vec![2]);
        assert_eq!(store.get(2).unwrap().label, "Warm Vinyl (2)");
    }

    #[test]
    fn test_import_rejects_wrong_type_tag() {
        let mut store = ProfileStore::new();
        let mut document = store.export();
        document.kind = "bookmarks".to_string();

        let err = store.import(&document).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
        assert_eq!(store.len(), 1, "rejected import must not touch the store");
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let mut store = ProfileStore::new();
        let mut document = store.export();
        document.version = 7;

        let err = store.import(&document).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion(7)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_import_normalizes_channel_strips() {
        let mut store = ProfileStore::new();
        let document = ProfileDocument::new(vec![ProfileData {
            label: "Short".to_string(),
            filter_chain: Vec::new(),
            channels: vec![ChannelState::new(0)],
        }]);

        let ids = store.import(&document).unwrap();
        let imported = store.get(ids[0]).unwrap();
        assert_eq!(imported.channels.len(), CHANNEL_COUNT);
    }

    #[test]
    fn test_document_wire_format() {
        let document = ProfileDocument::new(vec![ProfileData {
            label: "Flat".to_string(),
            filter_chain: vec![FilterStage::new(FilterKind::Lowshelf, 200.0)],
            channels: Vec::new(),
        }]);

        let json = serde_json::to_string(&document).unwrap();
        assert!(json.contains("\"type\":\"audioProfile\""));
        assert!(json.contains("\"version\":1"));
        assert!(json.contains("\"filterChain\""));

        let parsed: ProfileDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, document);
    }

    #[test]
    fn test_from_parts_repairs_active_id() {
        let profiles = vec![Profile::new(3, "A"), Profile::new(5, "B")];
        let store = ProfileStore::from_parts(profiles, Some(4));
        assert_eq!(store.active_id(), 3);

        let store = ProfileStore::from_parts(Vec::new(), None);
        assert_eq!(store.len(), 1, "empty parts must refill the store");
    }
}
