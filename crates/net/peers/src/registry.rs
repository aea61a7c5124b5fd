//! Peers indexed by their canonical identifier.

use std::collections::HashMap;

use torchat_primitives::{OnionId, is_valid_address};
use tracing::debug;

use crate::error::RegistryError;
use crate::peer::Peer;
use crate::transport::ConnectionId;

/// Canonical id to [`Peer`] map. Every key goes through [`OnionId`]
/// normalization, so `foo` and `foo.onion` address the same record.
#[derive(Debug, Default)]
pub struct AddressRegistry {
    peers: HashMap<OnionId, Peer>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key` to a stored id: exact address match first, then the first
    /// peer whose alias or display name equals `key`.
    pub fn resolve(&self, key: &str) -> Option<OnionId> {
        if let Ok(id) = OnionId::parse(key) {
            if self.peers.contains_key(&id) {
                return Some(id);
            }
        }
        self.find(|peer| peer.is_known_as(key))
            .map(|peer| peer.id().clone())
    }

    pub fn lookup(&self, key: &str) -> Option<&Peer> {
        let id = self.resolve(key)?;
        self.peers.get(&id)
    }

    pub fn lookup_mut(&mut self, key: &str) -> Option<&mut Peer> {
        let id = self.resolve(key)?;
        self.peers.get_mut(&id)
    }

    /// First peer matching `predicate`, in no particular order.
    pub fn find(&self, predicate: impl Fn(&Peer) -> bool) -> Option<&Peer> {
        self.peers.values().find(|peer| predicate(peer))
    }

    /// Store `peer` under `key`, returning the record it replaced.
    ///
    /// A key that is not an address literal must name an existing peer by
    /// alias or display name; the record is then stored under that peer's id.
    pub fn insert(&mut self, key: &str, peer: Peer) -> Result<Option<Peer>, RegistryError> {
        let id = if is_valid_address(key) {
            OnionId::parse(key).map_err(|_| RegistryError::UnknownAlias(key.to_string()))?
        } else {
            self.find(|p| p.is_known_as(key))
                .map(|p| p.id().clone())
                .ok_or_else(|| RegistryError::UnknownAlias(key.to_string()))?
        };

        debug!(peer = %id, "peer added to registry");
        Ok(self.peers.insert(id, peer))
    }

    /// Store `peer` under its own address.
    pub fn append(&mut self, peer: Peer) -> Option<Peer> {
        let id = peer.id().clone();
        debug!(peer = %id, "peer added to registry");
        self.peers.insert(id, peer)
    }

    /// Remove a peer. This is the only way a peer is destroyed.
    pub fn remove(&mut self, key: &str) -> Option<Peer> {
        let id = self.resolve(key)?;
        debug!(peer = %id, "peer removed from registry");
        self.peers.remove(&id)
    }

    pub fn get(&self, id: &OnionId) -> Option<&Peer> {
        self.peers.get(id)
    }

    pub fn get_mut(&mut self, id: &OnionId) -> Option<&mut Peer> {
        self.peers.get_mut(id)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    /// Owner of `connection`, if any peer currently holds it.
    pub fn find_by_connection(&self, connection: ConnectionId) -> Option<OnionId> {
        self.find(|peer| peer.owns(connection).is_some())
            .map(|peer| peer.id().clone())
    }

    pub fn ids(&self) -> Vec<OnionId> {
        self.peers.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.peers.values_mut()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::link::PeerLink;
    use crate::test_utils::mock_link;

    const OWN: &str = "aaaaaaaaaaaaaaaa";

    fn peer(link: &mut PeerLink, raw: &str) -> Peer {
        Peer::new(link, raw, None, None).unwrap()
    }

    #[test]
    fn test_lookup_normalizes() {
        let (mut link, _wire) = mock_link(OWN);
        let mut registry = AddressRegistry::new();
        let mut foo = peer(&mut link, "fooooooooooooooo.onion");
        foo.set_alias("foo-alias");
        registry.insert("fooooooooooooooo.onion", foo).unwrap();

        let by_bare = registry.lookup("fooooooooooooooo").map(Peer::id);
        let by_full = registry.lookup("fooooooooooooooo.onion").map(Peer::id);
        let by_alias = registry.lookup("foo-alias").map(Peer::id);

        assert!(by_bare.is_some());
        assert_eq!(by_bare, by_full);
        assert_eq!(by_bare, by_alias);
        assert_eq!(registry.ids(), vec![OnionId::parse("fooooooooooooooo").unwrap()]);
    }

    #[test]
    fn test_lookup_by_display_name() {
        let (mut link, _wire) = mock_link(OWN);
        let mut registry = AddressRegistry::new();
        let mut bob = peer(&mut link, "bbbbbbbbbbbbbbbb");
        bob.set_name("Bob");
        registry.append(bob);

        assert_eq!(
            registry.lookup("Bob").map(|p| p.id().as_str()),
            Some("bbbbbbbbbbbbbbbb")
        );
        assert!(registry.lookup("Carol").is_none());
        assert!(registry.lookup("cccccccccccccccc").is_none());
    }

    #[test]
    fn test_find_predicate() {
        let (mut link, _wire) = mock_link(OWN);
        let mut registry = AddressRegistry::new();
        registry.append(peer(&mut link, "bbbbbbbbbbbbbbbb"));
        let mut carol = peer(&mut link, "cccccccccccccccc");
        carol.set_description("likes onions");
        registry.append(carol);

        let found = registry.find(|p| p.description() == Some("likes onions"));
        assert_eq!(found.map(|p| p.id().as_str()), Some("cccccccccccccccc"));
    }

    #[test]
    fn test_insert_unknown_alias_fails() {
        let (mut link, _wire) = mock_link(OWN);
        let mut registry = AddressRegistry::new();
        let bob = peer(&mut link, "bbbbbbbbbbbbbbbb");

        assert_matches!(
            registry.insert("Nobody", bob),
            Err(RegistryError::UnknownAlias(key)) if key == "Nobody"
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_insert_by_alias_replaces_record() {
        let (mut link, _wire) = mock_link(OWN);
        let mut registry = AddressRegistry::new();
        let mut bob = peer(&mut link, "bbbbbbbbbbbbbbbb");
        bob.set_alias("bob");
        registry.append(bob);

        let fresh = peer(&mut link, "bbbbbbbbbbbbbbbb");
        let replaced = registry.insert("bob", fresh).unwrap();

        assert_eq!(replaced.and_then(|p| p.alias().map(str::to_owned)), Some("bob".into()));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("bob").is_none());
    }

    #[test]
    fn test_remove() {
        let (mut link, _wire) = mock_link(OWN);
        let mut registry = AddressRegistry::new();
        registry.append(peer(&mut link, "bbbbbbbbbbbbbbbb"));

        assert!(registry.remove("bbbbbbbbbbbbbbbb.onion").is_some());
        assert!(registry.remove("bbbbbbbbbbbbbbbb").is_none());
        assert!(!registry.contains("bbbbbbbbbbbbbbbb"));
    }

    #[test]
    fn test_find_by_connection() {
        let (mut link, wire) = mock_link(OWN);
        let mut registry = AddressRegistry::new();
        let bob = peer(&mut link, "bbbbbbbbbbbbbbbb");
        let conn = wire.borrow().dialed(bob.id()).unwrap();
        registry.append(bob);

        assert_eq!(
            registry.find_by_connection(conn).map(|id| id.to_string()),
            Some("bbbbbbbbbbbbbbbb".into())
        );
        assert!(registry.find_by_connection(ConnectionId(999)).is_none());
    }
}
