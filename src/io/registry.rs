// src/io/registry.rs
//
// Registry of live client endpoints, owned exclusively by the bridge hub.
// Identifiers are monotone and never reused, so a late event for a removed
// client can never alias a newer connection.

use std::collections::HashMap;

use super::{ClientHandle, ClientId};

/// Live clients keyed by connection id.
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientHandle>,
    next_id: ClientId,
}

impl ClientRegistry {
    pub fn new() -> Self {
        ClientRegistry {
            clients: HashMap::new(),
            next_id: 0,
        }
    }

    /// Reserve the id for the next connection.
    pub fn allocate_id(&mut self) -> ClientId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Register a client under its id.
    pub fn insert(&mut self, handle: ClientHandle) {
        self.clients.insert(handle.id, handle);
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut ClientHandle> {
        self.clients.get_mut(&id)
    }

    /// Remove a client, dropping its handle (which closes its outbound
    /// queue and thereby the socket's write half). Idempotent: removing an
    /// unknown or already-removed id is a no-op.
    pub fn remove(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    /// Iterate over live clients, for broadcast.
    pub fn iter(&self) -> impl Iterator<Item = &ClientHandle> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotone_and_unique() {
        let mut reg = ClientRegistry::new();
        let a = reg.allocate_id();
        let b = reg.allocate_id();
        assert_ne!(a, b);
        assert!(b > a);

        reg.insert(ClientHandle::stub(a));
        reg.remove(a);
        // Removal never frees an id for reuse.
        let c = reg.allocate_id();
        assert!(c > b);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut reg = ClientRegistry::new();
        let id = reg.allocate_id();
        reg.insert(ClientHandle::stub(id));
        assert_eq!(reg.len(), 1);

        assert!(reg.remove(id));
        assert!(!reg.remove(id));
        assert!(!reg.remove(9999));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_iter_covers_all_registered() {
        let mut reg = ClientRegistry::new();
        for _ in 0..3 {
            let id = reg.allocate_id();
            reg.insert(ClientHandle::stub(id));
        }
        let mut seen: Vec<_> = reg.iter().map(|h| h.id).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
