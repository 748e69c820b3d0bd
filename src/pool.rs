//! # Client Lease Pool
//!
//! Bounded sharing of expensive backend connections.
//!
//! A [`ClientPool`] owns a fixed set of clients created eagerly at
//! construction. [`ClientPool::acquire`] hands one out as an exclusive
//! [`Lease`], blocking while every client is leased. Dropping or releasing the
//! lease returns that exact client to the idle set.
//!
//! The idle set is the admission gate: its length is the number of free slots,
//! and both are changed under the same mutex, so a client is never counted as
//! available while it is still out, and never handed to two leases.
//!
//! No ordering is promised among blocked acquirers.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

/// A fixed-capacity pool of exclusively leased clients.
///
/// Cloning the pool is cheap and shares the same clients.
pub struct ClientPool<C> {
    shared: Arc<Shared<C>>,
}

struct Shared<C> {
    idle: Mutex<Vec<Slot<C>>>,
    released: Condvar,
    capacity: usize,
}

struct Slot<C> {
    id: usize,
    client: C,
}

impl<C> Shared<C> {
    fn put(&self, slot: Slot<C>) {
        let id = slot.id;
        self.idle.lock().push(slot);
        self.released.notify_one();
        debug!(slot = id, "released client");
    }
}

impl<C> ClientPool<C> {
    /// Build a pool over already connected clients.
    ///
    /// Slot ids are the clients' positions in `clients`. An empty pool never
    /// grants a lease.
    pub fn new(clients: Vec<C>) -> Self {
        let capacity = clients.len();
        let idle = clients
            .into_iter()
            .enumerate()
            .map(|(id, client)| Slot { id, client })
            .collect();
        Self {
            shared: Arc::new(Shared {
                idle: Mutex::new(idle),
                released: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Connect `size` clients with `connect(slot)` and pool them.
    ///
    /// # Errors
    ///
    /// The first connection error. Clients connected before it are dropped;
    /// no partial pool is ever returned.
    pub fn connect<E, F>(size: usize, mut connect: F) -> Result<Self, E>
    where
        F: FnMut(usize) -> Result<C, E>,
    {
        info!(size, "creating client pool");
        let clients = (0..size).map(&mut connect).collect::<Result<Vec<_>, E>>()?;
        Ok(Self::new(clients))
    }

    /// Lease a client, blocking until one is idle.
    pub fn acquire(&self) -> Lease<C> {
        let mut idle = self.shared.idle.lock();
        loop {
            if let Some(slot) = idle.pop() {
                debug!(slot = slot.id, "leased client");
                return Lease {
                    pool: Arc::clone(&self.shared),
                    slot: Some(slot),
                };
            }
            self.shared.released.wait(&mut idle);
        }
    }

    /// Lease a client if one is idle right now.
    pub fn try_acquire(&self) -> Option<Lease<C>> {
        let slot = self.shared.idle.lock().pop()?;
        debug!(slot = slot.id, "leased client");
        Some(Lease {
            pool: Arc::clone(&self.shared),
            slot: Some(slot),
        })
    }

    /// Return a lease. Equivalent to dropping it.
    pub fn release(&self, lease: Lease<C>) {
        lease.release();
    }

    /// Number of clients the pool was built with.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of clients idle right now.
    pub fn available(&self) -> usize {
        self.shared.idle.lock().len()
    }
}

impl<C> Clone for ClientPool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> fmt::Debug for ClientPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}

/// Exclusive ownership of one pooled client.
///
/// Dereferences to the client. The client goes back to the pool it came from
/// when the lease is released or dropped, exactly once.
pub struct Lease<C> {
    pool: Arc<Shared<C>>,
    slot: Option<Slot<C>>,
}

impl<C> Lease<C> {
    /// Slot id of the leased client, stable for the pool's lifetime.
    pub fn id(&self) -> usize {
        self.slot.as_ref().map_or(usize::MAX, |slot| slot.id)
    }

    /// Give the client back to the pool.
    pub fn release(mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.put(slot);
        }
    }
}

impl<C> Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        match &self.slot {
            Some(slot) => &slot.client,
            None => unreachable!("lease used after release"),
        }
    }
}

impl<C> DerefMut for Lease<C> {
    fn deref_mut(&mut self) -> &mut C {
        match &mut self.slot {
            Some(slot) => &mut slot.client,
            None => unreachable!("lease used after release"),
        }
    }
}

impl<C> Drop for Lease<C> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.put(slot);
        }
    }
}

impl<C> fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("slot", &self.id()).finish()
    }
}
