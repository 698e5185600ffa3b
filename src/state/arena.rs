//! Generation-checked storage for identities.
//!
//! Indexes into the registry hand out [`UserRef`] handles instead of
//! pointers. A slot's generation is bumped when its identity is destroyed,
//! so a stale handle held across a cull resolves to `None` instead of
//! aliasing whichever identity reuses the slot.

use super::user::User;

/// Handle to an identity in a [`UserArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserRef {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    user: Option<User>,
}

/// Slab of identities with a free list.
#[derive(Debug, Default)]
pub struct UserArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl UserArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: User) -> UserRef {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.user = Some(user);
            return UserRef {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
            panic!("identity arena exhausted at {} slots", self.slots.len())
        });
        self.slots.push(Slot {
            generation: 0,
            user: Some(user),
        });
        UserRef {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, r: UserRef) -> Option<&User> {
        self.slots
            .get(r.index as usize)
            .filter(|slot| slot.generation == r.generation)
            .and_then(|slot| slot.user.as_ref())
    }

    pub fn get_mut(&mut self, r: UserRef) -> Option<&mut User> {
        self.slots
            .get_mut(r.index as usize)
            .filter(|slot| slot.generation == r.generation)
            .and_then(|slot| slot.user.as_mut())
    }

    /// Destroy the identity behind `r`, invalidating every copy of the handle.
    pub fn remove(&mut self, r: UserRef) -> Option<User> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        let user = slot.user.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(r.index);
        self.len -= 1;
        Some(user)
    }

    pub fn iter(&self) -> impl Iterator<Item = (UserRef, &User)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.user.as_ref().map(|user| {
                (
                    UserRef {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    user,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
