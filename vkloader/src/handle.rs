//! Handle management for loader-owned Vulkan objects
//!
//! Instances and physical devices handed to the application are loader
//! objects: the application (and every layer) only ever sees the loader's
//! handle, and terminators translate it back into the driver's own handle.
//!
//! # Dispatchable handles (VkInstance, VkPhysicalDevice)
//!
//! Layers and drivers built against the ICD interface dereference dispatchable
//! handles and expect the first pointer-sized word to be ICD_LOADER_MAGIC
//! (0x01CDC0DE) until a dispatch pointer is written there.  A plain integer
//! handle would crash them, so every dispatchable loader object lives in a
//! heap-resident `DispatchableSlot` and the slot's address is the handle.
//!
//! Logical devices are *not* wrapped: the application receives the driver's
//! own `VkDevice`, and the loader keys its bookkeeping on that raw value with
//! `HandleAllocator::insert`.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Magic value expected at offset 0 of every dispatchable object.
pub const ICD_LOADER_MAGIC: usize = 0x01CDC0DE;

/// Heap-resident slot backing a dispatchable loader handle.
#[repr(C)]
pub struct DispatchableSlot {
    /// MUST be first and equal to ICD_LOADER_MAGIC
    pub loader_magic: usize,
    /// Index into the corresponding HandleAllocator
    pub index: u64,
}

/// Allocate a heap-resident DispatchableSlot and return its address as u64.
pub fn alloc_dispatchable(index: u64) -> u64 {
    let slot = Box::new(DispatchableSlot {
        loader_magic: ICD_LOADER_MAGIC,
        index,
    });
    Box::into_raw(slot) as u64
}

/// Free a DispatchableSlot allocated by `alloc_dispatchable`.
/// # Safety
/// `raw` must have been produced by `alloc_dispatchable` and not freed before.
pub unsafe fn free_dispatchable(raw: u64) {
    if raw != 0 {
        drop(Box::from_raw(raw as *mut DispatchableSlot));
    }
}

/// Extract the allocator index from a dispatchable handle.
/// # Safety
/// `raw` must be a live pointer produced by `alloc_dispatchable`.
pub unsafe fn dispatchable_index(raw: u64) -> Option<u64> {
    let slot = &*(raw as *const DispatchableSlot);
    (slot.loader_magic == ICD_LOADER_MAGIC).then_some(slot.index)
}

/// Thread-safe handle allocator
///
/// An allocator is used either with generated handles (`allocate`), with
/// address handles (`allocate_addressed`) or with externally chosen keys
/// (`insert`), never a mix.
pub struct HandleAllocator<T> {
    next_handle: RwLock<u64>,
    objects: RwLock<FxHashMap<u64, Arc<T>>>,
}

impl<T> HandleAllocator<T> {
    pub fn new() -> Self {
        Self {
            next_handle: RwLock::new(1), // 0 is VK_NULL_HANDLE
            objects: RwLock::new(FxHashMap::default()),
        }
    }

    /// Allocate a new handle for a fully constructed object
    pub fn allocate(&self, object: T) -> u64 {
        let mut next = self.next_handle.write();
        let handle = *next;
        *next += 1;

        self.objects.write().insert(handle, Arc::new(object));
        handle
    }

    /// Allocate under the object's own heap address.  Such handles cannot
    /// collide with driver handles that pass through unregistered.
    pub fn allocate_addressed(&self, object: T) -> u64 {
        let object = Arc::new(object);
        let handle = Arc::as_ptr(&object) as u64;
        self.objects.write().insert(handle, object);
        handle
    }

    /// Register an object under a handle chosen elsewhere (e.g. a driver's raw
    /// `VkDevice`).  Returns the object previously registered under `handle`.
    pub fn insert(&self, handle: u64, object: T) -> Option<Arc<T>> {
        self.objects.write().insert(handle, Arc::new(object))
    }

    pub fn get(&self, handle: u64) -> Option<Arc<T>> {
        self.objects.read().get(&handle).cloned()
    }

    pub fn remove(&self, handle: u64) -> Option<Arc<T>> {
        self.objects.write().remove(&handle)
    }

    /// Get an object via a *dispatchable* handle (address of a DispatchableSlot).
    pub fn get_dispatchable(&self, raw: u64) -> Option<Arc<T>> {
        if raw == 0 {
            return None;
        }
        let index = unsafe { dispatchable_index(raw) }?;
        self.get(index)
    }

    /// Remove an object via a *dispatchable* handle.
    /// Does NOT free the DispatchableSlot itself; call `free_dispatchable` separately.
    pub fn remove_dispatchable(&self, raw: u64) -> Option<Arc<T>> {
        if raw == 0 {
            return None;
        }
        let index = unsafe { dispatchable_index(raw) }?;
        self.remove(index)
    }

    pub fn contains(&self, handle: u64) -> bool {
        self.objects.read().contains_key(&handle)
    }

    pub fn count(&self) -> usize {
        self.objects.read().len()
    }
}

impl<T> Default for HandleAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_allocator() {
        let allocator = HandleAllocator::new();

        let handle1 = allocator.allocate(42);
        let handle2 = allocator.allocate(100);

        assert_ne!(handle1, handle2);
        assert_eq!(*allocator.get(handle1).unwrap(), 42);
        assert_eq!(*allocator.get(handle2).unwrap(), 100);

        allocator.remove(handle1);
        assert!(allocator.get(handle1).is_none());
        assert!(allocator.get(handle2).is_some());
        assert_eq!(allocator.count(), 1);
    }

    #[test]
    fn test_keyed_insert() {
        let allocator = HandleAllocator::new();
        assert!(allocator.insert(0xdead_0000, "device").is_none());
        assert!(allocator.contains(0xdead_0000));
        assert_eq!(*allocator.insert(0xdead_0000, "again").unwrap(), "device");
        assert_eq!(*allocator.get(0xdead_0000).unwrap(), "again");
    }

    #[test]
    fn test_addressed_handles_are_unique() {
        let allocator = HandleAllocator::new();
        let a = allocator.allocate_addressed([0u8; 4]);
        let b = allocator.allocate_addressed([0u8; 4]);
        assert_ne!(a, b);
        assert!(a > 0xFFFF);
        assert!(allocator.contains(a));
        assert!(allocator.remove(b).is_some());
        assert_eq!(allocator.count(), 1);
    }

    #[test]
    fn test_dispatchable_round_trip() {
        let allocator = HandleAllocator::new();
        let index = allocator.allocate("instance");
        let raw = alloc_dispatchable(index);

        let slot = unsafe { &*(raw as *const DispatchableSlot) };
        assert_eq!(slot.loader_magic, ICD_LOADER_MAGIC);
        assert_eq!(*allocator.get_dispatchable(raw).unwrap(), "instance");
        assert!(allocator.get_dispatchable(0).is_none());

        assert!(allocator.remove_dispatchable(raw).is_some());
        assert!(allocator.get_dispatchable(raw).is_none());
        unsafe { free_dispatchable(raw) };
    }
}
