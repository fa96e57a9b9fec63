//! Per-instance dispatch tables
//!
//! A table maps a command name to the function the loader trampoline calls
//! next.  Commands whose behaviour needs loader-only knowledge (which driver
//! owns a physical device, merging per-driver enumerations) are bound to loader
//! terminators; everything else is bound to whatever the layer chain supplies.
//! A table is fully built before it is published and is never modified again.

use std::sync::Arc;

use ash::vk;
use log::debug;
use rustc_hash::FxHashMap;

use crate::error::{LoaderError, Result};
use crate::gate::InstanceExtensionState;
use crate::pfn::VoidFunction;
use crate::registry::{ExtensionClass, ExtensionRegistry, REGISTRY};
use crate::terminator;

/// `next_in_chain(name) -> pointer | null`, supplied by the chain builder.
pub trait ProcChain: Send + Sync {
    fn next_in_chain(&self, name: &str) -> vk::PFN_vkVoidFunction;
}

/// Chain with no layers in it.
pub struct NoLayers;

impl ProcChain for NoLayers {
    fn next_in_chain(&self, _name: &str) -> vk::PFN_vkVoidFunction {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Terminator,
    Chain,
}

#[derive(Clone, Copy, Debug)]
pub struct Slot {
    pub function: VoidFunction,
    pub kind: SlotKind,
    /// Extension the binding came from, `None` for core commands
    pub extension: Option<&'static str>,
}

#[derive(Debug, Default)]
pub struct DispatchTable {
    slots: FxHashMap<&'static str, Slot>,
}

impl DispatchTable {
    pub fn get(&self, command: &str) -> Option<VoidFunction> {
        self.slots.get(command).map(|slot| slot.function)
    }

    pub fn slot(&self, command: &str) -> Option<&Slot> {
        self.slots.get(command)
    }

    pub fn contains(&self, command: &str) -> bool {
        self.slots.contains_key(command)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn commands(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.keys().copied()
    }
}

pub struct DispatchTableBuilder<'r> {
    registry: &'r ExtensionRegistry,
}

impl<'r> DispatchTableBuilder<'r> {
    pub fn new(registry: &'r ExtensionRegistry) -> Self {
        Self { registry }
    }

    pub fn build(&self, state: &InstanceExtensionState, chain: &dyn ProcChain) -> Result<DispatchTable> {
        let mut slots: FxHashMap<&'static str, Slot> = FxHashMap::default();

        for (name, function) in terminator::core_terminators() {
            bind(
                &mut slots,
                name,
                Slot {
                    function,
                    kind: SlotKind::Terminator,
                    extension: None,
                },
            )?;
        }

        for ext_name in state.enabled_extensions() {
            // Unknown to the loader: nothing to intercept, the chain answers directly
            let Some(entry) = self.registry.lookup(ext_name, ExtensionClass::Instance) else {
                continue;
            };

            for command in &entry.commands {
                let slot = match (entry.requires_terminator, command.terminator) {
                    (true, Some(function)) => Slot {
                        function,
                        kind: SlotKind::Terminator,
                        extension: Some(entry.name),
                    },
                    (true, None) => {
                        return Err(LoaderError::UnresolvedCommand(command.name.to_string()))
                    }
                    // The chain would hand the loader's surface handle to a driver
                    (false, _) if command.routes_surface => {
                        return Err(LoaderError::UnresolvedCommand(command.name.to_string()))
                    }
                    (false, _) => Slot {
                        function: chain
                            .next_in_chain(command.name)
                            .ok_or_else(|| LoaderError::UnresolvedCommand(command.name.to_string()))?,
                        kind: SlotKind::Chain,
                        extension: Some(entry.name),
                    },
                };
                bind(&mut slots, command.name, slot)?;
            }
        }

        debug!(
            "Built dispatch table with {} slot(s) for {:?}",
            slots.len(),
            state.enabled_extensions()
        );
        Ok(DispatchTable { slots })
    }
}

fn bind(slots: &mut FxHashMap<&'static str, Slot>, command: &'static str, slot: Slot) -> Result<()> {
    if let Some(existing) = slots.get(command) {
        return Err(LoaderError::DuplicateTerminatorBinding {
            command: command.to_string(),
            first: existing.extension.unwrap_or("core").to_string(),
            second: slot.extension.unwrap_or("core").to_string(),
        });
    }
    debug!("Binding {} -> {:?}", command, slot.kind);
    slots.insert(command, slot);
    Ok(())
}

/// Build the dispatch table of an instance against the built-in registry.
pub fn build_dispatch_table(state: &InstanceExtensionState, chain: &dyn ProcChain) -> Result<Arc<DispatchTable>> {
    DispatchTableBuilder::new(&REGISTRY).build(state, chain).map(Arc::new)
}
