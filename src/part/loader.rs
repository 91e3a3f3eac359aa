//! Loads terminal parts by name and pairs them with a fresh surface
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{info, warn};

use crate::part::part_trait::{PartConfig, PartFactory, TerminalError, TerminalPart};
use crate::surface::Surface;

/// A freshly instantiated part and the surface it displays on
pub struct LoadedPart {
    pub surface: Rc<Surface>,
    pub part: Box<dyn TerminalPart>,
}

/// Registry of part factories keyed by name
#[derive(Default)]
pub struct PartLoader {
    factories: BTreeMap<&'static str, Box<dyn PartFactory>>,
}

impl PartLoader {
    /// A loader with no parts available
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader with the built-in parts registered
    pub fn with_defaults() -> Self {
        let mut loader = Self::new();
        loader.register(crate::part::MemoryPartFactory::default());
        #[cfg(feature = "portable-pty")]
        loader.register(crate::part::PortablePtyFactory);
        loader
    }

    /// Register `factory` under its own name, replacing any previous one
    pub fn register<F>(&mut self, factory: F)
    where
        F: PartFactory + 'static,
    {
        let name = factory.name();
        if self.factories.insert(name, Box::new(factory)).is_some() {
            info!("Replaced part factory: {}", name);
        }
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Names of the registered parts, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Instantiate the part called `name`.
    ///
    /// No surface is created unless the part itself was created.
    pub fn instantiate(&self, name: &str, config: &PartConfig) -> Result<LoadedPart, TerminalError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            warn!("No terminal part registered as {:?}", name);
            TerminalError::NotAvailable(name.to_string())
        })?;

        let part = factory.create(config)?;
        let surface = Surface::new();
        info!("Instantiated part {:?} on {}", part.name(), surface.id());

        Ok(LoadedPart { surface, part })
    }
}
