//! Geometry operators for the combine host.
//!
//! Call [`register`] once when the host loads the plugin; afterwards the
//! operators can be created by class name through the host registry.

mod parallel;
pub mod ops;

use combine_core::{HostError, OpRegistry};

pub use ops::combine_geometry::{check_correspondence, combine, midpoint, CombineGeometry};

pub fn register(registry: &mut OpRegistry) -> Result<(), HostError> {
    for description in ops::descriptions() {
        registry.register(description)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use combine_core::Host;

    #[test]
    fn register_publishes_combine_geometry() {
        let mut registry = OpRegistry::with_builtins();
        register(&mut registry).unwrap();

        let description = registry
            .description(ops::combine_geometry::CLASS)
            .unwrap();
        assert_eq!(description.class, "CombineGeometry");
        assert_eq!(description.help, "Combine geometries of two objects");

        let mut host = Host::new(registry);
        let node = host.create_node("CombineGeometry").unwrap();
        assert_eq!(host.graph().node(node).unwrap().inputs.len(), 2);
    }

    #[test]
    fn register_twice_fails() {
        let mut registry = OpRegistry::with_builtins();
        register(&mut registry).unwrap();
        assert_eq!(
            register(&mut registry),
            Err(HostError::DuplicateClass("CombineGeometry".to_string()))
        );
    }
}
