use combine_core::{
    GeoOp, GeometryList, Inputs, Mismatch, NodeHandle, OpDescription, OpError, Scene,
};
use glam::Vec3;

use crate::parallel::{for_each_indexed_mut, zip_for_each_mut};

pub const CLASS: &str = "CombineGeometry";
pub const HELP: &str = "Combine geometries of two objects";

pub const DESCRIPTION: OpDescription = OpDescription::new(CLASS, HELP, build);

const PRIMARY: usize = 0;
const SECONDARY: usize = 1;
const INPUTS: usize = 2;

fn build(node: NodeHandle) -> Box<dyn GeoOp> {
    Box::new(CombineGeometry::new(node))
}

/// Averages the points of two geometry inputs index by index.
///
/// The output keeps everything else (topology, normals, uvs, transforms)
/// from the primary input.
#[derive(Debug, Clone)]
pub struct CombineGeometry {
    node: NodeHandle,
}

impl CombineGeometry {
    pub fn new(node: NodeHandle) -> Self {
        Self { node }
    }

    pub fn node(&self) -> NodeHandle {
        self.node
    }
}

impl GeoOp for CombineGeometry {
    fn class(&self) -> &'static str {
        CLASS
    }

    fn node_help(&self) -> &'static str {
        HELP
    }

    fn minimum_inputs(&self) -> usize {
        INPUTS
    }

    fn maximum_inputs(&self) -> usize {
        INPUTS
    }

    fn validate(&mut self, inputs: &dyn Inputs, for_real: bool) -> Result<(), OpError> {
        for input in [PRIMARY, SECONDARY] {
            inputs.validate(input, for_real)?;
        }
        if inputs.input_count() != INPUTS {
            return Err(OpError::Message(format!(
                "{CLASS} expects {INPUTS} inputs, found {}",
                inputs.input_count()
            )));
        }
        Ok(())
    }

    fn geometry_engine(
        &mut self,
        inputs: &dyn Inputs,
        scene: &mut Scene,
        out: &mut GeometryList,
    ) -> Result<(), OpError> {
        // The output starts as a copy of the primary input.
        inputs.fetch(PRIMARY, scene, out)?;

        let mut secondary_scene = Scene::new();
        let mut secondary = GeometryList::new();
        inputs.fetch(SECONDARY, &mut secondary_scene, &mut secondary)?;

        if let Err(mismatch) = check_correspondence(out, &secondary) {
            out.clear();
            return Err(OpError::MismatchedInputs(mismatch));
        }

        average_points(out, &secondary);
        tracing::debug!(
            "{:?}: averaged {} objects",
            self.node.id(),
            out.objects()
        );
        Ok(())
    }
}

/// Checks that both lists agree on object count and per-object point count.
/// Stops at the first disagreement.
pub fn check_correspondence(
    primary: &GeometryList,
    secondary: &GeometryList,
) -> Result<(), Mismatch> {
    let objects = primary.objects();
    if secondary.objects() != objects {
        return Err(Mismatch::ObjectCount {
            primary: objects,
            secondary: secondary.objects(),
        });
    }

    for (object, (a, b)) in primary.iter().zip(secondary.iter()).enumerate() {
        if a.point_count() != b.point_count() {
            return Err(Mismatch::PointCount {
                object,
                primary: a.point_count(),
                secondary: b.point_count(),
            });
        }
    }
    Ok(())
}

// Callers run check_correspondence first; unmatched objects are skipped.
fn average_points(out: &mut GeometryList, secondary: &GeometryList) {
    let work: usize = secondary.iter().map(|object| object.point_count()).sum();
    for_each_indexed_mut(out.objects_mut(), work, |index, object| {
        let Some(other) = secondary.object(index) else {
            return;
        };
        zip_for_each_mut(object.points_mut(), other.points(), |point, other| {
            *point = midpoint(*point, *other);
        });
        tracing::trace!("object {}: {} points", index, other.point_count());
    });
}

pub fn midpoint(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    ((Vec3::from(a) + Vec3::from(b)) / 2.0).to_array()
}

/// Standalone form of the operator for callers that already hold both lists.
pub fn combine(
    primary: &GeometryList,
    secondary: &GeometryList,
) -> Result<GeometryList, Mismatch> {
    check_correspondence(primary, secondary)?;
    let mut out = primary.clone();
    average_points(&mut out, secondary);
    Ok(out)
}
