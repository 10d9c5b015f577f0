pub mod combine_geometry;

use combine_core::OpDescription;

pub fn descriptions() -> Vec<OpDescription> {
    vec![combine_geometry::DESCRIPTION]
}
