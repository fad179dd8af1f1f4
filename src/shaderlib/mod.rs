//! Ready-made graphs, compiled by the demo binary.

mod utils;

pub mod flat_color;
pub mod lit_texture;
pub mod mix_color;

use shadegraph::shader::{Error, Graph, Unvalidated};

type GraphResult = Result<Graph<Unvalidated>, Error>;

macro_rules! create_shaderlib {
    ($($lib:ident),+ $(,)?) => {
        /// Every ready-made graph with its name.
        pub fn shaderlib() -> Vec<(&'static str, fn() -> GraphResult)> {
            vec![
                $(
                    (stringify!($lib), $lib::graph as fn() -> GraphResult)
                ),+
            ]
        }
    };
}

create_shaderlib! {
    flat_color,
    lit_texture,
    mix_color,
}
