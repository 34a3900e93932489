mod core;
pub(crate) mod fmt;
mod iter;
mod value;

use crate::render::core::RendererImpl;
use crate::types::program::Program;
use crate::value::Map;
use crate::{Environment, Result, Sections, Value};

/// Renders a compiled view program with the given variables in scope.
///
/// `depth` is the number of views between this one and the top-level render.
pub(crate) fn program(
    env: &Environment,
    program: &Program,
    vars: Map<String, Value>,
    sections: &mut Sections,
    depth: usize,
) -> Result<String> {
    RendererImpl {
        env,
        program,
        scope: vars,
        loops: Vec::new(),
        depth,
    }
    .render(sections)
}
