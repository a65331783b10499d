//! file: core/src/ir/opt/mod.rs
//! description: the per-function pass pipeline run after lowering.
//!
//! Order: linearize, constant propagation, liveness, dead-assignment
//! elimination, unreachable-block removal, listing capture, temp
//! compression. Linearization always runs; the listing and the remaining
//! rewrites are controlled by `CodegenOptions`. Compression leaves the
//! liveness data stale, so it is cleared once compression is done.
//!
pub mod compress;
pub mod const_prop;
pub mod dce;
pub mod linearize;
pub mod liveness;

use crate::ir::module::{Function, Module};
use crate::ir::options::CodegenOptions;

pub use compress::compress_temps;
pub use const_prop::propagate_constants;
pub use dce::{remove_dead_assignments, remove_unreachable_blocks};
pub use linearize::linearize;
pub use liveness::compute_liveness;

/// Runs the pipeline over every function of `module`.
pub fn optimize_module(module: &mut Module, options: &CodegenOptions) {
    for function in &mut module.functions {
        optimize_function(function, options);
    }
}

pub fn optimize_function(function: &mut Function, options: &CodegenOptions) {
    let name = function.display_name();
    let before = (function.blocks.len(), function.temp_count);

    linearize(function);
    log::trace!("{}: {} block(s) after linearization", name, function.blocks.len());

    if options.constant_propagation {
        propagate_constants(function);
    }

    compute_liveness(function);

    if options.dead_code_elimination {
        let removed = remove_dead_assignments(function);
        let dropped = remove_unreachable_blocks(function);
        log::trace!("{}: removed {} dead assignment(s) and {} block(s)", name, removed, dropped);
    }

    if options.show_intermediate_output {
        function.listing = Some(function.listing_with_liveness());
    }

    if options.compress_temps {
        compress_temps(function);
    }
    liveness::clear_liveness(function);

    log::debug!(
        "{}: {} -> {} block(s), {} -> {} temp(s)",
        name,
        before.0,
        function.blocks.len(),
        before.1,
        function.temp_count
    );
}
