//! The Helios language pipeline: source text to metered bytecode.
//!
//! `compile` runs lexing, parsing, type checking, IR lowering, the
//! optimizer and bytecode emission as one synchronous unit of work with
//! no shared state between compilations.

pub mod ast;
pub mod emit;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod types;

use helios_machine::Program;
use helios_primitives::{CodeMap, Site, Sources};
use tracing::debug;

use ast::Purpose;
use error::LangResult;
use ir::IrNode;

/// Version header stamped on emitted programs.
pub const LANGUAGE_VERSION: (u64, u64, u64) = (1, 0, 0);

/// A fully compiled script plus everything needed to attribute runtime
/// behavior back to the source.
#[derive(Debug)]
pub struct CompiledProgram {
    pub purpose: Purpose,
    pub name: String,
    /// Optimized (or raw, when simplification is off) IR.
    pub ir: IrNode,
    pub program: Program,
    pub code_map: CodeMap,
    pub sources: Sources,
    info_offsets: Vec<(String, usize)>,
}

impl CompiledProgram {
    /// Pretty-printed IR annotated with original source sites.
    pub fn pretty_ir(&self) -> String {
        self.ir.pretty(&self.sources)
    }

    /// The source site of the first IR node able to raise this info
    /// string, resolved through the code map.
    pub fn site_of_info(&self, info: &str) -> Option<Site> {
        self.info_offsets
            .iter()
            .find(|(i, _)| i == info)
            .and_then(|(_, offset)| self.code_map.lookup(*offset))
    }

    pub fn render_site(&self, site: Site) -> String {
        self.sources.render(site)
    }
}

/// Compiles a single-file script.
pub fn compile(name: &str, text: &str, simplify: bool) -> LangResult<CompiledProgram> {
    compile_with_modules(name, text, &[], simplify)
}

/// Compiles a script against a set of importable module sources, given
/// as (file name, text) pairs.
pub fn compile_with_modules(
    name: &str,
    text: &str,
    modules: &[(&str, &str)],
    simplify: bool,
) -> LangResult<CompiledProgram> {
    let mut sources = Sources::new();

    let main_id = sources.add(name, text);
    let script = parse::parse(sources.get(main_id).expect("just added"))?;

    let module_scripts = modules
        .iter()
        .map(|(module_name, module_text)| {
            let id = sources.add(*module_name, *module_text);
            parse::parse(sources.get(id).expect("just added"))
        })
        .collect::<LangResult<Vec<_>>>()?;

    let checked = types::check::check(&script, &module_scripts)?;

    let ir = ir::build::build(&checked, Site::at(main_id, 0));
    let raw_nodes = ir.count();

    let ir = if simplify { ir::optimize::optimize(ir) } else { ir };

    debug!(
        script = %checked.name,
        purpose = %checked.purpose,
        raw_nodes,
        final_nodes = ir.count(),
        simplify,
        "compiled script"
    );

    let emitted = emit::emit(&ir);

    Ok(CompiledProgram {
        purpose: checked.purpose,
        name: checked.name,
        ir,
        program: Program::new(LANGUAGE_VERSION, emitted.term),
        code_map: emitted.code_map,
        sources,
        info_offsets: emitted.info_offsets,
    })
}

/// Reads the purpose header without compiling.
pub fn peek_purpose(name: &str, text: &str) -> LangResult<(String, String)> {
    let mut sources = Sources::new();
    let id = sources.add(name, text);
    lex::peek_purpose(sources.get(id).expect("just added"))
}
