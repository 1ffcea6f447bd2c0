pub mod ast_printer;
pub mod emitter;
pub mod functions;
pub mod names;
pub mod referentializer;
pub mod serializer;

use log::info;

use residue_core::error::CoreError;
use residue_core::heap::HeapGraph;
use residue_core::js_ast::{JsExpr, JsFunction, JsStmt};
use residue_core::pipeline::{
    Backend, BackendInput, BackendOutput, MaterializationStats, SerializerConfig,
};

use serializer::ResidualHeapSerializer;

/// JavaScript residual program backend.
pub struct JsBackend;

impl Backend for JsBackend {
    fn name(&self) -> &str {
        "javascript"
    }

    fn emit(&self, input: BackendInput) -> Result<BackendOutput, CoreError> {
        let program = materialize(&input.graph, &input.config)?;
        Ok(BackendOutput {
            source: program.to_source(),
            stats: program.stats,
        })
    }
}

/// A materialized program before printing.
#[derive(Debug, Clone)]
pub struct ResidualProgram {
    pub directives: Vec<String>,
    /// Referentialization bootstrap, factories, optimized roots and the
    /// lazy-object initializer.
    pub prelude: Vec<JsStmt>,
    /// Value declarations and effects.
    pub body: Vec<JsStmt>,
    pub wrap_iife: bool,
    pub stats: MaterializationStats,
}

impl ResidualProgram {
    /// Prelude followed by body.
    pub fn statements(&self) -> Vec<JsStmt> {
        self.prelude.iter().chain(&self.body).cloned().collect()
    }

    pub fn to_source(&self) -> String {
        let stmts = self.statements();
        if !self.wrap_iife {
            return ast_printer::print_program(&self.directives, &stmts);
        }
        let wrapper = JsFunction {
            body: stmts,
            directives: self.directives.clone(),
            ..Default::default()
        };
        let call = JsExpr::method_call(
            JsExpr::Function(Box::new(wrapper)),
            "call",
            vec![JsExpr::This],
        );
        ast_printer::print_program(&[], &[JsStmt::Expr(call)])
    }
}

/// Serialize `graph` into a residual program.
pub fn materialize(
    graph: &HeapGraph,
    config: &SerializerConfig,
) -> Result<ResidualProgram, CoreError> {
    let program = ResidualHeapSerializer::new(graph, config)?.serialize()?;
    info!("materialized residual program: {}", program.stats);
    Ok(program)
}
