//! JIT module ownership and the top-level driver.
//!
//! `Jit` wraps the Cranelift `JITModule` for the host target; `Compiler`
//! owns one `Jit` plus the scope chain and compiles a whole program: the
//! top-level forms become the body of an implicit zero-parameter `main`,
//! which is finalized and invoked natively.

use cranelift_codegen::settings::{self, Configurable};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::Module;

use crate::ast::Expr;
use crate::error::LyreError;
use crate::jit::translate::compile_function;
use crate::scope::ScopeStack;

/// The Cranelift JIT module plus per-module compilation state.
pub struct Jit {
    pub(crate) module: JITModule,
    next_ordinal: u32,
    pub(crate) dump_ir: bool,
}

impl Jit {
    /// Configure Cranelift for the host and create an empty JIT module.
    pub fn new() -> Result<Self, LyreError> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("use_colocated_libcalls", "false")
            .map_err(|e| LyreError::codegen(e.to_string()))?;
        flag_builder
            .set("is_pic", "false")
            .map_err(|e| LyreError::codegen(e.to_string()))?;
        flag_builder
            .set("opt_level", "speed")
            .map_err(|e| LyreError::codegen(e.to_string()))?;

        let isa_builder = cranelift_native::builder().map_err(LyreError::codegen)?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| LyreError::codegen(e.to_string()))?;

        let builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        Ok(Jit {
            module: JITModule::new(builder),
            next_ordinal: 0,
            dump_ir: false,
        })
    }

    /// A fresh per-function ordinal; used both to tag slot ownership and
    /// to keep module-level symbol names unique across redefinitions.
    pub(crate) fn fresh_ordinal(&mut self) -> u32 {
        let n = self.next_ordinal;
        self.next_ordinal += 1;
        n
    }
}

/// Compiles and runs one program.
pub struct Compiler {
    jit: Jit,
    scopes: ScopeStack,
}

impl Compiler {
    pub fn new() -> Result<Self, LyreError> {
        Ok(Compiler {
            jit: Jit::new()?,
            scopes: ScopeStack::with_builtins(),
        })
    }

    /// Dump the Cranelift IR of each compiled function to stderr.
    pub fn dump_ir(&mut self, enabled: bool) {
        self.jit.dump_ir = enabled;
    }

    /// Compile the top-level forms as the body of a zero-parameter `main`,
    /// then execute it and return its integer result.
    ///
    /// Consumes the compiler: the produced code lives in the JIT module's
    /// memory, which is released when `self` is dropped at the end of the
    /// call.
    pub fn run(mut self, program: &[Expr]) -> Result<i64, LyreError> {
        let main_id = compile_function(&mut self.jit, &mut self.scopes, "main", &[], program)?;

        self.jit
            .module
            .finalize_definitions()
            .map_err(|e| LyreError::codegen(e.to_string()))?;

        let entry = self.jit.module.get_finalized_function(main_id);
        let main = unsafe { std::mem::transmute::<*const u8, extern "C" fn() -> i64>(entry) };
        Ok(main())
    }
}
