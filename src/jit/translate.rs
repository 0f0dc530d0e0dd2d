//! Expression lowering: the dispatcher and the special forms.
//!
//! `FunctionLowering` drives one Cranelift function: it owns the
//! `FunctionBuilder` cursor and threads the shared scope chain and JIT
//! module through every recursive `lower` call. Dispatch order is fixed:
//! literal, symbol resolution, the empty list, the five reserved special
//! forms (recognized on the literal head symbol before any binding
//! lookup), then generic invocation.

use cranelift_codegen::ir::types::I64;
use cranelift_codegen::ir::{AbiParam, InstBuilder, UserFuncName, Value};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext, Variable};
use cranelift_module::{FuncId, Linkage, Module};
use smallvec::SmallVec;

use crate::ast::Expr;
use crate::error::LyreError;
use crate::jit::compiler::Jit;
use crate::jit::merge::MergePoint;
use crate::scope::{Binding, ScopeStack};

/// Lowering context for a single function under construction.
pub(crate) struct FunctionLowering<'a, 'b> {
    pub(crate) builder: FunctionBuilder<'b>,
    pub(crate) jit: &'a mut Jit,
    pub(crate) scopes: &'a mut ScopeStack,
    /// Ordinal of this function; slots it allocates are tagged with it.
    ordinal: u32,
    /// Next fresh Cranelift variable index.
    next_var: u32,
}

/// Compile one function: declare it, bind its name in the *enclosing*
/// scope (so recursive self-reference resolves while the body is still
/// being lowered), then lower the body in a fresh scope frame.
pub(crate) fn compile_function(
    jit: &mut Jit,
    scopes: &mut ScopeStack,
    name: &str,
    params: &[&str],
    body: &[Expr],
) -> Result<FuncId, LyreError> {
    let mut sig = jit.module.make_signature();
    for _ in params {
        sig.params.push(AbiParam::new(I64));
    }
    sig.returns.push(AbiParam::new(I64));

    let ordinal = jit.fresh_ordinal();
    // The ordinal keeps module symbols unique when a name is redefined.
    let symbol = format!("f{}_{}", ordinal, name);
    let func_id = jit
        .module
        .declare_function(&symbol, Linkage::Local, &sig)
        .map_err(|e| LyreError::codegen(e.to_string()))?;

    scopes.define(
        name,
        Binding::Function {
            id: func_id,
            arity: params.len(),
        },
    );

    let mut ctx = jit.module.make_context();
    ctx.func.signature = sig;
    ctx.func.name = UserFuncName::user(0, func_id.as_u32());

    let mut builder_ctx = FunctionBuilderContext::new();
    let builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);

    scopes.push();
    let mut fx = FunctionLowering {
        builder,
        jit,
        scopes,
        ordinal,
        next_var: 0,
    };

    let entry = fx.builder.create_block();
    fx.builder.append_block_params_for_function_params(entry);
    fx.builder.switch_to_block(entry);
    fx.builder.seal_block(entry);

    let incoming: SmallVec<[Value; 4]> = fx.builder.block_params(entry).iter().copied().collect();
    for (formal, value) in params.iter().zip(incoming) {
        fx.declare_slot(formal, value);
    }

    let result = fx.lower_sequence(name, body);
    let FunctionLowering {
        mut builder,
        jit,
        scopes,
        ..
    } = fx;
    let value = match result {
        Ok(value) => value,
        Err(e) => {
            scopes.pop();
            return Err(e);
        }
    };
    builder.ins().return_(&[value]);
    builder.finalize();
    scopes.pop();

    if jit.dump_ir {
        eprintln!("; {}\n{}", symbol, ctx.func);
    }

    jit.module
        .define_function(func_id, &mut ctx)
        .map_err(|e| LyreError::codegen(e.to_string()))?;

    Ok(func_id)
}

impl FunctionLowering<'_, '_> {
    /// Lower one expression into a value in the current block.
    pub(crate) fn lower(&mut self, expr: &Expr) -> Result<Value, LyreError> {
        match expr {
            Expr::Int(n) => Ok(self.builder.ins().iconst(I64, *n)),
            Expr::Str(_) => Err(LyreError::unsupported_literal("string")),
            Expr::Sym(name) => self.lower_symbol(name),
            Expr::List(items) => {
                let (head, operands) = match items.split_first() {
                    Some(split) => split,
                    None => return Err(LyreError::EmptyInvocation),
                };
                // Reserved keywords win over any binding of the same name,
                // but only in head position.
                if let Some(keyword) = head.as_sym() {
                    match keyword {
                        "defn" => return self.lower_defn(operands),
                        "cond" => return self.lower_cond(operands),
                        "let" => return self.lower_let(operands),
                        "while" => return self.lower_while(operands),
                        "set!" => return self.lower_set(operands),
                        _ => {}
                    }
                }
                self.lower_call(head, operands)
            }
        }
    }

    fn lower_symbol(&mut self, name: &str) -> Result<Value, LyreError> {
        match self.scopes.resolve(name) {
            Some(Binding::Slot { owner, var }) => {
                if owner != self.ordinal {
                    return Err(LyreError::unsupported_capture(name));
                }
                Ok(self.builder.use_var(var))
            }
            Some(Binding::Function { id, .. }) => {
                let func_ref = self.jit.module.declare_func_in_func(id, self.builder.func);
                Ok(self.builder.ins().func_addr(I64, func_ref))
            }
            Some(Binding::Builtin(_)) => Err(LyreError::builtin_as_value(name)),
            None => Err(LyreError::unbound_symbol(name)),
        }
    }

    fn lower_call(&mut self, head: &Expr, args: &[Expr]) -> Result<Value, LyreError> {
        let name = match head.as_sym() {
            Some(name) => name,
            None => return Err(LyreError::invalid_callee(head.to_string())),
        };
        match self.scopes.resolve(name) {
            Some(Binding::Function { id, arity }) => {
                if args.len() != arity {
                    return Err(LyreError::call_arity(name, arity, args.len()));
                }
                let mut values: SmallVec<[Value; 4]> = SmallVec::new();
                for arg in args {
                    values.push(self.lower(arg)?);
                }
                let func_ref = self.jit.module.declare_func_in_func(id, self.builder.func);
                let call = self.builder.ins().call(func_ref, &values);
                Ok(self.builder.inst_results(call)[0])
            }
            Some(Binding::Builtin(builtin)) => builtin.apply(self, name, args),
            Some(Binding::Slot { .. }) => Err(LyreError::not_callable(name)),
            None => Err(LyreError::unbound_callee(name)),
        }
    }

    /// `(defn name (params...) body...)`
    ///
    /// Compiles a complete independent function; the form's own value is
    /// the new function's address in the enclosing function.
    fn lower_defn(&mut self, operands: &[Expr]) -> Result<Value, LyreError> {
        let (name, params, body) = match operands {
            [Expr::Sym(name), Expr::List(params), body @ ..] => (name, params, body),
            _ => {
                return Err(LyreError::malformed_defn(
                    "expected (defn name (params...) body...)",
                ))
            }
        };
        let mut formals = Vec::with_capacity(params.len());
        for param in params {
            match param.as_sym() {
                Some(formal) => formals.push(formal),
                None => return Err(LyreError::malformed_defn("parameters must be symbols")),
            }
        }

        let func_id = compile_function(self.jit, self.scopes, name, &formals, body)?;
        let func_ref = self
            .jit
            .module
            .declare_func_in_func(func_id, self.builder.func);
        Ok(self.builder.ins().func_addr(I64, func_ref))
    }

    /// `(cond (test1 result1) (test2 result2) ...)`
    ///
    /// A chain of test blocks. Each true test jumps to its result block,
    /// which lowers the result and joins; a false test falls through to
    /// the next test. The all-false fallthrough contributes 0. Only the
    /// first true clause's result executes at runtime.
    fn lower_cond(&mut self, clauses: &[Expr]) -> Result<Value, LyreError> {
        let mut join = MergePoint::new(&mut self.builder);

        for clause in clauses {
            let pair = match clause {
                Expr::List(items) if items.len() == 2 => items,
                _ => {
                    return Err(LyreError::malformed_cond(
                        "each clause must be a (test result) pair",
                    ))
                }
            };
            let test = self.lower(&pair[0])?;
            let result_block = self.builder.create_block();
            let next_block = self.builder.create_block();
            // truthiness: any nonzero value takes the branch
            self.builder
                .ins()
                .brif(test, result_block, &[], next_block, &[]);

            self.builder.switch_to_block(result_block);
            self.builder.seal_block(result_block);
            let value = self.lower(&pair[1])?;
            join.arrive(&mut self.builder, value);

            self.builder.switch_to_block(next_block);
            self.builder.seal_block(next_block);
        }

        let zero = self.builder.ins().iconst(I64, 0);
        join.arrive(&mut self.builder, zero);
        join.seal(&mut self.builder);
        Ok(join.switch_to(&mut self.builder))
    }

    /// `(let ((sym1 expr1) ...) body...)`
    ///
    /// Sequential binding: each initializer is lowered before its own
    /// symbol is defined but after all earlier ones are visible.
    fn lower_let(&mut self, operands: &[Expr]) -> Result<Value, LyreError> {
        let (binders, body) = match operands.split_first() {
            Some((Expr::List(binders), body)) => (binders, body),
            Some(_) => return Err(LyreError::malformed_let("bindings must be a list")),
            None => {
                return Err(LyreError::malformed_let(
                    "expected (let (bindings...) body...)",
                ))
            }
        };

        self.scopes.push();
        let result = self.lower_let_inner(binders, body);
        // released on every exit path
        self.scopes.pop();
        result
    }

    fn lower_let_inner(&mut self, binders: &[Expr], body: &[Expr]) -> Result<Value, LyreError> {
        for binder in binders {
            let (name, init) = match binder {
                Expr::List(pair) if pair.len() == 2 => match pair[0].as_sym() {
                    Some(name) => (name, &pair[1]),
                    None => {
                        return Err(LyreError::malformed_let("binding name must be a symbol"))
                    }
                },
                _ => {
                    return Err(LyreError::malformed_let(
                        "each binding must be a (name expr) pair",
                    ))
                }
            };
            let value = self.lower(init)?;
            self.declare_slot(name, value);
        }
        self.lower_sequence("let", body)
    }

    /// `(while test body...)`
    ///
    /// The header block carries the loop's running value: 0 from the entry
    /// edge, the last body value from the back edge. The test is lowered
    /// inside the header, so it re-runs before every iteration; the form's
    /// value is the carried merge observed in the exit block.
    fn lower_while(&mut self, operands: &[Expr]) -> Result<Value, LyreError> {
        let (test, body) = match operands.split_first() {
            Some(split) => split,
            None => {
                return Err(LyreError::malformed_while(
                    "expected (while test body...)",
                ))
            }
        };

        let mut header = MergePoint::new(&mut self.builder);
        let zero = self.builder.ins().iconst(I64, 0);
        header.arrive(&mut self.builder, zero);

        let carried = header.switch_to(&mut self.builder);
        let test_value = self.lower(test)?;
        let body_block = self.builder.create_block();
        let exit_block = self.builder.create_block();
        self.builder
            .ins()
            .brif(test_value, body_block, &[], exit_block, &[]);

        self.builder.switch_to_block(body_block);
        self.builder.seal_block(body_block);
        let body_value = self.lower_sequence("while", body)?;
        header.arrive(&mut self.builder, body_value);
        // back edge emitted; the header's predecessors are now complete
        header.seal(&mut self.builder);

        self.builder.switch_to_block(exit_block);
        self.builder.seal_block(exit_block);
        Ok(carried)
    }

    /// `(set! target expr)` — target must be a mutable slot of this
    /// function.
    fn lower_set(&mut self, operands: &[Expr]) -> Result<Value, LyreError> {
        let (target, init) = match operands {
            [Expr::Sym(target), init] => (target, init),
            _ => return Err(LyreError::malformed_set("expected (set! name expr)")),
        };
        match self.scopes.resolve(target) {
            Some(Binding::Slot { owner, var }) if owner == self.ordinal => {
                let value = self.lower(init)?;
                self.builder.def_var(var, value);
                Ok(value)
            }
            Some(Binding::Slot { .. }) => Err(LyreError::unsupported_capture(target)),
            Some(Binding::Function { .. }) | Some(Binding::Builtin(_)) | None => {
                Err(LyreError::invalid_set_target(target))
            }
        }
    }

    /// Lower expressions in order; the last value is the sequence's value.
    fn lower_sequence(&mut self, what: &str, exprs: &[Expr]) -> Result<Value, LyreError> {
        let mut value = None;
        for expr in exprs {
            value = Some(self.lower(expr)?);
        }
        value.ok_or_else(|| LyreError::empty_body(what))
    }

    /// Allocate a mutable slot holding `value` and bind it in the
    /// innermost scope frame. Used for parameters and `let` locals.
    fn declare_slot(&mut self, name: &str, value: Value) {
        let var = Variable::from_u32(self.next_var);
        self.next_var += 1;
        self.builder.declare_var(var, I64);
        self.builder.def_var(var, value);
        self.scopes.define(
            name,
            Binding::Slot {
                owner: self.ordinal,
                var,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LyreError;
    use crate::eval_str;

    #[test]
    fn test_integer_literal_is_identity() {
        assert_eq!(eval_str("0").unwrap(), 0);
        assert_eq!(eval_str("42").unwrap(), 42);
        assert_eq!(eval_str("-9").unwrap(), -9);
    }

    #[test]
    fn test_last_top_level_form_wins() {
        assert_eq!(eval_str("1 2 3").unwrap(), 3);
    }

    #[test]
    fn test_arithmetic_folds() {
        assert_eq!(eval_str("(+ 1 2 3 4)").unwrap(), 10);
        assert_eq!(eval_str("(- 10 3 2)").unwrap(), 5);
        assert_eq!(eval_str("(* 2 3 4)").unwrap(), 24);
        assert_eq!(eval_str("(/ 100 5 2)").unwrap(), 10);
        assert_eq!(eval_str("(+ 7)").unwrap(), 7);
    }

    #[test]
    fn test_signed_division_truncates() {
        assert_eq!(eval_str("(/ -7 2)").unwrap(), -3);
    }

    #[test]
    fn test_comparison_chains_genuinely() {
        assert_eq!(eval_str("(< 1 2 3)").unwrap(), 1);
        assert_eq!(eval_str("(< 1 3 2)").unwrap(), 0);
        assert_eq!(eval_str("(= 5 5 5)").unwrap(), 1);
        assert_eq!(eval_str("(= 5 5 6)").unwrap(), 0);
        assert_eq!(eval_str("(>= 3 3 2)").unwrap(), 1);
        assert_eq!(eval_str("(not= 1 2)").unwrap(), 1);
    }

    #[test]
    fn test_builtin_arity_errors() {
        assert!(matches!(
            eval_str("(+)"),
            Err(LyreError::NotEnoughArgs { min: 1, got: 0, .. })
        ));
        assert!(matches!(
            eval_str("(< 1)"),
            Err(LyreError::NotEnoughArgs { min: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_cond_takes_first_true_clause() {
        assert_eq!(eval_str("(cond (0 1) (1 2) (1 3))").unwrap(), 2);
    }

    #[test]
    fn test_cond_all_false_yields_zero() {
        assert_eq!(eval_str("(cond (0 9))").unwrap(), 0);
        assert_eq!(eval_str("(cond)").unwrap(), 0);
    }

    #[test]
    fn test_cond_short_circuits_past_faulting_clause() {
        // the division by zero exists in the compiled output but is never
        // reached at runtime
        assert_eq!(eval_str("(cond (1 5) (1 (/ 1 0)))").unwrap(), 5);
    }

    #[test]
    fn test_cond_nested_in_test_position() {
        assert_eq!(eval_str("(cond ((cond (0 1)) 7) (1 8))").unwrap(), 8);
    }

    #[test]
    fn test_malformed_cond() {
        assert!(matches!(
            eval_str("(cond 5)"),
            Err(LyreError::MalformedCond { .. })
        ));
        assert!(matches!(
            eval_str("(cond (1))"),
            Err(LyreError::MalformedCond { .. })
        ));
    }

    #[test]
    fn test_let_sequential_visibility() {
        assert_eq!(eval_str("(let ((a 1) (b (+ a 1))) b)").unwrap(), 2);
        assert_eq!(eval_str("(let ((a 1) (b a)) b)").unwrap(), 1);
    }

    #[test]
    fn test_let_shadowing_restored_after_body() {
        assert_eq!(
            eval_str("(let ((x 1)) (+ (let ((x 10)) x) x))").unwrap(),
            11
        );
    }

    #[test]
    fn test_keyword_names_usable_in_value_position() {
        assert_eq!(eval_str("(let ((while 5)) while)").unwrap(), 5);
    }

    #[test]
    fn test_malformed_let() {
        assert!(matches!(
            eval_str("(let (x) 1)"),
            Err(LyreError::MalformedLet { .. })
        ));
        assert!(matches!(
            eval_str("(let ((1 2)) 3)"),
            Err(LyreError::MalformedLet { .. })
        ));
        assert!(matches!(
            eval_str("(let 5 1)"),
            Err(LyreError::MalformedLet { .. })
        ));
    }

    #[test]
    fn test_let_empty_body() {
        assert!(matches!(
            eval_str("(let ((a 1)))"),
            Err(LyreError::EmptyBody { .. })
        ));
    }

    #[test]
    fn test_malformed_while() {
        assert!(matches!(
            eval_str("(while)"),
            Err(LyreError::MalformedWhile { .. })
        ));
    }

    #[test]
    fn test_while_never_entered_yields_zero() {
        assert_eq!(eval_str("(while 0 99)").unwrap(), 0);
    }

    #[test]
    fn test_while_yields_last_body_value() {
        // each pass yields the pre-decrement value; the final pass sees 1
        assert_eq!(
            eval_str("(let ((n 3)) (while n (let ((p n)) (set! n (- n 1)) p)))").unwrap(),
            1
        );
    }

    #[test]
    fn test_while_accumulates_via_set() {
        assert_eq!(
            eval_str(
                "(let ((i 0) (acc 0))
                   (while (< i 5)
                     (set! acc (+ acc i))
                     (set! i (+ i 1)))
                   acc)"
            )
            .unwrap(),
            10
        );
    }

    #[test]
    fn test_set_yields_stored_value() {
        assert_eq!(eval_str("(let ((x 1)) (set! x 9))").unwrap(), 9);
    }

    #[test]
    fn test_set_on_unknown_name_fails() {
        assert!(matches!(
            eval_str("(set! nope 1)"),
            Err(LyreError::InvalidSetTarget { .. })
        ));
    }

    #[test]
    fn test_set_on_builtin_fails() {
        assert!(matches!(
            eval_str("(set! + 1)"),
            Err(LyreError::InvalidSetTarget { .. })
        ));
    }

    #[test]
    fn test_set_on_function_name_fails() {
        assert!(matches!(
            eval_str("(defn f (x) x) (set! f 3)"),
            Err(LyreError::InvalidSetTarget { .. })
        ));
    }

    #[test]
    fn test_malformed_set() {
        assert!(matches!(
            eval_str("(set! x)"),
            Err(LyreError::MalformedSet { .. })
        ));
        assert!(matches!(
            eval_str("(set! 1 2)"),
            Err(LyreError::MalformedSet { .. })
        ));
    }

    #[test]
    fn test_defn_and_call() {
        assert_eq!(eval_str("(defn double (x) (* x 2)) (double 21)").unwrap(), 42);
    }

    #[test]
    fn test_defn_recursive_factorial() {
        assert_eq!(
            eval_str(
                "(defn fact (n)
                   (cond ((< n 2) 1)
                         (1 (* n (fact (- n 1))))))
                 (fact 10)"
            )
            .unwrap(),
            3628800
        );
    }

    #[test]
    fn test_defn_value_is_nonzero_address() {
        assert_ne!(eval_str("(defn f () 5)").unwrap(), 0);
    }

    #[test]
    fn test_defn_shadows_builtin() {
        assert_eq!(eval_str("(defn + (a b) a) (+ 7 9)").unwrap(), 7);
    }

    #[test]
    fn test_nested_defn_visible_in_enclosing_body() {
        assert_eq!(
            eval_str(
                "(defn outer (x)
                   (defn inner (y) (+ y 1))
                   (inner x))
                 (outer 41)"
            )
            .unwrap(),
            42
        );
    }

    #[test]
    fn test_nested_defn_cannot_capture() {
        assert!(matches!(
            eval_str("(defn outer (x) (defn inner () x) (inner)) (outer 1)"),
            Err(LyreError::UnsupportedCapture { .. })
        ));
    }

    #[test]
    fn test_defn_empty_body() {
        assert!(matches!(
            eval_str("(defn f (x))"),
            Err(LyreError::EmptyBody { .. })
        ));
    }

    #[test]
    fn test_malformed_defn() {
        assert!(matches!(
            eval_str("(defn 3 () 1)"),
            Err(LyreError::MalformedDefn { .. })
        ));
        assert!(matches!(
            eval_str("(defn f (1) 1)"),
            Err(LyreError::MalformedDefn { .. })
        ));
    }

    #[test]
    fn test_call_arity_checked() {
        assert!(matches!(
            eval_str("(defn f (x) x) (f 1 2)"),
            Err(LyreError::CallArity {
                expected: 1,
                got: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_unbound_names() {
        assert!(matches!(
            eval_str("nope"),
            Err(LyreError::UnboundSymbol { .. })
        ));
        assert!(matches!(
            eval_str("(nope 1)"),
            Err(LyreError::UnboundCallee { .. })
        ));
    }

    #[test]
    fn test_variable_is_not_callable() {
        assert!(matches!(
            eval_str("(let ((x 1)) (x 2))"),
            Err(LyreError::NotCallable { .. })
        ));
    }

    #[test]
    fn test_non_symbol_callee() {
        assert!(matches!(
            eval_str("((+ 1 2) 3)"),
            Err(LyreError::InvalidCallee { .. })
        ));
    }

    #[test]
    fn test_builtin_as_value_fails() {
        assert!(matches!(
            eval_str("(+ 1 +)"),
            Err(LyreError::BuiltinAsValue { .. })
        ));
    }

    #[test]
    fn test_empty_invocation() {
        assert!(matches!(eval_str("()"), Err(LyreError::EmptyInvocation)));
    }

    #[test]
    fn test_string_literal_rejected() {
        assert!(matches!(
            eval_str(r#""hello""#),
            Err(LyreError::UnsupportedLiteral { .. })
        ));
    }

    #[test]
    fn test_empty_program() {
        assert!(matches!(eval_str(""), Err(LyreError::EmptyBody { .. })));
    }
}
