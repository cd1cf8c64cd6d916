use ljit_core::{object::{self, WORD_SIZE}, Arena, Env, Node};
use ljit_syntax::Span;
use thiserror::Error;
use crate::asm::{Condition, Indirect, PartialRegister, Register};
use crate::buffer::{CodeBuffer, Patch};

const ACC: Register = Register::Rax;
const FRAME: Register = Register::Rsp;
const FIRST_SLOT: i32 = -WORD_SIZE;

pub type Vars<'e> = Option<&'e Env<'e, i32>>;
pub type Labels<'e> = Option<&'e Env<'e, usize>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("unbound variable `{name}`")]
    UnboundVariable { name: String, span: Option<Span> },
    #[error("unknown label `{name}`")]
    UnboundLabel { name: String, span: Option<Span> },
}

impl CompileError {
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::UnboundVariable { span, .. } => *span,
            CompileError::UnboundLabel { span, .. } => *span,
        }
    }
}

/// Registers the generated code agrees on with its caller.
#[derive(Debug, Clone, Copy)]
pub struct CallingConvention {
    /// Holds the first argument on entry: the base of the heap arena.
    pub argument: Register,
    /// Bump pointer for pair allocation, live for the whole entry.
    pub heap: Register,
}

impl Default for CallingConvention {
    fn default() -> CallingConvention {
        CallingConvention {
            argument: Register::Rdi,
            heap: Register::Rsi,
        }
    }
}

/// Compiles a whole program: the prologue that installs the heap pointer,
/// either a plain expression or a top-level `labels` form, and `ret`.
pub fn compile_entry(buf: &mut CodeBuffer, arena: &Arena, node: Node) -> Result<(), CompileError> {
    compile_entry_with(buf, arena, node, CallingConvention::default())
}

/// Like [`compile_entry`], with the heap taken from `conv.argument` and
/// bumped in `conv.heap`.
pub fn compile_entry_with(
    buf: &mut CodeBuffer,
    arena: &Arena,
    node: Node,
    conv: CallingConvention,
) -> Result<(), CompileError> {
    let mut compiler = Compiler { buf, arena, conv };
    compiler.entry(node)
}

/// Compiles one expression without prologue or epilogue.
pub fn compile_expr(
    buf: &mut CodeBuffer,
    arena: &Arena,
    node: Node,
    stack_index: i32,
    vars: Vars<'_>,
    labels: Labels<'_>,
) -> Result<(), CompileError> {
    let mut compiler = Compiler { buf, arena, conv: CallingConvention::default() };
    compiler.expr(node, stack_index, vars, labels)
}

/// Compiles a `(code (formal ...) body)` form into a procedure ending in `ret`.
pub fn compile_code(buf: &mut CodeBuffer, arena: &Arena, node: Node, labels: Labels<'_>) -> Result<(), CompileError> {
    let mut compiler = Compiler { buf, arena, conv: CallingConvention::default() };
    compiler.code(node, labels)
}

struct Compiler<'a> {
    buf: &'a mut CodeBuffer,
    arena: &'a Arena,
    conv: CallingConvention,
}

impl<'a> Compiler<'a> {
    fn entry(&mut self, node: Node) -> Result<(), CompileError> {
        let arena = self.arena;
        let start = self.buf.len();
        self.buf.mov_reg_reg(self.conv.heap, self.conv.argument);
        if node.is_pair() && arena.is_symbol_named(arena.car(node), "labels") {
            self.expect_args(node, "labels", 2);
            let bindings = arena.nth(node, 1);
            assert!(bindings.is_pair() || bindings == Node::Nil, "`labels` bindings must be a list");
            let body = arena.nth(node, 2);
            let body_jump = self.buf.jmp();
            self.labels(bindings, body, None, body_jump)?;
        } else {
            self.expr(node, FIRST_SLOT, None, None)?;
            self.buf.ret();
        }
        tracing::debug!(bytes = self.buf.len() - start, "compiled entry");
        Ok(())
    }

    fn expr(&mut self, node: Node, si: i32, vars: Vars<'_>, labels: Labels<'_>) -> Result<(), CompileError> {
        let arena = self.arena;
        match node {
            Node::Integer(value) => self.buf.mov_reg_word(ACC, object::encode_integer(value)),
            Node::Char(value) => self.buf.mov_reg_word(ACC, object::encode_char(value)),
            Node::Bool(value) => self.buf.mov_reg_word(ACC, object::encode_bool(value)),
            Node::Nil => self.buf.mov_reg_word(ACC, object::NIL),
            Node::Error => panic!("the reader's error value cannot be compiled"),
            Node::Symbol(_) => {
                let name = arena.symbol_name(node);
                match Env::lookup(vars, name) {
                    Some(offset) => self.buf.load_reg_indirect(ACC, Indirect::new(FRAME, offset)),
                    None => {
                        return Err(CompileError::UnboundVariable {
                            name: name.to_owned(),
                            span: arena.symbol_span(node),
                        });
                    }
                }
            }
            Node::Pair(_) => return self.call(node, si, vars, labels),
        }
        Ok(())
    }

    fn call(&mut self, node: Node, si: i32, vars: Vars<'_>, labels: Labels<'_>) -> Result<(), CompileError> {
        let arena = self.arena;
        let callable = arena.car(node);
        if !callable.is_symbol() {
            panic!("cannot call `{}`", arena.display(callable));
        }
        let name = arena.symbol_name(callable);
        let arg = |n: usize| arena.nth(node, n + 1);
        match name {
            "add1" | "sub1" | "integer->char" | "char->integer" | "nil?" | "zero?" | "not" | "integer?"
            | "boolean?" | "car" | "cdr" => {
                self.expect_args(node, name, 1);
                self.expr(arg(0), si, vars, labels)?;
                self.unary(name);
            }
            "+" | "-" | "*" | "=" | "<" => {
                self.expect_args(node, name, 2);
                let slot = Indirect::new(FRAME, si);
                self.expr(arg(1), si, vars, labels)?;
                if name == "*" {
                    // keep only one factor of the tag scaling
                    self.buf.shr_reg_imm8(ACC, object::INTEGER_SHIFT as u8);
                }
                self.buf.store_reg_indirect(slot, ACC);
                self.expr(arg(0), si - WORD_SIZE, vars, labels)?;
                match name {
                    "+" => self.buf.add_reg_indirect(ACC, slot),
                    "-" => self.buf.sub_reg_indirect(ACC, slot),
                    "*" => self.buf.imul_indirect(slot),
                    "=" => {
                        self.buf.cmp_reg_indirect(ACC, slot);
                        self.materialize_bool(Condition::Equal);
                    }
                    _ => {
                        self.buf.cmp_reg_indirect(ACC, slot);
                        self.materialize_bool(Condition::Less);
                    }
                }
            }
            "let" => {
                self.expect_args(node, name, 2);
                self.let_bindings(arg(0), arg(1), si, vars, vars, labels)?;
            }
            "if" => {
                self.expect_args(node, name, 3);
                self.if_(arg(0), arg(1), arg(2), si, vars, labels)?;
            }
            "cons" => {
                self.expect_args(node, name, 2);
                self.cons(arg(0), arg(1), si, vars, labels)?;
            }
            "labelcall" => {
                let args = arena.cdr(node);
                assert!(args.is_pair(), "`labelcall` needs a label");
                self.labelcall(arena.car(args), arena.cdr(args), si, vars, labels)?;
            }
            _ => panic!("unknown operator `{}`", name),
        }
        Ok(())
    }

    fn expect_args(&self, node: Node, name: &str, count: usize) {
        let actual = self.arena.list_len(self.arena.cdr(node));
        assert!(actual == count, "`{}` takes {} argument(s), got {}", name, count, actual);
    }

    fn unary(&mut self, name: &str) {
        let char_shift = (object::CHAR_SHIFT - object::INTEGER_SHIFT) as u8;
        match name {
            "add1" => self.buf.add_reg_imm32(ACC, object::encode_integer(1) as i32),
            "sub1" => self.buf.sub_reg_imm32(ACC, object::encode_integer(1) as i32),
            "integer->char" => {
                self.buf.shl_reg_imm8(ACC, char_shift);
                self.buf.or_reg_imm8(ACC, object::CHAR_TAG as u8);
            }
            "char->integer" => self.buf.shr_reg_imm8(ACC, char_shift),
            "nil?" => self.compare_imm32(object::NIL as i32),
            "zero?" => self.compare_imm32(object::encode_integer(0) as i32),
            "not" => self.compare_imm32(object::FALSE as i32),
            "integer?" => {
                self.buf.and_reg_imm8(ACC, object::INTEGER_TAG_MASK as u8);
                self.compare_imm32(object::INTEGER_TAG as i32);
            }
            "boolean?" => {
                self.buf.and_reg_imm8(ACC, object::IMMEDIATE_TAG_MASK as u8);
                self.compare_imm32(object::BOOL_TAG as i32);
            }
            "car" => {
                let offset = object::CAR_OFFSET - object::PAIR_TAG as i32;
                self.buf.load_reg_indirect(ACC, Indirect::new(ACC, offset));
            }
            "cdr" => {
                let offset = object::CDR_OFFSET - object::PAIR_TAG as i32;
                self.buf.load_reg_indirect(ACC, Indirect::new(ACC, offset));
            }
            _ => unreachable!("`{}` is not unary", name),
        }
    }

    fn compare_imm32(&mut self, value: i32) {
        self.buf.cmp_reg_imm32(ACC, value);
        self.materialize_bool(Condition::Equal);
    }

    /// Turns the flags of the last comparison into `#t`/`#f` in the accumulator.
    fn materialize_bool(&mut self, cond: Condition) {
        self.buf.mov_reg_imm32(ACC, 0);
        self.buf.setcc_imm8(cond, PartialRegister::Al);
        self.buf.shl_reg_imm8(ACC, object::BOOL_SHIFT as u8);
        self.buf.or_reg_imm8(ACC, object::BOOL_TAG as u8);
    }

    /// Binding expressions only see `binding_env`; names are collected into
    /// `body_env` for the body alone, so this is `let` and not `let*`.
    fn let_bindings(
        &mut self,
        bindings: Node,
        body: Node,
        si: i32,
        binding_env: Vars<'_>,
        body_env: Vars<'_>,
        labels: Labels<'_>,
    ) -> Result<(), CompileError> {
        let arena = self.arena;
        if bindings == Node::Nil {
            return self.expr(body, si, body_env, labels);
        }
        let binding = arena.car(bindings);
        let name = arena.car(binding);
        assert!(name.is_symbol(), "`let` binds symbols, not `{}`", arena.display(name));
        self.expr(arena.nth(binding, 1), si, binding_env, labels)?;
        self.buf.store_reg_indirect(Indirect::new(FRAME, si), ACC);
        let entry = Env::bind(arena.symbol_name(name), si, body_env);
        self.let_bindings(arena.cdr(bindings), body, si - WORD_SIZE, binding_env, Some(&entry), labels)
    }

    fn if_(
        &mut self,
        cond: Node,
        consequent: Node,
        alternate: Node,
        si: i32,
        vars: Vars<'_>,
        labels: Labels<'_>,
    ) -> Result<(), CompileError> {
        self.expr(cond, si, vars, labels)?;
        self.buf.cmp_reg_imm32(ACC, object::FALSE as i32);
        let to_alternate = self.buf.jcc(Condition::Equal);
        self.expr(consequent, si, vars, labels)?;
        let to_end = self.buf.jmp();
        self.buf.backpatch(to_alternate);
        self.expr(alternate, si, vars, labels)?;
        self.buf.backpatch(to_end);
        Ok(())
    }

    /// The car waits in a stack slot while the cdr is compiled, because the
    /// cdr may allocate and move the heap pointer.
    fn cons(&mut self, car: Node, cdr: Node, si: i32, vars: Vars<'_>, labels: Labels<'_>) -> Result<(), CompileError> {
        let heap = self.conv.heap;
        let slot = Indirect::new(FRAME, si);
        self.expr(car, si, vars, labels)?;
        self.buf.store_reg_indirect(slot, ACC);
        self.expr(cdr, si - WORD_SIZE, vars, labels)?;
        self.buf.store_reg_indirect(Indirect::new(heap, object::CDR_OFFSET), ACC);
        self.buf.load_reg_indirect(ACC, slot);
        self.buf.store_reg_indirect(Indirect::new(heap, object::CAR_OFFSET), ACC);
        self.buf.mov_reg_reg(ACC, heap);
        self.buf.or_reg_imm8(ACC, object::PAIR_TAG as u8);
        self.buf.add_reg_imm32(heap, object::PAIR_SIZE);
        Ok(())
    }

    /// Arguments go below the slot that the return address will take, which
    /// is where the callee's formals expect them.
    fn labelcall(
        &mut self,
        label: Node,
        args: Node,
        si: i32,
        vars: Vars<'_>,
        labels: Labels<'_>,
    ) -> Result<(), CompileError> {
        let arena = self.arena;
        assert!(label.is_symbol(), "`labelcall` needs a label, got `{}`", arena.display(label));
        let name = arena.symbol_name(label);
        let target = match Env::lookup(labels, name) {
            Some(target) => target,
            None => {
                return Err(CompileError::UnboundLabel {
                    name: name.to_owned(),
                    span: arena.symbol_span(label),
                });
            }
        };
        let mut arg_index = si - WORD_SIZE;
        for arg in arena.list_items(args) {
            self.expr(arg, arg_index, vars, labels)?;
            self.buf.store_reg_indirect(Indirect::new(FRAME, arg_index), ACC);
            arg_index -= WORD_SIZE;
        }
        let locals = si + WORD_SIZE;
        self.buf.rsp_adjust(locals);
        self.buf.call(target);
        self.buf.rsp_adjust(-locals);
        Ok(())
    }

    fn code(&mut self, node: Node, labels: Labels<'_>) -> Result<(), CompileError> {
        let arena = self.arena;
        assert!(
            node.is_pair() && arena.is_symbol_named(arena.car(node), "code"),
            "expected a `code` form, got `{}`",
            arena.display(node),
        );
        self.expect_args(node, "code", 2);
        self.formals(arena.nth(node, 1), arena.nth(node, 2), FIRST_SLOT, None, labels)
    }

    fn formals(
        &mut self,
        formals: Node,
        body: Node,
        si: i32,
        vars: Vars<'_>,
        labels: Labels<'_>,
    ) -> Result<(), CompileError> {
        let arena = self.arena;
        if formals == Node::Nil {
            self.expr(body, si, vars, labels)?;
            self.buf.ret();
            return Ok(());
        }
        let name = arena.car(formals);
        assert!(name.is_symbol(), "formal parameters must be symbols, not `{}`", arena.display(name));
        let entry = Env::bind(arena.symbol_name(name), si, vars);
        self.formals(arena.cdr(formals), body, si - WORD_SIZE, Some(&entry), labels)
    }

    /// A label is visible to its own body, to the labels after it and to
    /// the labels body.
    fn labels(&mut self, bindings: Node, body: Node, labels: Labels<'_>, body_jump: Patch) -> Result<(), CompileError> {
        let arena = self.arena;
        if bindings == Node::Nil {
            self.buf.backpatch(body_jump);
            self.expr(body, FIRST_SLOT, None, labels)?;
            self.buf.ret();
            return Ok(());
        }
        let binding = arena.car(bindings);
        let name = arena.car(binding);
        assert!(name.is_symbol(), "labels are named by symbols, not `{}`", arena.display(name));
        let name = arena.symbol_name(name);
        let location = self.buf.len();
        tracing::debug!(label = name, offset = location, "compiling label");
        let entry = Env::bind(name, location, labels);
        self.code(arena.nth(binding, 1), Some(&entry))?;
        self.labels(arena.cdr(bindings), body, Some(&entry), body_jump)
    }
}
