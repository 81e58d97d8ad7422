//! monkey-compiler - Single-pass AST to bytecode compiler.
//!
//! The compiler walks the AST once, emitting instructions into a per-scope
//! buffer. Entering a function literal pushes a fresh compilation scope and
//! an enclosed symbol table; leaving it yields the function's instructions,
//! which land in the constants pool as a `CompiledFunction`.
//!
//! Conditionals are compiled with placeholder jump operands that are
//! backpatched once the target position is known. The last and previous
//! emitted instructions are tracked per scope for the two peephole fixups
//! the language needs: stripping a trailing `OpPop` when a block is in
//! expression position, and turning a trailing `OpPop` into
//! `OpReturnValue` at the end of a function body.

pub mod symbol_table;

pub use symbol_table::{Symbol, SymbolScope, SymbolTable};

use std::rc::Rc;

use thiserror::Error;

use monkey_code::{make, Instructions, Opcode};
use monkey_object::{CompiledFunction, Object};
use monkey_par::ast::{
    BlockStatement, Expression, FunctionLiteral, HashLiteral, IfExpression, Program, Statement,
};

/// Compile-time failure.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),
    #[error("unknown operator {0}")]
    UnknownOperator(String),
}

/// The compiler's output: the main instruction sequence plus the constants
/// pool both back-ends share.
#[derive(Clone, Debug)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

/// Opcode and position of an instruction already written to the buffer.
#[derive(Clone, Copy, Debug)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Per-function instruction buffer with peephole bookkeeping.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    /// Creates a compiler with a fresh symbol table that already knows the
    /// builtins.
    pub fn new() -> Self {
        Self::new_with_state(SymbolTable::with_builtins(), Vec::new())
    }

    /// Creates a compiler continuing from existing state. The REPL threads
    /// the symbol table and constants pool through successive lines this
    /// way; constants grow append-only, so earlier bytecode stays valid.
    pub fn new_with_state(symbol_table: SymbolTable, constants: Vec<Object>) -> Self {
        Self {
            constants,
            symbol_table,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
        }
    }

    /// Hands the symbol table and constants back for the next REPL line.
    pub fn into_state(self) -> (SymbolTable, Vec<Object>) {
        (self.symbol_table, self.constants)
    }

    /// Compiles a program into the current scope.
    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    /// Clones out the finished bytecode.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scopes[self.scope_index].instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Expression(s) => {
                self.compile_expression(&s.expression)?;
                self.emit(Opcode::Pop, &[]);
            }
            Statement::Let(s) => {
                // Define before compiling the value so a function literal
                // can reference its own binding.
                let symbol = self.symbol_table.define(&s.name.value);
                self.compile_expression(&s.value)?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index]),
                    _ => self.emit(Opcode::SetLocal, &[symbol.index]),
                };
            }
            Statement::Return(s) => {
                self.compile_expression(&s.return_value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
            Statement::Block(s) => self.compile_block(s)?,
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::IntegerLiteral(e) => {
                let constant = self.add_constant(Object::Integer(e.value));
                self.emit(Opcode::Constant, &[constant]);
            }
            Expression::StringLiteral(e) => {
                let constant = self.add_constant(Object::from(e.value.as_str()));
                self.emit(Opcode::Constant, &[constant]);
            }
            Expression::BooleanLiteral(e) => {
                if e.value {
                    self.emit(Opcode::True, &[]);
                } else {
                    self.emit(Opcode::False, &[]);
                }
            }
            Expression::Prefix(e) => {
                self.compile_expression(&e.right)?;
                match e.operator.as_str() {
                    "!" => self.emit(Opcode::Bang, &[]),
                    "-" => self.emit(Opcode::Minus, &[]),
                    op => return Err(CompileError::UnknownOperator(op.to_string())),
                };
            }
            Expression::Infix(e) => self.compile_infix_expression(e)?,
            Expression::If(e) => self.compile_if_expression(e)?,
            Expression::Identifier(e) => {
                let Some(symbol) = self.symbol_table.resolve(&e.value) else {
                    return Err(CompileError::UndefinedVariable(e.value.clone()));
                };
                self.load_symbol(&symbol);
            }
            Expression::Array(e) => {
                for element in &e.elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[e.elements.len()]);
            }
            Expression::Hash(e) => self.compile_hash_literal(e)?,
            Expression::Index(e) => {
                self.compile_expression(&e.left)?;
                self.compile_expression(&e.index)?;
                self.emit(Opcode::Index, &[]);
            }
            Expression::Function(e) => self.compile_function_literal(e)?,
            Expression::Call(e) => {
                self.compile_expression(&e.function)?;
                for argument in &e.arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[e.arguments.len()]);
            }
        }
        Ok(())
    }

    fn compile_infix_expression(
        &mut self,
        expression: &monkey_par::ast::InfixExpression,
    ) -> Result<(), CompileError> {
        // `<` has no opcode: swap the operands and compare with `>`.
        if expression.operator == "<" {
            self.compile_expression(&expression.right)?;
            self.compile_expression(&expression.left)?;
            self.emit(Opcode::GreaterThan, &[]);
            return Ok(());
        }

        self.compile_expression(&expression.left)?;
        self.compile_expression(&expression.right)?;

        match expression.operator.as_str() {
            "+" => self.emit(Opcode::Add, &[]),
            "-" => self.emit(Opcode::Sub, &[]),
            "*" => self.emit(Opcode::Mul, &[]),
            "/" => self.emit(Opcode::Div, &[]),
            ">" => self.emit(Opcode::GreaterThan, &[]),
            "==" => self.emit(Opcode::Equal, &[]),
            "!=" => self.emit(Opcode::NotEqual, &[]),
            op => return Err(CompileError::UnknownOperator(op.to_string())),
        };

        Ok(())
    }

    fn compile_if_expression(&mut self, expression: &IfExpression) -> Result<(), CompileError> {
        self.compile_expression(&expression.condition)?;

        // Placeholder operand, patched once the consequence is compiled.
        let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[9999]);

        self.compile_block(&expression.consequence)?;
        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        }

        let jump_pos = self.emit(Opcode::Jump, &[9999]);

        let after_consequence = self.current_instructions().len();
        self.change_operand(jump_not_truthy_pos, after_consequence);

        match &expression.alternative {
            None => {
                self.emit(Opcode::Null, &[]);
            }
            Some(alternative) => {
                self.compile_block(alternative)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }
            }
        }

        let after_alternative = self.current_instructions().len();
        self.change_operand(jump_pos, after_alternative);

        Ok(())
    }

    fn compile_hash_literal(&mut self, hash: &HashLiteral) -> Result<(), CompileError> {
        // Sort pairs by the key's textual form so the emitted bytecode is
        // deterministic. The sort is stable: keys that print alike keep
        // their parse order.
        let mut pairs: Vec<&(Expression, Expression)> = hash.pairs.iter().collect();
        pairs.sort_by_cached_key(|(key, _)| key.to_string());

        for (key, value) in pairs {
            self.compile_expression(key)?;
            self.compile_expression(value)?;
        }

        self.emit(Opcode::Hash, &[hash.pairs.len() * 2]);
        Ok(())
    }

    fn compile_function_literal(
        &mut self,
        function: &FunctionLiteral,
    ) -> Result<(), CompileError> {
        self.enter_scope();

        if let Some(name) = &function.name {
            self.symbol_table.define_function_name(name);
        }

        for parameter in &function.parameters {
            self.symbol_table.define(&parameter.value);
        }

        self.compile_block(&function.body)?;

        // The body's last expression is the return value; an empty body
        // returns null.
        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let free_symbols = self.symbol_table.free_symbols.clone();
        let num_locals = self.symbol_table.num_definitions;
        let instructions = self.leave_scope();

        // Load the free values in the enclosing scope; OpClosure collects
        // them off the stack.
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let compiled = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: function.parameters.len(),
        };
        let constant = self.add_constant(Object::CompiledFunction(Rc::new(compiled)));
        self.emit(Opcode::Closure, &[constant, free_symbols.len()]);

        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    fn add_constant(&mut self, object: Object) -> usize {
        self.constants.push(object);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.add_instruction(&instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, instruction: &[u8]) -> usize {
        let scope = &mut self.scopes[self.scope_index];
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(instruction);
        position
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        let scope = &mut self.scopes[self.scope_index];
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn current_instructions(&self) -> &Instructions {
        &self.scopes[self.scope_index].instructions
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        self.scopes[self.scope_index]
            .last_instruction
            .is_some_and(|last| last.opcode == op)
    }

    fn remove_last_pop(&mut self) {
        let scope = &mut self.scopes[self.scope_index];
        if let Some(last) = scope.last_instruction {
            scope.instructions.truncate(last.position);
            scope.last_instruction = scope.previous_instruction.take();
        }
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let instructions = &mut self.scopes[self.scope_index].instructions;
        instructions[position..position + new_instruction.len()]
            .copy_from_slice(new_instruction);
    }

    /// Re-encodes the instruction at `position` with a new operand. Only
    /// used for jump backpatching, so opcode and width never change.
    fn change_operand(&mut self, position: usize, operand: usize) {
        if let Ok(op) = Opcode::try_from(self.current_instructions()[position]) {
            let new_instruction = make(op, &[operand]);
            self.replace_instruction(position, &new_instruction);
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.scopes[self.scope_index].last_instruction {
            let position = last.position;
            self.replace_instruction(position, &make(Opcode::ReturnValue, &[]));
            if let Some(last) = &mut self.scopes[self.scope_index].last_instruction {
                last.opcode = Opcode::ReturnValue;
            }
        }
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;

        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let instructions = match self.scopes.pop() {
            Some(scope) => scope.instructions,
            None => Instructions::new(),
        };
        self.scope_index = self.scope_index.saturating_sub(1);

        let current = std::mem::take(&mut self.symbol_table);
        self.symbol_table = current.into_outer().unwrap_or_default();

        instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
