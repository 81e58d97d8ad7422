//! monkey-vm - Stack-based virtual machine.
//!
//! Executes the bytecode produced by monkey-compiler. Three fixed-size
//! regions drive execution: the value stack (`sp` points at the next free
//! slot; popped slots are not zeroed, so the last popped value stays
//! observable), the globals vector, and the frame stack. Exceeding the
//! frame stack is a runtime error, not a host crash.
//!
//! Errors surface as a [`VmError`] from [`Vm::run`] and halt the machine.
//! Builtins are the exception: their failures are `Object::Error` values
//! that land on the stack like any other result.

pub mod frame;

pub use frame::Frame;

use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;

use monkey_code::{read_u16, read_u8, Opcode};
use monkey_compiler::Bytecode;
use monkey_object::{builtins, Closure, CompiledFunction, HashKey, HashPair, Object};

/// Size of the value stack.
pub const STACK_SIZE: usize = 2048;
/// Number of global slots.
pub const GLOBALS_SIZE: usize = 65536;
/// Maximum call depth.
pub const MAX_FRAMES: usize = 1024;

/// A runtime failure that halts the machine.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum VmError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("frame stack overflow")]
    FrameStackOverflow,

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("unsupported types for binary operation: {left} {right}")]
    UnsupportedBinaryTypes {
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown operator: {op} ({left} {right})")]
    UnknownOperator {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown string operator: {0}")]
    UnknownStringOperator(&'static str),

    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(&'static str),

    #[error("index operator not supported: {0}")]
    IndexNotSupported(&'static str),

    #[error("calling non-function")]
    CallingNonFunction,

    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongNumberOfArguments { want: usize, got: usize },

    #[error("not a function: {0}")]
    NotAFunction(&'static str),

    #[error("undefined builtin {0}")]
    UndefinedBuiltin(usize),
}

/// The virtual machine.
pub struct Vm {
    constants: Vec<Object>,

    stack: Vec<Object>,
    /// Next free stack slot; `stack[sp]` is the last popped value.
    sp: usize,

    globals: Vec<Object>,

    frames: Vec<Frame>,
}

impl Vm {
    /// Creates a machine for one bytecode unit with fresh globals.
    pub fn new(bytecode: Bytecode) -> Self {
        Self::new_with_globals(bytecode, vec![Object::Null; GLOBALS_SIZE])
    }

    /// Creates a machine reusing an existing globals vector. The REPL
    /// threads globals through successive lines this way; slot assignments
    /// are stable because the symbol table is threaded along with them.
    pub fn new_with_globals(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        let main_function = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = Closure {
            func: Rc::new(main_function),
            free: Vec::new(),
        };
        let main_frame = Frame::new(Rc::new(main_closure), 0);

        Self {
            constants: bytecode.constants,
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames: vec![main_frame],
        }
    }

    /// Hands the globals back for the next REPL line.
    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    /// The value most recently popped off the stack. Expression statements
    /// end in `OpPop`, so after a successful run this is the program's
    /// result.
    pub fn last_popped(&self) -> &Object {
        &self.stack[self.sp]
    }

    /// The fetch-decode-execute loop. Runs until the entry frame's
    /// instructions are exhausted or an error halts the machine.
    pub fn run(&mut self) -> Result<(), VmError> {
        loop {
            let frame = self.current_frame();
            let ip = frame.ip;
            if ip >= frame.instructions().len() {
                break;
            }

            let byte = frame.instructions()[ip];
            self.current_frame_mut().ip += 1;
            let op = Opcode::try_from(byte).map_err(|err| VmError::UnknownOpcode(err.0))?;

            match op {
                Opcode::Constant => {
                    let index = self.read_u16_operand();
                    self.push(self.constants[index].clone())?;
                }
                Opcode::Pop => {
                    self.pop();
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_operation(op)?;
                }
                Opcode::True => self.push(Object::Boolean(true))?,
                Opcode::False => self.push(Object::Boolean(false))?,
                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(op)?;
                }
                Opcode::Bang => {
                    let operand = self.pop();
                    self.push(Object::Boolean(!operand.is_truthy()))?;
                }
                Opcode::Minus => {
                    let operand = self.pop();
                    match operand {
                        Object::Integer(value) => self.push(Object::Integer(-value))?,
                        other => {
                            return Err(VmError::UnsupportedNegation(other.type_name()));
                        }
                    }
                }
                Opcode::Jump => {
                    let target = self.read_u16_operand();
                    self.current_frame_mut().ip = target;
                }
                Opcode::JumpNotTruthy => {
                    let target = self.read_u16_operand();
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target;
                    }
                }
                Opcode::Null => self.push(Object::Null)?,
                Opcode::SetGlobal => {
                    let index = self.read_u16_operand();
                    self.globals[index] = self.pop();
                }
                Opcode::GetGlobal => {
                    let index = self.read_u16_operand();
                    self.push(self.globals[index].clone())?;
                }
                Opcode::Array => {
                    let count = self.read_u16_operand();
                    let array = self.build_array(self.sp - count, self.sp);
                    self.sp -= count;
                    self.push(array)?;
                }
                Opcode::Hash => {
                    let count = self.read_u16_operand();
                    let hash = self.build_hash(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(hash)?;
                }
                Opcode::Index => {
                    let index = self.pop();
                    let left = self.pop();
                    self.execute_index_expression(left, index)?;
                }
                Opcode::Call => {
                    let argc = self.read_u8_operand();
                    self.execute_call(argc)?;
                }
                Opcode::ReturnValue => {
                    let return_value = self.pop();
                    if self.pop_frame_and_discard_locals() {
                        // A top-level return pops the entry frame. Halt with
                        // the value in the observable last-popped slot.
                        self.push(return_value)?;
                        self.pop();
                        break;
                    }
                    self.push(return_value)?;
                }
                Opcode::Return => {
                    if self.pop_frame_and_discard_locals() {
                        self.push(Object::Null)?;
                        self.pop();
                        break;
                    }
                    self.push(Object::Null)?;
                }
                Opcode::SetLocal => {
                    let index = self.read_u8_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    self.stack[base_pointer + index] = self.pop();
                }
                Opcode::GetLocal => {
                    let index = self.read_u8_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    self.push(self.stack[base_pointer + index].clone())?;
                }
                Opcode::GetBuiltin => {
                    let index = self.read_u8_operand();
                    let builtin =
                        builtins::get(index).ok_or(VmError::UndefinedBuiltin(index))?;
                    self.push(Object::Builtin(builtin))?;
                }
                Opcode::Closure => {
                    let constant = self.read_u16_operand();
                    let free_count = self.read_u8_operand();
                    self.push_closure(constant, free_count)?;
                }
                Opcode::GetFree => {
                    let index = self.read_u8_operand();
                    let value = self.current_frame().closure.free[index].clone();
                    self.push(value)?;
                }
                Opcode::CurrentClosure => {
                    let closure = self.current_frame().closure.clone();
                    self.push(Object::Closure(closure))?;
                }
            }
        }

        Ok(())
    }

    fn current_frame(&self) -> &Frame {
        // The frame stack is never empty while run() executes.
        &self.frames[self.frames.len() - 1]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Reads a u16 operand at the current ip and advances past it.
    fn read_u16_operand(&mut self) -> usize {
        let frame = self.current_frame_mut();
        let value = read_u16(&frame.closure.func.instructions[frame.ip..]) as usize;
        frame.ip += 2;
        value
    }

    /// Reads a u8 operand at the current ip and advances past it.
    fn read_u8_operand(&mut self) -> usize {
        let frame = self.current_frame_mut();
        let value = read_u8(&frame.closure.func.instructions[frame.ip..]) as usize;
        frame.ip += 1;
        value
    }

    fn push(&mut self, object: Object) -> Result<(), VmError> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = object;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Object {
        // Balanced bytecode never pops an empty stack; a value-less branch
        // of a degenerate conditional is answered with null rather than
        // letting sp underflow.
        if self.sp == 0 {
            return Object::Null;
        }
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    /// Pops the current frame and resets `sp` below its callee slot.
    /// Returns true when the entry frame itself was popped.
    fn pop_frame_and_discard_locals(&mut self) -> bool {
        match self.frames.pop() {
            Some(frame) if self.frames.is_empty() => {
                // Entry frame: its base pointer is 0, there is no callee
                // slot to discard.
                self.sp = frame.base_pointer;
                true
            }
            Some(frame) => {
                self.sp = frame.base_pointer - 1;
                false
            }
            None => true,
        }
    }

    fn execute_binary_operation(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                let result = match op {
                    Opcode::Add => l + r,
                    Opcode::Sub => l - r,
                    Opcode::Mul => l * r,
                    _ => {
                        if *r == 0 {
                            return Err(VmError::DivisionByZero);
                        }
                        l / r
                    }
                };
                self.push(Object::Integer(result))
            }
            (Object::Str(l), Object::Str(r)) => {
                if op == Opcode::Add {
                    self.push(Object::from(format!("{}{}", l, r)))
                } else {
                    Err(VmError::UnknownStringOperator(op.name()))
                }
            }
            _ => Err(VmError::UnsupportedBinaryTypes {
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop();
        let left = self.pop();

        if let (Object::Integer(l), Object::Integer(r)) = (&left, &right) {
            let result = match op {
                Opcode::Equal => l == r,
                Opcode::NotEqual => l != r,
                _ => l > r,
            };
            return self.push(Object::Boolean(result));
        }

        match op {
            Opcode::Equal => self.push(Object::Boolean(left == right)),
            Opcode::NotEqual => self.push(Object::Boolean(left != right)),
            _ => Err(VmError::UnknownOperator {
                op: op.name(),
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn build_array(&self, start: usize, end: usize) -> Object {
        Object::Array(Rc::new(self.stack[start..end].to_vec()))
    }

    fn build_hash(&self, start: usize, end: usize) -> Result<Object, VmError> {
        let mut pairs: IndexMap<HashKey, HashPair> = IndexMap::new();

        let mut i = start;
        while i < end {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();

            let hash_key = key
                .hash_key()
                .ok_or(VmError::UnusableHashKey(key.type_name()))?;
            pairs.insert(hash_key, HashPair { key, value });

            i += 2;
        }

        Ok(Object::Hash(Rc::new(pairs)))
    }

    fn execute_index_expression(&mut self, left: Object, index: Object) -> Result<(), VmError> {
        match (&left, &index) {
            (Object::Array(elements), Object::Integer(i)) => {
                let max = elements.len() as i64;
                if *i < 0 || *i >= max {
                    self.push(Object::Null)
                } else {
                    self.push(elements[*i as usize].clone())
                }
            }
            (Object::Hash(pairs), _) => {
                let key = index
                    .hash_key()
                    .ok_or(VmError::UnusableHashKey(index.type_name()))?;
                match pairs.get(&key) {
                    Some(pair) => self.push(pair.value.clone()),
                    None => self.push(Object::Null),
                }
            }
            _ => Err(VmError::IndexNotSupported(left.type_name())),
        }
    }

    fn execute_call(&mut self, argc: usize) -> Result<(), VmError> {
        let callee = self.stack[self.sp - 1 - argc].clone();
        match callee {
            Object::Closure(closure) => self.call_closure(closure, argc),
            Object::Builtin(builtin) => {
                let args = self.stack[self.sp - argc..self.sp].to_vec();
                let result = (builtin.func)(&args);
                self.sp = self.sp - argc - 1;
                self.push(result)
            }
            _ => Err(VmError::CallingNonFunction),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> Result<(), VmError> {
        if argc != closure.func.num_parameters {
            return Err(VmError::WrongNumberOfArguments {
                want: closure.func.num_parameters,
                got: argc,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(VmError::FrameStackOverflow);
        }

        let num_locals = closure.func.num_locals;
        let frame = Frame::new(closure, self.sp - argc);
        let base_pointer = frame.base_pointer;
        self.frames.push(frame);

        // Arguments already occupy the first local slots; reserve the rest.
        self.sp = base_pointer + num_locals;
        Ok(())
    }

    fn push_closure(&mut self, constant: usize, free_count: usize) -> Result<(), VmError> {
        let function = match &self.constants[constant] {
            Object::CompiledFunction(function) => function.clone(),
            other => return Err(VmError::NotAFunction(other.type_name())),
        };

        let free = self.stack[self.sp - free_count..self.sp].to_vec();
        self.sp -= free_count;

        self.push(Object::Closure(Rc::new(Closure {
            func: function,
            free,
        })))
    }
}
