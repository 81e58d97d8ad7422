//! Call frames: one activation record per function invocation.

use std::rc::Rc;

use monkey_code::Instructions;
use monkey_object::Closure;

/// One activation record.
///
/// `base_pointer` marks where this frame's region of the value stack
/// begins: the callee sits one slot below it, the arguments and then the
/// remaining local slots start at it.
#[derive(Debug)]
pub struct Frame {
    /// The closure being executed.
    pub closure: Rc<Closure>,

    /// Index of the next byte to fetch from the closure's instructions.
    pub ip: usize,

    /// Stack index where this frame's locals begin.
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    /// The instructions of the executing function.
    pub fn instructions(&self) -> &Instructions {
        &self.closure.func.instructions
    }
}
