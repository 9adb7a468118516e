//! Caller-owned variables and the slots they feed.
//!
//! A [`Variable`] is a handle onto a shared cell. When an expression is compiled with the
//! variable bound under some name, the expression gets its own slot initialized to the
//! variable's value and the slot becomes the variable's single listener. Updates through
//! the handle are pushed to that slot, so the next `evaluate` sees them without any
//! re-parsing.
//!
//! Everything here is `Rc`/`Cell` based: variables and the expressions that read them
//! stay on one thread.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::Real;
use crate::error::{ExprError, Result, StateError};
use crate::symbols::{SymbolKind, SymbolTable};

/// Storage read by a compiled expression.
pub(crate) type Slot = Rc<Cell<Real>>;

struct VariableState {
    value: Cell<Real>,
    listener: RefCell<Option<Slot>>,
}

/// A mutable input value for compiled expressions.
///
/// Cloning the handle shares the same variable.
///
/// ```
/// use exprc::{Binding, Variable, compile_with};
///
/// let x = Variable::new(10.0);
/// let expr = compile_with("x * 2", [Binding::variable("x", &x)]).unwrap();
/// assert_eq!(expr.evaluate().unwrap(), 20.0);
///
/// x.update(50.0).unwrap();
/// assert_eq!(expr.evaluate().unwrap(), 100.0);
///
/// drop(expr);
/// assert!(x.update(1.0).is_err());
/// ```
#[derive(Clone)]
pub struct Variable {
    state: Rc<VariableState>,
}

impl Variable {
    pub fn new(value: Real) -> Self {
        Variable {
            state: Rc::new(VariableState {
                value: Cell::new(value),
                listener: RefCell::new(None),
            }),
        }
    }

    /// Last value set on or observed by this variable.
    pub fn value(&self) -> Real {
        self.state.value.get()
    }

    /// Whether a live compiled expression is listening to this variable.
    pub fn is_bound(&self) -> bool {
        self.state.listener.borrow().is_some()
    }

    /// Set the value and push it to the bound expression.
    ///
    /// Fails with [`StateError::Unbound`] when no expression is bound; the value is then
    /// left unchanged.
    pub fn update(&self, value: Real) -> Result<()> {
        let listener = self.state.listener.borrow();
        let slot = listener.as_ref().ok_or(StateError::Unbound)?;
        self.state.value.set(value);
        slot.set(value);
        Ok(())
    }

    /// Add one to the value. Same rules as [`Variable::update`].
    pub fn increment(&self) -> Result<()> {
        self.update(self.value() + 1.0)
    }

    /// Subtract one from the value. Same rules as [`Variable::update`].
    pub fn decrement(&self) -> Result<()> {
        self.update(self.value() - 1.0)
    }

    pub(crate) fn attach(&self, slot: &Slot) -> Result<()> {
        let mut listener = self.state.listener.borrow_mut();
        if listener.is_some() {
            return Err(StateError::AlreadyBound.into());
        }
        slot.set(self.state.value.get());
        *listener = Some(Rc::clone(slot));
        Ok(())
    }

    /// Clear the listener if it is `slot`. The value is left untouched.
    pub(crate) fn detach(&self, slot: &Slot) {
        let mut listener = self.state.listener.borrow_mut();
        if listener.as_ref().is_some_and(|current| Rc::ptr_eq(current, slot)) {
            *listener = None;
        }
    }
}

impl Default for Variable {
    fn default() -> Self {
        Variable::new(0.0)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("value", &self.value())
            .field("bound", &self.is_bound())
            .finish()
    }
}

struct SlotEntry {
    name: String,
    variable: Variable,
    slot: Slot,
}

/// The slots of one compiled expression, indexed by slot number.
///
/// Dropping the table, or calling [`SlotTable::release`], detaches every variable it
/// attached. A table that fails half way through `bind` releases what it already bound.
pub(crate) struct SlotTable {
    entries: Vec<SlotEntry>,
}

impl SlotTable {
    pub(crate) fn empty() -> Self {
        SlotTable {
            entries: Vec::new(),
        }
    }

    /// Attach a fresh slot to every variable in the symbol table, in slot order.
    pub(crate) fn bind(symbols: &SymbolTable) -> Result<Self> {
        let mut table = SlotTable::empty();
        for symbol in symbols.iter() {
            if let SymbolKind::Variable { variable, slot } = &symbol.kind {
                debug_assert_eq!(*slot, table.entries.len());
                let cell = Rc::new(Cell::new(variable.value()));
                // On error `table` drops here and detaches what was attached.
                variable.attach(&cell)?;
                table.entries.push(SlotEntry {
                    name: String::from(symbol.name.as_str()),
                    variable: variable.clone(),
                    slot: cell,
                });
            }
        }
        Ok(table)
    }

    pub(crate) fn value(&self, index: usize) -> Result<Real> {
        self.entries
            .get(index)
            .map(|entry| entry.slot.get())
            .ok_or(ExprError::State(StateError::Disposed))
    }

    pub(crate) fn name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|entry| entry.name.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Detach every variable. Idempotent.
    pub(crate) fn release(&mut self) {
        for entry in self.entries.drain(..) {
            entry.variable.detach(&entry.slot);
        }
    }
}

impl Drop for SlotTable {
    fn drop(&mut self) {
        self.release();
    }
}
