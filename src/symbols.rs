//! Name resolution for caller bindings and built-ins.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::borrow::Borrow;
use heapless::FnvIndexMap;

use crate::Real;
use crate::error::{ExprError, Result};
use crate::functions::find_builtin;
use crate::types::{
    Binding, BindingValue, BoundFunction, Callee, HString, MAX_BINDINGS, MAX_NAME_LENGTH,
    TryIntoHeaplessString,
};
use crate::variable::Variable;

/// What a registered name stands for.
#[derive(Debug)]
pub enum SymbolKind {
    /// A caller variable and the slot it is assigned in the compiled expression.
    Variable { variable: Variable, slot: usize },
    Function(Rc<BoundFunction>),
}

#[derive(Debug)]
pub struct Symbol {
    pub name: HString,
    pub kind: SymbolKind,
}

/// Result of resolving an identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved {
    Variable { slot: usize },
    Function { callee: Callee, arity: usize },
}

/// The caller bindings of one compile call.
///
/// Bindings are kept sorted by descending name length; variables are numbered in that
/// order. Lookup is by exact name and falls back to the built-in table, so a caller
/// binding named like a built-in shadows it.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: FnvIndexMap<HString, usize, MAX_BINDINGS>,
    variable_count: usize,
}

impl SymbolTable {
    /// A table with no caller bindings, used for constant expressions.
    pub fn empty() -> Self {
        SymbolTable {
            symbols: Vec::new(),
            index: FnvIndexMap::new(),
            variable_count: 0,
        }
    }

    /// Validate and order bindings.
    ///
    /// Names are trimmed. Empty names, names that are not identifiers, names longer
    /// than [`MAX_NAME_LENGTH`] and duplicates are rejected with
    /// [`ExprError::InvalidBinding`]; more than [`MAX_BINDINGS`] bindings is
    /// [`ExprError::CapacityExceeded`].
    pub fn new<I>(bindings: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Borrow<Binding>,
    {
        let mut entries: Vec<(HString, BindingValue)> = Vec::new();
        for binding in bindings {
            let binding = binding.borrow();
            if entries.len() == MAX_BINDINGS {
                return Err(ExprError::CapacityExceeded("bindings"));
            }
            let name = validate_name(&binding.name)?;
            entries.push((name, binding.value.clone()));
        }

        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut table = SymbolTable::empty();
        for (name, value) in entries {
            if table.index.contains_key(&name) {
                return Err(ExprError::InvalidBinding {
                    name: name.as_str().to_string(),
                    reason: "duplicate binding name",
                });
            }
            let kind = match value {
                BindingValue::Variable(variable) => {
                    let slot = table.variable_count;
                    table.variable_count += 1;
                    SymbolKind::Variable { variable, slot }
                }
                BindingValue::Function(function) => SymbolKind::Function(Rc::new(BoundFunction {
                    name: name.clone(),
                    function,
                })),
            };
            table
                .index
                .insert(name.clone(), table.symbols.len())
                .map_err(|_| ExprError::CapacityExceeded("bindings"))?;
            table.symbols.push(Symbol { name, kind });
        }
        Ok(table)
    }

    /// Resolve an identifier: caller bindings first, then built-ins.
    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        let found = name
            .try_into_heapless()
            .ok()
            .and_then(|key| self.index.get(&key).copied());

        if let Some(idx) = found {
            return Some(match &self.symbols[idx].kind {
                SymbolKind::Variable { slot, .. } => Resolved::Variable { slot: *slot },
                SymbolKind::Function(bound) => Resolved::Function {
                    callee: Callee::Host(idx),
                    arity: bound.function.arity(),
                },
            });
        }

        find_builtin(name).map(|builtin| Resolved::Function {
            callee: Callee::Builtin(builtin),
            arity: builtin.arity,
        })
    }

    /// The host function registered at `idx`, as referenced by [`Callee::Host`].
    pub fn function_at(&self, idx: usize) -> Option<&Rc<BoundFunction>> {
        match self.symbols.get(idx).map(|symbol| &symbol.kind) {
            Some(SymbolKind::Function(bound)) => Some(bound),
            _ => None,
        }
    }

    /// Current value of the variable assigned to `slot`.
    pub fn slot_value(&self, slot: usize) -> Option<Real> {
        self.variables()
            .nth(slot)
            .map(|(_, variable)| variable.value())
    }

    /// Variables in slot order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.symbols.iter().filter_map(|symbol| match &symbol.kind {
            SymbolKind::Variable { variable, .. } => Some((symbol.name.as_str(), variable)),
            SymbolKind::Function(_) => None,
        })
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count
    }
}

fn validate_name(raw: &str) -> Result<HString> {
    let name = raw.trim();
    let invalid = |reason| ExprError::InvalidBinding {
        name: String::from(name),
        reason,
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("empty name")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err(invalid("name is not an identifier"));
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("name is not an identifier"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(invalid("name too long"));
    }
    name.try_into_heapless()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Function;

    #[test]
    fn test_sorted_longest_first_with_slots_in_order() {
        let x = Variable::new(1.0);
        let rate = Variable::new(2.0);
        let ab = Variable::new(3.0);
        let table = SymbolTable::new([
            Binding::variable("x", &x),
            Binding::variable("rate", &rate),
            Binding::function("f", Function::unary(|v| v)),
            Binding::variable("ab", &ab),
        ])
        .unwrap();

        let names: Vec<&str> = table.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["rate", "ab", "x", "f"]);
        assert_eq!(table.variable_count(), 3);
        assert_eq!(table.resolve("rate"), Some(Resolved::Variable { slot: 0 }));
        assert_eq!(table.resolve("x"), Some(Resolved::Variable { slot: 2 }));
        assert_eq!(table.slot_value(1), Some(3.0));
    }

    #[test]
    fn test_equal_lengths_keep_given_order() {
        let a = Variable::new(0.0);
        let b = Variable::new(0.0);
        let table =
            SymbolTable::new([Binding::variable("b", &b), Binding::variable("a", &a)]).unwrap();
        assert_eq!(table.resolve("b"), Some(Resolved::Variable { slot: 0 }));
        assert_eq!(table.resolve("a"), Some(Resolved::Variable { slot: 1 }));
    }

    #[test]
    fn test_builtin_fallback_and_shadowing() {
        let table = SymbolTable::empty();
        match table.resolve("atan2") {
            Some(Resolved::Function {
                callee: Callee::Builtin(b),
                arity,
            }) => {
                assert_eq!(b.name, "atan2");
                assert_eq!(arity, 2);
            }
            other => panic!("expected builtin, got {:?}", other),
        }
        assert_eq!(table.resolve("nope"), None);

        let table =
            SymbolTable::new([Binding::function("pow", Function::binary(|a, b| a + b))]).unwrap();
        assert_eq!(
            table.resolve("pow"),
            Some(Resolved::Function {
                callee: Callee::Host(0),
                arity: 2
            })
        );
        assert_eq!(table.function_at(0).unwrap().name.as_str(), "pow");
    }

    #[test]
    fn test_names_are_trimmed_and_validated() {
        let v = Variable::new(0.0);
        let table = SymbolTable::new([Binding::variable("  speed ", &v)]).unwrap();
        assert_eq!(table.resolve("speed"), Some(Resolved::Variable { slot: 0 }));

        for bad in ["", "   ", "1x", "a-b", "sp ace"] {
            assert!(
                matches!(
                    SymbolTable::new([Binding::variable(bad, &v)]),
                    Err(ExprError::InvalidBinding { .. })
                ),
                "{:?} should be rejected",
                bad
            );
        }

        let long: String = core::iter::repeat('n').take(MAX_NAME_LENGTH + 1).collect();
        assert!(matches!(
            SymbolTable::new([Binding::variable(&long, &v)]),
            Err(ExprError::InvalidBinding {
                reason: "name too long",
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let v = Variable::new(0.0);
        let w = Variable::new(0.0);
        let err = SymbolTable::new([Binding::variable("x", &v), Binding::variable(" x", &w)])
            .unwrap_err();
        assert_eq!(
            err,
            ExprError::InvalidBinding {
                name: "x".to_string(),
                reason: "duplicate binding name"
            }
        );
    }

    #[test]
    fn test_too_many_bindings() {
        let v = Variable::new(0.0);
        let bindings: Vec<Binding> = (0..=MAX_BINDINGS)
            .map(|i| Binding::variable(&alloc::format!("v{}", i), &v))
            .collect();
        assert_eq!(
            SymbolTable::new(&bindings).unwrap_err(),
            ExprError::CapacityExceeded("bindings")
        );
        assert!(SymbolTable::new(&bindings[..MAX_BINDINGS]).is_ok());
    }
}
