//! Class declaration and instantiation
//!
//! Inheritance is a single parent chain. Methods resolve on the nearest
//! class in that chain that declares them.

use std::mem;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::ClassDef;
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::span::Span;
use crate::value::{Class, Closure, Instance, Value, INITIALIZER};

use super::{Evaluate, Interpreter, Signal};

/// Name `自分` is bound to inside methods.
pub(crate) const SELF: &str = "自分";

/// Build the class value for `def`, resolving its parent in `env`.
pub(super) fn declare(
    interp: &mut Interpreter,
    env: &Environment,
    def: &ClassDef,
    span: Span,
) -> Result<Value, Signal> {
    let parent = match &def.parent {
        Some(name) => match env.get(name).map_err(|e| interp.locate(e.into(), span))? {
            Value::Class(parent) => Some(parent),
            other => {
                return Err(interp.raise(
                    ErrorKind::TypeError,
                    format!("{} は型ではないので継承できません ({})", name, other.type_name()),
                    span,
                ))
            }
        },
        None => None,
    };

    let methods = def
        .methods
        .iter()
        .map(|method| {
            let closure = Closure::new(Arc::clone(method), env.clone(), interp.source.clone());
            (method.display_name().to_string(), Arc::new(closure))
        })
        .collect();

    Ok(Value::Class(Arc::new(Class {
        name: def.name.clone(),
        parent,
        fields: def.fields.clone(),
        methods,
        env: env.clone(),
        origin: interp.source.clone(),
    })))
}

/// Create an instance of `class`.
///
/// Field defaults run first, ancestors before descendants, each in the
/// scope its class was declared in. Then `初期化` runs with the arguments;
/// a class without one takes its fields positionally.
pub(super) fn instantiate(
    interp: &mut Interpreter,
    class: &Arc<Class>,
    args: Vec<Value>,
    span: Span,
) -> Result<Value, Signal> {
    let fields = field_defaults(interp, class)?;
    let field_names: Vec<String> = fields.keys().cloned().collect();
    let instance = Arc::new(Instance::new(Arc::clone(class), fields));
    let value = Value::Instance(Arc::clone(&instance));

    match class.find_method(INITIALIZER) {
        Some(init) => {
            interp.call_closure(&init, Some(value.clone()), args, span)?;
        }
        None => {
            if args.len() > field_names.len() {
                return Err(interp.raise(
                    ErrorKind::ArityError,
                    format!(
                        "{} のフィールドは {} 個です ({} 個渡されました)",
                        class.name,
                        field_names.len(),
                        args.len()
                    ),
                    span,
                ));
            }
            for (name, arg) in field_names.into_iter().zip(args) {
                instance.set(name, arg);
            }
        }
    }
    Ok(value)
}

fn field_defaults(
    interp: &mut Interpreter,
    class: &Class,
) -> Result<IndexMap<String, Value>, Signal> {
    let mut fields = IndexMap::new();
    let lineage: Vec<&Class> = class.lineage().collect();
    for ancestor in lineage.into_iter().rev() {
        if ancestor.fields.is_empty() {
            continue;
        }
        let previous = mem::replace(&mut interp.source, ancestor.origin.clone());
        let scope = ancestor.env.child();
        let mut result = Ok(());
        for field in &ancestor.fields {
            let value = match &field.default {
                Some(expr) => match expr.eval(interp, &scope) {
                    Ok(v) => v,
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                },
                None => Value::Null,
            };
            fields.insert(field.name.clone(), value);
        }
        interp.source = previous;
        result?;
    }
    Ok(fields)
}
