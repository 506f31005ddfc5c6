//! Host-registered bindings: the root scope every unit sees, and the
//! builtin `print` and `math` modules.

use indexmap::IndexMap;

use crate::analyzer::Binding;
use crate::types::Type;
use crate::value::Value;

fn ty(t: Type) -> Binding {
    Binding::Const(Value::Type(t))
}

fn builtin(module: &'static str, name: &'static str) -> Binding {
    Binding::Const(Value::Builtin { module, name })
}

/// The root scope: type names and free builtin functions.
pub(crate) fn root_bindings() -> IndexMap<String, Binding> {
    let mut map = IndexMap::new();
    map.insert("int".to_string(), ty(Type::Int));
    map.insert("bool".to_string(), ty(Type::Bool));
    map.insert("float".to_string(), ty(Type::Float));
    map.insert("str".to_string(), ty(Type::Str));
    map.insert("Pos".to_string(), ty(Type::Pos));
    map.insert("Rot".to_string(), ty(Type::Rot));
    map.insert("Offset".to_string(), ty(Type::Offset));
    map.insert("Enfilter".to_string(), ty(Type::Enfilter));
    map.insert("Any".to_string(), ty(Type::Any));
    map.insert("list".to_string(), ty(Type::List(Box::new(Type::Any))));
    map.insert(
        "map".to_string(),
        ty(Type::Map(Box::new(Type::Any), Box::new(Type::Any))),
    );
    // `Engroup` needs its element template before it becomes a type.
    map.insert("Engroup".to_string(), builtin("types", "Engroup"));
    map.insert("len".to_string(), builtin("builtins", "len"));
    map
}

/// Modules provided by the compiler instead of a source file.
pub(crate) fn builtin_module(name: &str) -> Option<IndexMap<String, Binding>> {
    let mut map = IndexMap::new();
    match name {
        "print" => {
            map.insert("tell".to_string(), builtin("print", "tell"));
            map.insert("title".to_string(), builtin("print", "title"));
        }
        "math" => {
            map.insert("min".to_string(), builtin("math", "min"));
            map.insert("max".to_string(), builtin("math", "max"));
            map.insert("abs".to_string(), builtin("math", "abs"));
            map.insert("pow".to_string(), builtin("math", "pow"));
        }
        _ => return None,
    }
    Some(map)
}
