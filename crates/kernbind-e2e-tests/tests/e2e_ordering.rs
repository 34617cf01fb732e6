use std::collections::HashMap;

use kernbind_analysis::{CallGraph, level_order};
use kernbind_ir::{Function, Handle, Module};

const SOURCE: &str = r#"
declare @ext()

fn @c() {
  call @ext()
  return
}

fn @b() {
  call @c()
  return
}

fn @a() {
  call @c()
  call @b()
  return
}

fn @unused() {
  call @a()
  return
}

kernel @k0() {
  call @a()
  return
}

kernel @k1() {
  call @b()
  return
}
"#;

#[test]
fn level_order_is_deterministic() {
    let module = kernbind_parser::parse(SOURCE).unwrap();
    let first = level_order(&module);
    for _ in 0..5 {
        assert_eq!(level_order(&module), first);
    }
    let reparsed = kernbind_parser::parse(&kernbind_ir::dump_module(&module)).unwrap();
    assert_eq!(
        names(&reparsed, &level_order(&reparsed)),
        names(&module, &first)
    );
}

fn names(module: &Module, order: &[Handle<Function>]) -> Vec<String> {
    order
        .iter()
        .map(|&h| module.functions[h].name.clone())
        .collect()
}

#[test]
fn callers_precede_callees() {
    let module = kernbind_parser::parse(SOURCE).unwrap();
    let order = level_order(&module);
    let names: Vec<_> = order
        .iter()
        .map(|&h| module.functions[h].name.as_str())
        .collect();
    assert_eq!(names, vec!["k0", "k1", "a", "b", "c"]);

    let position: HashMap<_, _> = order.iter().enumerate().map(|(i, &h)| (h, i)).collect();
    let graph = CallGraph::build(&module);
    for &caller in &order {
        for callee in graph.callees(caller) {
            assert!(position[&caller] < position[&callee]);
        }
    }
}
