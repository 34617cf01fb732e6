//! Static call graph and the kernel-rooted level order.
//!
//! The source language forbids recursion and function pointers, so the
//! graph is expected to be a DAG. Every traversal here still tracks visited
//! nodes so that malformed cyclic input terminates.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use kernbind_ir::{Function, Handle, Module};

/// Caller → callee edges between functions that have bodies.
///
/// Adjacency is kept in ordered sets so every iteration follows module
/// declaration order.
#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    callees: BTreeMap<Handle<Function>, BTreeSet<Handle<Function>>>,
    roots: Vec<Handle<Function>>,
}

impl CallGraph {
    /// Scans every call statement in the module.
    ///
    /// Calls to declarations (builtins, accessors) are not edges.
    pub fn build(module: &Module) -> Self {
        let mut graph = Self::default();
        for (handle, func) in module.functions.iter() {
            if func.is_declaration() {
                continue;
            }
            if func.is_kernel_definition() {
                graph.roots.push(handle);
            }
            let edges = graph.callees.entry(handle).or_default();
            for call in func.calls() {
                let defined = module
                    .functions
                    .try_get(call.callee)
                    .is_some_and(|f| !f.is_declaration());
                if defined {
                    edges.insert(call.callee);
                }
            }
        }
        graph
    }

    /// Kernel definitions in module order.
    pub fn roots(&self) -> &[Handle<Function>] {
        &self.roots
    }

    /// Distinct callees of `caller`, in module order.
    pub fn callees(&self, caller: Handle<Function>) -> impl Iterator<Item = Handle<Function>> + '_ {
        self.callees.get(&caller).into_iter().flatten().copied()
    }

    /// Distinct callers of `callee`, in module order.
    pub fn callers(&self, callee: Handle<Function>) -> Vec<Handle<Function>> {
        self.callees
            .iter()
            .filter(|(_, edges)| edges.contains(&callee))
            .map(|(&caller, _)| caller)
            .collect()
    }

    /// Breadth-first discovery order from the kernels.
    ///
    /// Kernels seed the queue in module order; each newly visited function
    /// queues its callees in module order. Unreachable functions are omitted.
    pub fn discovery_order(&self) -> Vec<Handle<Function>> {
        let mut queue: VecDeque<_> = self.roots.iter().copied().collect();
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        while let Some(func) = queue.pop_front() {
            if !visited.insert(func) {
                continue;
            }
            order.push(func);
            queue.extend(self.callees(func));
        }
        order
    }

    /// Level order: every reachable function exactly once, each caller
    /// before all of its callees.
    ///
    /// Functions are layered by their longest call chain from a kernel;
    /// within a layer they keep breadth-first discovery order. Functions
    /// caught in a cycle never settle into a layer and are appended last,
    /// in discovery order.
    pub fn level_order(&self) -> Vec<Handle<Function>> {
        let discovery = self.discovery_order();
        let rank: HashMap<_, _> = discovery.iter().enumerate().map(|(i, &f)| (f, i)).collect();

        let mut pending: HashMap<Handle<Function>, usize> =
            discovery.iter().map(|&f| (f, 0)).collect();
        for &caller in &discovery {
            for callee in self.callees(caller) {
                if let Some(count) = pending.get_mut(&callee) {
                    *count += 1;
                }
            }
        }

        let mut order = Vec::with_capacity(discovery.len());
        let mut placed = HashSet::new();
        let mut layer: Vec<_> = discovery
            .iter()
            .copied()
            .filter(|f| pending[f] == 0)
            .collect();
        while !layer.is_empty() {
            let mut next = Vec::new();
            for &func in &layer {
                placed.insert(func);
                order.push(func);
                for callee in self.callees(func) {
                    if let Some(count) = pending.get_mut(&callee) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(callee);
                        }
                    }
                }
            }
            next.sort_by_key(|f| rank[f]);
            layer = next;
        }

        if order.len() < discovery.len() {
            log::warn!(
                "call graph has a cycle; {} function(s) ordered by discovery only",
                discovery.len() - order.len()
            );
            order.extend(discovery.iter().copied().filter(|f| !placed.contains(f)));
        }
        order
    }
}

/// Convenience: the level order of `module`'s call graph.
pub fn level_order(module: &Module) -> Vec<Handle<Function>> {
    CallGraph::build(module).level_order()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernbind_ir::{Expression, Statement};

    fn add(module: &mut Module, func: Function) -> Handle<Function> {
        module.add_function(func).unwrap()
    }

    fn call(module: &mut Module, caller: Handle<Function>, callee: Handle<Function>) {
        let func = &mut module.functions[caller];
        let result = func.expressions.append(Expression::CallResult(callee));
        func.body.get_or_insert_with(Vec::new).push(Statement::Call {
            function: callee,
            arguments: vec![],
            result: Some(result),
        });
    }

    fn names(module: &Module, order: &[Handle<Function>]) -> Vec<String> {
        order
            .iter()
            .map(|&h| module.functions[h].name.clone())
            .collect()
    }

    #[test]
    fn kernels_then_callees_breadth_first() {
        let mut m = Module::default();
        let c = add(&mut m, Function::new("c"));
        let b = add(&mut m, Function::new("b"));
        let a = add(&mut m, Function::new("a"));
        let k0 = add(&mut m, Function::kernel("k0"));
        let k1 = add(&mut m, Function::kernel("k1"));
        call(&mut m, k0, a);
        call(&mut m, k0, b);
        call(&mut m, k1, c);
        let order = level_order(&m);
        // k0's callees in module order (b before a), then k1's.
        assert_eq!(names(&m, &order), vec!["k0", "k1", "b", "a", "c"]);
    }

    #[test]
    fn unreachable_and_declarations_omitted() {
        let mut m = Module::default();
        let ext = add(&mut m, Function::declaration("ext", vec![], None));
        let _dead = add(&mut m, Function::new("dead"));
        let k = add(&mut m, Function::kernel("k"));
        call(&mut m, k, ext);
        assert_eq!(names(&m, &level_order(&m)), vec!["k"]);
    }

    #[test]
    fn caller_precedes_callee_on_uneven_paths() {
        // k -> f, k -> g, g -> f, with f declared before g.
        let mut m = Module::default();
        let f = add(&mut m, Function::new("f"));
        let g = add(&mut m, Function::new("g"));
        let k = add(&mut m, Function::kernel("k"));
        call(&mut m, k, f);
        call(&mut m, k, g);
        call(&mut m, g, f);
        assert_eq!(names(&m, &level_order(&m)), vec!["k", "g", "f"]);
    }

    #[test]
    fn every_edge_respected_and_no_repeats() {
        let mut m = Module::default();
        let h: Vec<_> = (0..6)
            .map(|i| add(&mut m, Function::new(format!("h{i}"))))
            .collect();
        let k = add(&mut m, Function::kernel("k"));
        let edges = [(k, h[5]), (k, h[0]), (h[5], h[1]), (h[0], h[1]), (h[1], h[2]), (h[5], h[2])];
        for (from, to) in edges {
            call(&mut m, from, to);
        }
        let order = level_order(&m);
        let pos: HashMap<_, _> = order.iter().enumerate().map(|(i, &f)| (f, i)).collect();
        assert_eq!(pos.len(), order.len());
        for (from, to) in edges {
            assert!(pos[&from] < pos[&to]);
        }
        assert!(!pos.contains_key(&h[3]));
    }

    #[test]
    fn ordering_is_deterministic() {
        let mut m = Module::default();
        let a = add(&mut m, Function::new("a"));
        let b = add(&mut m, Function::new("b"));
        let k = add(&mut m, Function::kernel("k"));
        call(&mut m, k, b);
        call(&mut m, k, a);
        call(&mut m, a, b);
        assert_eq!(level_order(&m), level_order(&m));
    }

    #[test]
    fn cycle_terminates() {
        let mut m = Module::default();
        let a = add(&mut m, Function::new("a"));
        let b = add(&mut m, Function::new("b"));
        let k = add(&mut m, Function::kernel("k"));
        call(&mut m, k, a);
        call(&mut m, a, b);
        call(&mut m, b, a);
        let order = level_order(&m);
        assert_eq!(names(&m, &order), vec!["k", "a", "b"]);
    }

    #[test]
    fn callers_and_callees() {
        let mut m = Module::default();
        let a = add(&mut m, Function::new("a"));
        let k0 = add(&mut m, Function::kernel("k0"));
        let k1 = add(&mut m, Function::kernel("k1"));
        call(&mut m, k0, a);
        call(&mut m, k0, a);
        call(&mut m, k1, a);
        let graph = CallGraph::build(&m);
        assert_eq!(graph.callers(a), vec![k0, k1]);
        assert_eq!(graph.callees(k0).collect::<Vec<_>>(), vec![a]);
        assert_eq!(graph.roots(), &[k0, k1]);
    }
}
