//! Descriptor allocation.
//!
//! Runs in two phases over the whole module:
//!
//! 1. Literal samplers. Every call to the sampler initializer is replaced by
//!    a call to the literal sampler accessor. All literal samplers share one
//!    descriptor set; each distinct sampler map value gets a binding in
//!    first-occurrence order.
//! 2. Kernel arguments. Each kernel with arguments claims one set and binds
//!    its arguments `0..n` in order. Every argument use is replaced by the
//!    result of a resource accessor call placed at the top of the body.
//!    Accessors and their carrier types are shared by all arguments with
//!    the same [`Discriminant`].

use std::collections::HashMap;

use kernbind_analysis::{ArgKind, Discriminant, DiscriminantMap, classify};
use kernbind_ir::builtins::{
    LITERAL_SAMPLER_ACCESSOR, SAMPLER_INITIALIZER, resource_accessor_name, resource_type_name,
};
use kernbind_ir::{
    AddressSpace, ArraySize, Expression, Function, Handle, Literal, Module, Scalar, Statement,
    StructMember, Type, TypeInner, format_type, walk_block_mut,
};

use crate::{CompileContext, Pass, PassError, trace_if};

/// One distinct literal sampler and the binding it received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiteralSamplerBinding {
    pub value: u32,
    pub expression: String,
    pub set: u32,
    pub binding: u32,
    /// Position of the value's first occurrence in the sampler map.
    pub sampler_map_index: u32,
}

/// One kernel argument and the binding it received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgumentBinding {
    pub kernel: String,
    pub position: u32,
    pub name: Option<String>,
    pub kind: ArgKind,
    pub set: u32,
    pub binding: u32,
    /// Index of the argument's discriminant, and of its accessor.
    pub discriminant: usize,
}

/// Everything [`AllocateDescriptors`] assigned, in assignment order.
#[derive(Clone, Debug, Default)]
pub struct AllocationReport {
    pub literal_samplers: Vec<LiteralSamplerBinding>,
    pub arguments: Vec<ArgumentBinding>,
    pub discriminants: DiscriminantMap,
}

/// Binds literal samplers and kernel arguments to descriptor sets.
#[derive(Debug, Default)]
pub struct AllocateDescriptors;

impl Pass for AllocateDescriptors {
    fn name(&self) -> &str {
        "allocate-descriptors"
    }

    fn run(&self, module: &mut Module, ctx: &mut CompileContext) -> Result<bool, PassError> {
        let mut report = AllocationReport::default();
        let mut changed = allocate_literal_samplers(module, ctx, &mut report)?;
        changed |= allocate_kernel_arguments(module, ctx, &mut report)?;
        ctx.allocation = Some(report);
        Ok(changed)
    }
}

fn allocate_literal_samplers(
    module: &mut Module,
    ctx: &mut CompileContext,
    report: &mut AllocationReport,
) -> Result<bool, PassError> {
    let initializer = module.function_by_name(SAMPLER_INITIALIZER);
    let mut callers: Vec<_> = initializer
        .map(|init| module.call_sites_of(init))
        .unwrap_or_default()
        .into_iter()
        .map(|(caller, _)| caller)
        .collect();
    callers.dedup();

    if ctx.sampler_map.is_empty() {
        return match callers.first() {
            Some(&caller) => Err(PassError::MissingSamplerMap {
                function: module.functions[caller].name.clone(),
            }),
            None => Ok(false),
        };
    }

    let set = ctx.descriptors.claim();
    // value -> (binding, sampler map index of its first occurrence)
    let mut slots: HashMap<u32, (u32, u32)> = HashMap::new();
    for (index, entry) in ctx.sampler_map.entries().iter().enumerate() {
        if slots.contains_key(&entry.value) {
            continue;
        }
        let binding = slots.len() as u32;
        slots.insert(entry.value, (binding, index as u32));
        trace_if!(
            ctx.options.show_descriptors,
            "literal sampler {:#x} ({}) -> set {set} binding {binding}",
            entry.value,
            entry.expression
        );
        report.literal_samplers.push(LiteralSamplerBinding {
            value: entry.value,
            expression: entry.expression.clone(),
            set,
            binding,
            sampler_map_index: index as u32,
        });
    }

    let Some(initializer) = initializer else {
        return Ok(false);
    };
    if !callers.is_empty() {
        let u32_ty = module.scalar_type(Scalar::U32);
        let sampler_ty = module.anonymous_type(TypeInner::Sampler);
        let mut accessor = Function::declaration(
            LITERAL_SAMPLER_ACCESSOR,
            vec![u32_ty; 3],
            Some(sampler_ty),
        );
        accessor.pure = true;
        let accessor = module.get_or_insert_function(accessor);
        for caller in callers {
            let func = &mut module.functions[caller];
            rewrite_sampler_calls(func, initializer, accessor, set, &slots)?;
        }
    }

    module.remove_function(initializer)?;
    Ok(true)
}

/// Points every initializer call in `func` at the literal sampler accessor.
fn rewrite_sampler_calls(
    func: &mut Function,
    initializer: Handle<Function>,
    accessor: Handle<Function>,
    set: u32,
    slots: &HashMap<u32, (u32, u32)>,
) -> Result<(), PassError> {
    let Some(body) = func.body.as_mut() else {
        return Ok(());
    };
    let name = &func.name;
    let expressions = &mut func.expressions;
    let mut failure = None;
    let mut results = Vec::new();

    walk_block_mut(body, &mut |stmt| {
        let Statement::Call {
            function,
            arguments,
            result,
        } = stmt
        else {
            return;
        };
        if *function != initializer || failure.is_some() {
            return;
        }
        let value = arguments
            .first()
            .and_then(|&arg| match expressions.try_get(arg) {
                Some(Expression::Literal(lit)) => lit.as_u32(),
                _ => None,
            });
        let Some(value) = value else {
            failure = Some(PassError::NonConstantSampler {
                function: name.clone(),
            });
            return;
        };
        let Some(&(binding, index)) = slots.get(&value) else {
            failure = Some(PassError::UnregisteredSampler {
                value,
                function: name.clone(),
            });
            return;
        };
        *function = accessor;
        *arguments = [set, binding, index]
            .into_iter()
            .map(|v| expressions.append(Expression::Literal(Literal::U32(v))))
            .collect();
        results.extend(*result);
    });

    if let Some(err) = failure {
        return Err(err);
    }
    for result in results {
        func.expressions[result] = Expression::CallResult(accessor);
    }
    Ok(())
}

/// Per-discriminant accessors, created on first use.
#[derive(Default)]
struct Accessors {
    discriminants: DiscriminantMap,
    functions: HashMap<usize, Handle<Function>>,
}

impl Accessors {
    fn get_or_create(
        &mut self,
        module: &mut Module,
        key: Discriminant,
        kind: ArgKind,
        show: bool,
    ) -> Result<(usize, Handle<Function>), PassError> {
        let (index, _) = self.discriminants.get_or_insert(key);
        if let Some(&accessor) = self.functions.get(&index) {
            return Ok((index, accessor));
        }

        let carrier = carrier_type(module, key.ty, kind, index);
        let result = match kind {
            ArgKind::Buffer | ArgKind::Pod => module.anonymous_type(TypeInner::Pointer {
                base: carrier,
                space: AddressSpace::StorageBuffer,
            }),
            _ => carrier,
        };
        let u32_ty = module.scalar_type(Scalar::U32);
        let mut accessor =
            Function::declaration(resource_accessor_name(index), vec![u32_ty; 4], Some(result));
        accessor.pure = true;
        let accessor = module.add_function(accessor)?;
        trace_if!(
            show,
            "{} for {} {}",
            module.functions[accessor].name,
            format_type(key.ty, &module.types),
            key.position
        );
        self.functions.insert(index, accessor);
        Ok((index, accessor))
    }
}

/// The type a resource accessor exposes for an argument.
///
/// Buffers become a named struct around a runtime array of the pointee,
/// plain data a named struct around the value. Opaque handles are their
/// own carrier.
fn carrier_type(module: &mut Module, ty: Handle<Type>, kind: ArgKind, index: usize) -> Handle<Type> {
    let member = match kind {
        ArgKind::Buffer => {
            let element = match module.types[ty].inner {
                TypeInner::Pointer { base, .. } => base,
                _ => ty,
            };
            module.anonymous_type(TypeInner::Array {
                base: element,
                size: ArraySize::Dynamic,
            })
        }
        ArgKind::Pod => ty,
        _ => return ty,
    };
    module.types.insert(Type {
        name: Some(resource_type_name(index)),
        inner: TypeInner::Struct {
            members: vec![StructMember {
                name: None,
                ty: member,
            }],
        },
    })
}

fn allocate_kernel_arguments(
    module: &mut Module,
    ctx: &mut CompileContext,
    report: &mut AllocationReport,
) -> Result<bool, PassError> {
    let kernels: Vec<_> = module
        .functions
        .iter()
        .filter(|(_, f)| f.is_kernel_definition())
        .map(|(h, _)| h)
        .collect();
    let mut accessors = Accessors::default();
    let mut changed = false;

    for kernel in kernels {
        let arguments: Vec<_> = module.functions[kernel]
            .arguments
            .iter()
            .map(|arg| (arg.name.clone(), arg.ty))
            .collect();
        let mut set = None;
        let mut prologue = Vec::with_capacity(arguments.len());

        for (position, (name, ty)) in arguments.into_iter().enumerate() {
            let position = position as u32;
            let kernel_name = || module.functions[kernel].name.clone();
            let kind = classify(ty, &module.types).map_err(|source| PassError::ArgumentKind {
                kernel: kernel_name(),
                position,
                source,
            })?;
            if kind == ArgKind::Local {
                return Err(PassError::LocalArgument {
                    kernel: kernel_name(),
                    position,
                });
            }

            let set = *set.get_or_insert_with(|| ctx.descriptors.claim());
            let binding = prologue.len() as u32;
            let key = Discriminant { ty, position };
            let (index, accessor) = accessors.get_or_create(
                module,
                key,
                kind,
                ctx.options.show_descriptors,
            )?;

            let func = &mut module.functions[kernel];
            let operands = [set, binding, kind.tag(), position]
                .into_iter()
                .map(|v| func.literal(Literal::U32(v)))
                .collect();
            let call_result = func.expressions.append(Expression::CallResult(accessor));
            prologue.push(Statement::Call {
                function: accessor,
                arguments: operands,
                result: Some(call_result),
            });

            let replacement = match kind {
                ArgKind::Buffer => zero_access(func, call_result, 3),
                ArgKind::Pod => {
                    let pointer = zero_access(func, call_result, 2);
                    func.expressions.append(Expression::Load { pointer })
                }
                _ => call_result,
            };
            let uses: Vec<_> = func
                .expressions
                .iter()
                .filter(|(_, e)| matches!(e, Expression::FunctionArgument(i) if *i == position))
                .map(|(h, _)| h)
                .collect();
            for arg in uses {
                func.replace_uses(arg, replacement);
            }

            trace_if!(
                ctx.options.show_descriptors,
                "kernel {} arg {position} ({kind}) -> set {set} binding {binding}",
                func.name
            );
            report.arguments.push(ArgumentBinding {
                kernel: func.name.clone(),
                position,
                name,
                kind,
                set,
                binding,
                discriminant: index,
            });
        }

        if !prologue.is_empty() {
            if let Some(body) = module.functions[kernel].body.as_mut() {
                body.splice(0..0, prologue);
            }
            changed = true;
        }
    }

    report.discriminants = accessors.discriminants;
    Ok(changed)
}

/// A zero-offset access into an accessor result.
///
/// The first index steps over the pointer and the second selects the
/// carrier's single member. Buffers take a third index to reach the first
/// array element; plain data stops at the member.
fn zero_access(func: &mut Function, base: Handle<Expression>, depth: usize) -> Handle<Expression> {
    let zero = func.literal(Literal::U32(0));
    func.expressions.append(Expression::Access {
        base,
        indices: vec![zero; depth],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernbind_ir::FunctionArgument;

    use crate::SamplerMap;

    fn pointer(module: &mut Module, space: AddressSpace) -> Handle<Type> {
        let f32_ty = module.scalar_type(Scalar::F32);
        module.anonymous_type(TypeInner::Pointer { base: f32_ty, space })
    }

    /// A kernel that stores through or returns each of its arguments.
    fn kernel(module: &mut Module, name: &str, args: &[Handle<Type>]) -> Handle<Function> {
        let mut f = Function::kernel(name);
        f.arguments = args
            .iter()
            .enumerate()
            .map(|(i, &ty)| FunctionArgument::new(Some(format!("a{i}")), ty))
            .collect();
        let mut body = Vec::new();
        for i in 0..args.len() as u32 {
            let arg = f.argument_expression(i);
            let value = f.literal(Literal::I32(0));
            body.push(Statement::Store {
                pointer: arg,
                value,
            });
        }
        body.push(Statement::Return { value: None });
        f.body = Some(body);
        module.add_function(f).unwrap()
    }

    fn sampler_user(module: &mut Module, name: &str, values: &[Literal]) -> Handle<Function> {
        let u32_ty = module.scalar_type(Scalar::U32);
        let sampler_ty = module.anonymous_type(TypeInner::Sampler);
        let init = module.get_or_insert_function(Function::declaration(
            SAMPLER_INITIALIZER,
            vec![u32_ty],
            Some(sampler_ty),
        ));
        let mut f = Function::kernel(name);
        let mut body = Vec::new();
        for &value in values {
            let arg = f.literal(value);
            let result = f.expressions.append(Expression::CallResult(init));
            body.push(Statement::Call {
                function: init,
                arguments: vec![arg],
                result: Some(result),
            });
        }
        f.body = Some(body);
        module.add_function(f).unwrap()
    }

    fn run(module: &mut Module, ctx: &mut CompileContext) -> Result<bool, PassError> {
        AllocateDescriptors.run(module, ctx)
    }

    fn call_operands(func: &Function, index: usize) -> Vec<u32> {
        func.calls()[index]
            .arguments
            .iter()
            .map(|&h| func.literal_value(h).and_then(|l| l.as_u32()).unwrap())
            .collect()
    }

    #[test]
    fn literal_samplers_bound_by_first_occurrence() {
        let mut m = Module::default();
        sampler_user(
            &mut m,
            "k",
            &[Literal::U32(0x23), Literal::I32(0x12), Literal::U32(0x23)],
        );
        let mut ctx = CompileContext::default();
        ctx.sampler_map = SamplerMap::from_pairs([(0x12, "a"), (0x23, "b"), (0x12, "a")]);

        assert!(run(&mut m, &mut ctx).unwrap());
        assert!(m.function_by_name(SAMPLER_INITIALIZER).is_none());

        let accessor = m.function_by_name(LITERAL_SAMPLER_ACCESSOR).unwrap();
        assert!(m.functions[accessor].pure);
        let k = &m.functions[m.function_by_name("k").unwrap()];
        let calls = k.calls();
        assert_eq!(calls.len(), 3);
        for call in &calls {
            assert_eq!(call.callee, accessor);
            assert!(matches!(
                k.expressions[call.result.unwrap()],
                Expression::CallResult(h) if h == accessor
            ));
        }
        assert_eq!(call_operands(k, 0), vec![0, 1, 1]);
        assert_eq!(call_operands(k, 1), vec![0, 0, 0]);
        assert_eq!(call_operands(k, 2), vec![0, 1, 1]);

        let report = ctx.allocation.unwrap();
        let bindings: Vec<_> = report
            .literal_samplers
            .iter()
            .map(|s| (s.value, s.binding, s.sampler_map_index))
            .collect();
        assert_eq!(bindings, vec![(0x12, 0, 0), (0x23, 1, 1)]);
    }

    #[test]
    fn sampler_map_without_calls_still_claims_set() {
        let mut m = Module::default();
        let k = {
            let buf = pointer(&mut m, AddressSpace::Global);
            kernel(&mut m, "k", &[buf])
        };
        let mut ctx = CompileContext::default();
        ctx.sampler_map = SamplerMap::from_pairs([(0x10, "s")]);
        run(&mut m, &mut ctx).unwrap();
        assert!(m.function_by_name(LITERAL_SAMPLER_ACCESSOR).is_none());
        let report = ctx.allocation.unwrap();
        assert_eq!(report.literal_samplers[0].set, 0);
        assert_eq!(report.arguments[0].set, 1);
        assert_eq!(m.functions[k].name, "k");
    }

    #[test]
    fn literal_sampler_without_map_fails() {
        let mut m = Module::default();
        sampler_user(&mut m, "k", &[Literal::U32(0x12)]);
        let err = run(&mut m, &mut CompileContext::default()).unwrap_err();
        assert!(matches!(err, PassError::MissingSamplerMap { ref function } if function == "k"));
    }

    #[test]
    fn unused_initializer_without_map_is_kept() {
        let mut m = Module::default();
        sampler_user(&mut m, "k", &[]);
        let mut ctx = CompileContext::default();
        assert!(!run(&mut m, &mut ctx).unwrap());
        assert!(m.function_by_name(SAMPLER_INITIALIZER).is_some());
        assert_eq!(ctx.descriptors.next_set(), 0);
    }

    #[test]
    fn unregistered_sampler_fails() {
        let mut m = Module::default();
        sampler_user(&mut m, "k", &[Literal::U32(0x99)]);
        let mut ctx = CompileContext::default();
        ctx.sampler_map = SamplerMap::from_pairs([(0x12, "a")]);
        let err = run(&mut m, &mut ctx).unwrap_err();
        assert!(matches!(err, PassError::UnregisteredSampler { value: 0x99, .. }));
    }

    #[test]
    fn non_constant_sampler_fails() {
        let mut m = Module::default();
        let k = sampler_user(&mut m, "k", &[Literal::U32(0x12)]);
        let func = &mut m.functions[k];
        let arg = func.argument_expression(0);
        if let Some(Statement::Call { arguments, .. }) =
            func.body.as_mut().and_then(|b| b.first_mut())
        {
            arguments[0] = arg;
        }
        let mut ctx = CompileContext::default();
        ctx.sampler_map = SamplerMap::from_pairs([(0x12, "a")]);
        let err = run(&mut m, &mut ctx).unwrap_err();
        assert!(matches!(err, PassError::NonConstantSampler { .. }));
    }

    #[test]
    fn kernel_arguments_get_consecutive_bindings() {
        let mut m = Module::default();
        let buf = pointer(&mut m, AddressSpace::Global);
        let i32_ty = m.scalar_type(Scalar::I32);
        let sampler = m.anonymous_type(TypeInner::Sampler);
        let image = m.anonymous_type(TypeInner::Image {
            access: kernbind_ir::ImageAccess::WriteOnly,
        });
        let k = kernel(&mut m, "k", &[buf, i32_ty, sampler, image]);
        let mut ctx = CompileContext::default();
        assert!(run(&mut m, &mut ctx).unwrap());

        let func = &m.functions[k];
        let calls = func.calls();
        assert_eq!(calls.len(), 4);
        let tags = [
            ArgKind::Buffer,
            ArgKind::Pod,
            ArgKind::Sampler,
            ArgKind::WriteOnlyImage,
        ];
        for (i, kind) in tags.iter().enumerate() {
            assert_eq!(call_operands(func, i), vec![0, i as u32, kind.tag(), i as u32]);
            assert!(m.functions[calls[i].callee].name.starts_with("kernbind.resource."));
        }

        // No argument reads survive outside the replaced expressions.
        let body = func.body.as_ref().unwrap();
        for stmt in &body[4..] {
            if let Statement::Store { pointer, .. } = stmt {
                assert!(!matches!(
                    func.expressions[*pointer],
                    Expression::FunctionArgument(_)
                ));
            }
        }
        // Buffer replacement reaches the first array element of the carrier.
        let Statement::Store { pointer, .. } = &body[4] else {
            panic!("expected Store");
        };
        let Expression::Access { base, indices } = &func.expressions[*pointer] else {
            panic!("expected Access");
        };
        assert_eq!(Some(*base), calls[0].result);
        assert_eq!(indices.len(), 3);
        // Pod replacement loads the carrier's member.
        let Statement::Store { pointer, .. } = &body[5] else {
            panic!("expected Store");
        };
        let Expression::Load { pointer } = func.expressions[*pointer] else {
            panic!("expected Load");
        };
        let Expression::Access { base, indices } = &func.expressions[pointer] else {
            panic!("expected Access");
        };
        assert_eq!(Some(*base), calls[1].result);
        assert_eq!(indices.len(), 2);
        // Opaque handles use the call result directly.
        let Statement::Store { pointer, .. } = &body[6] else {
            panic!("expected Store");
        };
        assert_eq!(Some(*pointer), calls[2].result);
    }

    #[test]
    fn buffer_carrier_wraps_runtime_array() {
        let mut m = Module::default();
        let buf = pointer(&mut m, AddressSpace::Constant);
        kernel(&mut m, "k", &[buf]);
        run(&mut m, &mut CompileContext::default()).unwrap();

        let accessor = &m.functions[m.function_by_name("kernbind.resource.0").unwrap()];
        assert!(accessor.pure && accessor.is_declaration());
        let TypeInner::Pointer { base, space } = m.types[accessor.result.unwrap()].inner else {
            panic!("expected pointer result");
        };
        assert_eq!(space, AddressSpace::StorageBuffer);
        assert_eq!(m.types[base].name.as_deref(), Some("kernbind.resource.type.0"));
        let TypeInner::Struct { members } = &m.types[base].inner else {
            panic!("expected struct carrier");
        };
        assert!(matches!(
            m.types[members[0].ty].inner,
            TypeInner::Array { size: ArraySize::Dynamic, .. }
        ));
    }

    #[test]
    fn accessors_shared_by_discriminant() {
        let mut m = Module::default();
        let buf = pointer(&mut m, AddressSpace::Global);
        let i32_ty = m.scalar_type(Scalar::I32);
        let k0 = kernel(&mut m, "k0", &[buf, i32_ty]);
        let k1 = kernel(&mut m, "k1", &[buf, buf]);
        let mut ctx = CompileContext::default();
        run(&mut m, &mut ctx).unwrap();

        let k0_calls: Vec<_> = m.functions[k0].calls().iter().map(|c| c.callee).collect();
        let k1_calls: Vec<_> = m.functions[k1].calls().iter().map(|c| c.callee).collect();
        assert_eq!(k0_calls[0], k1_calls[0]);
        assert_ne!(k0_calls[1], k1_calls[1]);
        assert_ne!(k1_calls[0], k1_calls[1]);

        let report = ctx.allocation.unwrap();
        assert_eq!(report.discriminants.len(), 3);
        let sets: Vec<_> = report.arguments.iter().map(|a| (a.set, a.binding)).collect();
        assert_eq!(sets, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn sets_claimed_only_by_kernels_with_arguments() {
        let mut m = Module::default();
        let buf = pointer(&mut m, AddressSpace::Global);
        kernel(&mut m, "empty", &[]);
        kernel(&mut m, "k", &[buf]);
        let mut decl = Function::declaration("ext", vec![buf], None);
        decl.calling_convention = kernbind_ir::CallingConvention::Kernel;
        m.add_function(decl).unwrap();

        let mut ctx = CompileContext::default();
        run(&mut m, &mut ctx).unwrap();
        assert_eq!(ctx.descriptors.next_set(), 1);
        let report = ctx.allocation.unwrap();
        assert_eq!(report.arguments.len(), 1);
        assert_eq!(report.arguments[0].kernel, "k");
        assert_eq!(report.arguments[0].name.as_deref(), Some("a0"));
    }

    #[test]
    fn local_argument_fails() {
        let mut m = Module::default();
        let local = pointer(&mut m, AddressSpace::Local);
        kernel(&mut m, "k", &[local]);
        let err = run(&mut m, &mut CompileContext::default()).unwrap_err();
        assert!(matches!(err, PassError::LocalArgument { position: 0, .. }));
    }

    #[test]
    fn unhandled_argument_fails() {
        let mut m = Module::default();
        let private = pointer(&mut m, AddressSpace::Private);
        kernel(&mut m, "k", &[private]);
        let err = run(&mut m, &mut CompileContext::default()).unwrap_err();
        assert!(matches!(err, PassError::ArgumentKind { position: 0, .. }));
    }
}
