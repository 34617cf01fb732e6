//! Direct resource access.
//!
//! Proves, per helper parameter, that every caller passes the same bound
//! resource: a resource accessor or literal sampler accessor call with
//! constant set and binding, possibly wrapped in zero-offset accesses. Proven parameters are marked
//! with [`DirectResource`]; with `rewrite_direct_access` the callee is
//! also rewritten to call the accessor itself.
//!
//! Functions are visited in call-graph level order so that a caller's
//! parameters are rewritten before its callees are inspected.

use std::fmt;

use kernbind_analysis::{ArgKind, classify, level_order};
use kernbind_ir::builtins::{LITERAL_SAMPLER_ACCESSOR, is_resource_accessor};
use kernbind_ir::{
    CallingConvention, DirectResource, Expression, Function, Handle, Literal, Module, Statement,
};

use crate::{CompileContext, Pass, PassError, trace_if};

/// Why a parameter was left indirect.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnresolvedReason {
    /// The function is never called.
    NoCallSites,
    /// A call site passes fewer arguments than the parameter position.
    MissingArgument,
    /// A caller forwards one of its own parameters.
    ForwardedParameter,
    /// An access with a non-zero or non-constant index.
    OffsetAccess,
    /// The value does not come from an accessor call.
    NotAccessorCall,
    /// The accessor's set or binding operand is not a constant.
    NonConstantOperand,
    /// Call sites disagree on the resource.
    Disagreement,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoCallSites => "no call sites",
            Self::MissingArgument => "call site is missing the argument",
            Self::ForwardedParameter => "caller forwards a parameter",
            Self::OffsetAccess => "non-zero offset",
            Self::NotAccessorCall => "not an accessor call",
            Self::NonConstantOperand => "non-constant set or binding",
            Self::Disagreement => "call sites disagree",
        })
    }
}

/// Outcome of resolving one parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Resolved(DirectResource),
    Unresolved(UnresolvedReason),
}

/// The verdict recorded for one parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParameterVerdict {
    pub function: Handle<Function>,
    pub argument: u32,
    pub verdict: Verdict,
}

/// What one call site passes for a parameter.
struct Origin {
    resource: DirectResource,
    /// Index count of each unwrapped access, outermost first.
    shape: Vec<usize>,
    operands: Vec<Option<Literal>>,
}

/// Decides whether every call of `function` passes one fixed resource as
/// argument `index`.
pub fn resolve_parameter(module: &Module, function: Handle<Function>, index: u32) -> Verdict {
    match resolve(module, function, index) {
        Ok(origin) => Verdict::Resolved(origin.resource),
        Err(reason) => Verdict::Unresolved(reason),
    }
}

/// Resolves a parameter, keeping the first call site's details for the
/// rewrite. `shape` is cleared when call sites use different shapes.
fn resolve(module: &Module, function: Handle<Function>, index: u32) -> Result<Origin, UnresolvedReason> {
    let mut common: Option<Origin> = None;
    for (caller, site) in module.call_sites_of(function) {
        let Some(&arg) = site.arguments.get(index as usize) else {
            return Err(UnresolvedReason::MissingArgument);
        };
        let origin = trace_origin(module, &module.functions[caller], arg)?;
        match common.as_mut() {
            Some(seen) if seen.resource != origin.resource => {
                return Err(UnresolvedReason::Disagreement);
            }
            Some(seen) => {
                if seen.shape != origin.shape {
                    seen.shape.clear();
                }
            }
            None => common = Some(origin),
        }
    }
    common.ok_or(UnresolvedReason::NoCallSites)
}

/// Follows `value` in `caller` back through zero-offset accesses to a
/// resource accessor call.
fn trace_origin(
    module: &Module,
    caller: &Function,
    mut value: Handle<Expression>,
) -> Result<Origin, UnresolvedReason> {
    let mut shape = Vec::new();
    loop {
        match caller.expressions.try_get(value) {
            Some(Expression::Access { base, indices }) => {
                let zero = indices.iter().all(|&i| {
                    caller
                        .literal_value(i)
                        .is_some_and(|lit| lit.is_zero_index())
                });
                if !zero {
                    return Err(UnresolvedReason::OffsetAccess);
                }
                // Malformed self-referencing accesses would never end.
                if shape.len() > caller.expressions.len() {
                    return Err(UnresolvedReason::NotAccessorCall);
                }
                shape.push(indices.len());
                value = *base;
            }
            Some(Expression::FunctionArgument(_)) => {
                return Err(UnresolvedReason::ForwardedParameter);
            }
            Some(Expression::CallResult(callee)) => {
                let accessor = *callee;
                let is_accessor = module
                    .functions
                    .try_get(accessor)
                    .is_some_and(|f| {
                        is_resource_accessor(&f.name) || f.name == LITERAL_SAMPLER_ACCESSOR
                    });
                if !is_accessor {
                    return Err(UnresolvedReason::NotAccessorCall);
                }
                let call = caller
                    .call_producing(value)
                    .ok_or(UnresolvedReason::NotAccessorCall)?;
                let operands: Vec<_> = call
                    .arguments
                    .iter()
                    .map(|&h| caller.literal_value(h))
                    .collect();
                let constant = |i: usize| {
                    operands
                        .get(i)
                        .copied()
                        .flatten()
                        .and_then(|lit| lit.as_u32())
                        .ok_or(UnresolvedReason::NonConstantOperand)
                };
                let resource = DirectResource {
                    accessor,
                    set: constant(0)?,
                    binding: constant(1)?,
                    depth: shape.len() as u32,
                };
                return Ok(Origin {
                    resource,
                    shape,
                    operands,
                });
            }
            _ => return Err(UnresolvedReason::NotAccessorCall),
        }
    }
}

/// Marks helper parameters that always receive the same bound resource.
///
/// Kernels are skipped: the host is their only caller.
#[derive(Debug, Default)]
pub struct DirectResourceAccess;

impl Pass for DirectResourceAccess {
    fn name(&self) -> &str {
        "direct-resource-access"
    }

    fn run(&self, module: &mut Module, ctx: &mut CompileContext) -> Result<bool, PassError> {
        let show = ctx.options.show_direct_access;
        let mut changed = false;
        for function in level_order(module) {
            if module.functions[function].calling_convention == CallingConvention::Kernel {
                continue;
            }
            let candidates: Vec<_> = module.functions[function]
                .arguments
                .iter()
                .enumerate()
                .filter(|(_, arg)| {
                    classify(arg.ty, &module.types).is_ok_and(ArgKind::is_resource)
                })
                .map(|(i, _)| i as u32)
                .collect();

            for index in candidates {
                let name = module.functions[function].name.clone();
                let verdict = match resolve(module, function, index) {
                    Ok(origin) => {
                        let resource = origin.resource;
                        trace_if!(
                            show,
                            "DRA: {name} arg {index} -> set {} binding {} depth {}",
                            resource.set,
                            resource.binding,
                            resource.depth
                        );
                        let arg = &mut module.functions[function].arguments[index as usize];
                        if arg.direct != Some(resource) {
                            arg.direct = Some(resource);
                            changed = true;
                        }
                        if ctx.options.rewrite_direct_access {
                            changed |= rewrite_parameter(module, function, index, origin);
                        }
                        Verdict::Resolved(resource)
                    }
                    Err(reason) => {
                        trace_if!(show, "DRA: {name} arg {index} unresolved: {reason}");
                        let arg = &mut module.functions[function].arguments[index as usize];
                        if arg.direct.take().is_some() {
                            changed = true;
                        }
                        Verdict::Unresolved(reason)
                    }
                };
                ctx.direct_access.push(ParameterVerdict {
                    function,
                    argument: index,
                    verdict,
                });
            }
        }
        Ok(changed)
    }
}

/// Makes the callee fetch the resource itself: the accessor call is
/// repeated at the top of the body and the parameter's uses are redirected
/// to it. The parameter stays in the signature.
fn rewrite_parameter(
    module: &mut Module,
    function: Handle<Function>,
    index: u32,
    origin: Origin,
) -> bool {
    let func = &mut module.functions[function];
    let Some(operands) = origin.operands.into_iter().collect::<Option<Vec<_>>>() else {
        log::debug!("DRA: {} arg {index} not rewritten: non-constant operand", func.name);
        return false;
    };
    if origin.shape.len() != origin.resource.depth as usize {
        log::debug!("DRA: {} arg {index} not rewritten: access shapes differ", func.name);
        return false;
    }
    if func.body.is_none() {
        return false;
    }

    let accessor = origin.resource.accessor;
    let arguments = operands.into_iter().map(|lit| func.literal(lit)).collect();
    let result = func.expressions.append(Expression::CallResult(accessor));
    let mut value = result;
    for &count in origin.shape.iter().rev() {
        let zero = func.literal(Literal::U32(0));
        value = func.expressions.append(Expression::Access {
            base: value,
            indices: vec![zero; count],
        });
    }

    let uses: Vec<_> = func
        .expressions
        .iter()
        .filter(|(_, e)| matches!(e, Expression::FunctionArgument(i) if *i == index))
        .map(|(h, _)| h)
        .collect();
    for arg in uses {
        func.replace_uses(arg, value);
    }
    if let Some(body) = func.body.as_mut() {
        body.insert(
            0,
            Statement::Call {
                function: accessor,
                arguments,
                result: Some(result),
            },
        );
    }
    true
}
