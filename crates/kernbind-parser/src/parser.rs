//! Recursive-descent parser: tokens → `kernbind_ir::Module`.

use std::collections::HashMap;

use kernbind_ir::{
    AddressSpace, ArraySize, BinaryOp, Block, CallingConvention, DirectResource, Expression,
    Function, FunctionArgument, Handle, ImageAccess, Literal, Module, Scalar, Statement,
    StructMember, Type, TypeInner, VectorSize,
};

use crate::ParseError;
use crate::lexer::{Spanned, Token, tokenize};

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Line of the next token, or of the last one at end of input.
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map_or(1, |s| s.line)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: &str) -> ParseError {
        ParseError::Expected {
            line: self.line(),
            expected: expected.to_string(),
            found: self
                .peek()
                .map_or_else(|| "end of input".to_string(), |t| t.to_string()),
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.error(&format!("'{c}'")))
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn word(&mut self, expected: &str) -> Result<&'a str, ParseError> {
        match self.peek() {
            Some(Token::Word(w)) => {
                self.pos += 1;
                Ok(w.as_str())
            }
            _ => Err(self.error(expected)),
        }
    }

    fn local(&mut self) -> Result<&'a str, ParseError> {
        match self.peek() {
            Some(Token::Local(name)) => {
                self.pos += 1;
                Ok(name.as_str())
            }
            _ => Err(self.error("'%name'")),
        }
    }

    fn global(&mut self) -> Result<&'a str, ParseError> {
        match self.peek() {
            Some(Token::Global(name)) => {
                self.pos += 1;
                Ok(name.as_str())
            }
            _ => Err(self.error("'@name'")),
        }
    }

    fn integer(&mut self) -> Result<u32, ParseError> {
        let line = self.line();
        let value = match self.peek() {
            Some(Token::Int(v)) => u32::try_from(*v).ok(),
            Some(Token::Uint(v)) => u32::try_from(*v).ok(),
            _ => return Err(self.error("integer")),
        };
        self.pos += 1;
        value.ok_or_else(|| ParseError::InvalidNumber {
            line,
            text: self.tokens[self.pos - 1].token.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

struct PendingDirect {
    function: Handle<Function>,
    argument: usize,
    accessor: String,
    set: u32,
    binding: u32,
    depth: u32,
    line: usize,
}

pub(crate) fn parse_module(source: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(source)?;
    let mut cursor = Cursor {
        tokens: &tokens,
        pos: 0,
    };
    let mut module = Module::default();
    let mut bodies = Vec::new();
    let mut directs = Vec::new();

    // Headers first; bodies are skipped and parsed once every name is known.
    while !cursor.at_end() {
        let line = cursor.line();
        let (handle, has_body) = header(&mut cursor, &mut module, &mut directs)?;
        if has_body {
            bodies.push((handle, cursor.pos));
            skip_body(&mut cursor, line)?;
        }
    }

    for pending in directs {
        let accessor =
            module
                .function_by_name(&pending.accessor)
                .ok_or(ParseError::UnknownFunction {
                    line: pending.line,
                    name: pending.accessor,
                })?;
        module.functions[pending.function].arguments[pending.argument].direct =
            Some(DirectResource {
                accessor,
                set: pending.set,
                binding: pending.binding,
                depth: pending.depth,
            });
    }

    let functions: HashMap<String, Handle<Function>> = module
        .functions
        .iter()
        .map(|(h, f)| (f.name.clone(), h))
        .collect();
    for (handle, start) in bodies {
        let mut body = BodyParser {
            cursor: Cursor {
                tokens: &tokens,
                pos: start,
            },
            func: &mut module.functions[handle],
            functions: &functions,
            values: HashMap::new(),
            arguments: HashMap::new(),
        };
        body.cursor.expect_punct('{')?;
        let block = body.block()?;
        body.func.body = Some(block);
    }
    Ok(module)
}

/// Parses one function header and adds the function to `module`.
fn header(
    cursor: &mut Cursor<'_>,
    module: &mut Module,
    directs: &mut Vec<PendingDirect>,
) -> Result<(Handle<Function>, bool), ParseError> {
    let (declaration, convention) = match cursor.word("'declare', 'kernel' or 'fn'")? {
        "declare" if cursor.eat_word("kernel") => (true, CallingConvention::Kernel),
        "declare" => (true, CallingConvention::Ordinary),
        "kernel" => (false, CallingConvention::Kernel),
        "fn" => (false, CallingConvention::Ordinary),
        _ => {
            cursor.pos -= 1;
            return Err(cursor.error("'declare', 'kernel' or 'fn'"));
        }
    };
    let line = cursor.line();
    let name = cursor.global()?.to_string();

    let mut func = Function::new(name.clone());
    func.calling_convention = convention;
    if declaration {
        func.body = None;
    }

    let mut pending = Vec::new();
    cursor.expect_punct('(')?;
    if !cursor.eat_punct(')') {
        loop {
            let arg_name = match cursor.peek() {
                Some(Token::Local(_)) => {
                    let arg_name = cursor.local()?.to_string();
                    cursor.expect_punct(':')?;
                    Some(arg_name)
                }
                _ if declaration => None,
                _ => return Err(cursor.error("'%name'")),
            };
            let ty = parse_type(cursor, module)?;
            if cursor.eat_word("direct") {
                let direct_line = cursor.line();
                cursor.expect_punct('(')?;
                let accessor = cursor.global()?.to_string();
                cursor.expect_punct(',')?;
                let set = cursor.integer()?;
                cursor.expect_punct(',')?;
                let binding = cursor.integer()?;
                cursor.expect_punct(',')?;
                let depth = cursor.integer()?;
                cursor.expect_punct(')')?;
                pending.push((func.arguments.len(), accessor, set, binding, depth, direct_line));
            }
            func.arguments.push(FunctionArgument::new(arg_name, ty));
            if cursor.eat_punct(')') {
                break;
            }
            cursor.expect_punct(',')?;
        }
    }
    if matches!(cursor.peek(), Some(Token::Arrow)) {
        cursor.pos += 1;
        func.result = Some(parse_type(cursor, module)?);
    }
    func.pure = cursor.eat_word("pure");

    let handle = module
        .add_function(func)
        .map_err(|_| ParseError::DuplicateFunction { line, name })?;
    directs.extend(pending.into_iter().map(
        |(argument, accessor, set, binding, depth, line)| PendingDirect {
            function: handle,
            argument,
            accessor,
            set,
            binding,
            depth,
            line,
        },
    ));
    Ok((handle, !declaration))
}

/// Steps over a brace-delimited body.
fn skip_body(cursor: &mut Cursor<'_>, line: usize) -> Result<(), ParseError> {
    cursor.expect_punct('{')?;
    let mut depth = 1;
    while depth > 0 {
        match cursor.next() {
            Some(Token::Punct('{')) => depth += 1,
            Some(Token::Punct('}')) => depth -= 1,
            Some(_) => {}
            None => {
                return Err(ParseError::Expected {
                    line,
                    expected: "'}' closing the function body".into(),
                    found: "end of input".into(),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn scalar(word: &str) -> Option<Scalar> {
    Some(match word {
        "bool" => Scalar::BOOL,
        "i32" => Scalar::I32,
        "u32" => Scalar::U32,
        "f32" => Scalar::F32,
        _ => return None,
    })
}

fn parse_type(cursor: &mut Cursor<'_>, module: &mut Module) -> Result<Handle<Type>, ParseError> {
    let word = cursor.word("type")?;
    if let Some(s) = scalar(word) {
        return Ok(module.scalar_type(s));
    }
    let inner = match word {
        "vec" => {
            cursor.expect_punct('<')?;
            let line = cursor.line();
            let count = cursor.integer()?;
            let size = VectorSize::from_count(count).ok_or(ParseError::InvalidNumber {
                line,
                text: count.to_string(),
            })?;
            cursor.expect_punct(',')?;
            let scalar = scalar(cursor.word("scalar type")?).ok_or_else(|| {
                cursor.pos -= 1;
                cursor.error("scalar type")
            })?;
            cursor.expect_punct('>')?;
            TypeInner::Vector { size, scalar }
        }
        "array" => {
            cursor.expect_punct('<')?;
            let base = parse_type(cursor, module)?;
            let size = if cursor.eat_punct(',') {
                ArraySize::Constant(cursor.integer()?)
            } else {
                ArraySize::Dynamic
            };
            cursor.expect_punct('>')?;
            TypeInner::Array { base, size }
        }
        "ptr" => {
            cursor.expect_punct('<')?;
            let space = match cursor.word("address space")? {
                "function" => AddressSpace::Function,
                "private" => AddressSpace::Private,
                "global" => AddressSpace::Global,
                "constant" => AddressSpace::Constant,
                "local" => AddressSpace::Local,
                "storage_buffer" => AddressSpace::StorageBuffer,
                _ => {
                    cursor.pos -= 1;
                    return Err(cursor.error("address space"));
                }
            };
            cursor.expect_punct(',')?;
            let base = parse_type(cursor, module)?;
            cursor.expect_punct('>')?;
            TypeInner::Pointer { base, space }
        }
        "struct" => {
            let name = match cursor.peek() {
                Some(Token::Local(_)) => Some(cursor.local()?.to_string()),
                _ => None,
            };
            cursor.expect_punct('{')?;
            let mut members = Vec::new();
            if !cursor.eat_punct('}') {
                loop {
                    let ty = parse_type(cursor, module)?;
                    members.push(StructMember { name: None, ty });
                    if cursor.eat_punct('}') {
                        break;
                    }
                    cursor.expect_punct(',')?;
                }
            }
            return Ok(module.types.insert(Type {
                name,
                inner: TypeInner::Struct { members },
            }));
        }
        "sampler" => TypeInner::Sampler,
        "image" => {
            cursor.expect_punct('<')?;
            let access = match cursor.word("'read' or 'write'")? {
                "read" => ImageAccess::ReadOnly,
                "write" => ImageAccess::WriteOnly,
                _ => {
                    cursor.pos -= 1;
                    return Err(cursor.error("'read' or 'write'"));
                }
            };
            cursor.expect_punct('>')?;
            TypeInner::Image { access }
        }
        _ => {
            cursor.pos -= 1;
            return Err(cursor.error("type"));
        }
    };
    Ok(module.anonymous_type(inner))
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

struct BodyParser<'a> {
    cursor: Cursor<'a>,
    func: &'a mut Function,
    functions: &'a HashMap<String, Handle<Function>>,
    /// `%name` → defining expression.
    values: HashMap<String, Handle<Expression>>,
    /// Argument index → its `FunctionArgument` expression.
    arguments: HashMap<u32, Handle<Expression>>,
}

impl BodyParser<'_> {
    /// Parses statements up to and including the closing `}`.
    fn block(&mut self) -> Result<Block, ParseError> {
        let mut block = Vec::new();
        while !self.cursor.eat_punct('}') {
            if self.cursor.at_end() {
                return Err(self.cursor.error("'}'"));
            }
            if let Some(stmt) = self.statement()? {
                block.push(stmt);
            }
        }
        Ok(block)
    }

    /// Parses one line. Pure definitions yield no statement.
    fn statement(&mut self) -> Result<Option<Statement>, ParseError> {
        let line = self.cursor.line();
        let stmt = match self.cursor.peek() {
            Some(Token::Local(_)) => {
                let name = self.cursor.local()?;
                self.cursor.expect_punct('=')?;
                return self.definition(name, line);
            }
            Some(Token::Word(w)) => match w.as_str() {
                "call" => {
                    self.cursor.pos += 1;
                    self.call(None, line)?
                }
                "store" => {
                    self.cursor.pos += 1;
                    let pointer = self.operand()?;
                    self.cursor.expect_punct(',')?;
                    let value = self.operand()?;
                    Statement::Store { pointer, value }
                }
                "return" => {
                    self.cursor.pos += 1;
                    let same_line = self
                        .cursor
                        .tokens
                        .get(self.cursor.pos)
                        .is_some_and(|s| s.line == line && s.token != Token::Punct('}'));
                    let value = if same_line {
                        Some(self.operand()?)
                    } else {
                        None
                    };
                    Statement::Return { value }
                }
                "if" => {
                    self.cursor.pos += 1;
                    let condition = self.operand()?;
                    self.cursor.expect_punct('{')?;
                    let accept = self.block()?;
                    let reject = if self.cursor.eat_word("else") {
                        self.cursor.expect_punct('{')?;
                        self.block()?
                    } else {
                        Vec::new()
                    };
                    Statement::If {
                        condition,
                        accept,
                        reject,
                    }
                }
                "loop" => {
                    self.cursor.pos += 1;
                    self.cursor.expect_punct('{')?;
                    Statement::Loop {
                        body: self.block()?,
                    }
                }
                "break" => {
                    self.cursor.pos += 1;
                    Statement::Break
                }
                _ => return Err(self.cursor.error("statement")),
            },
            _ => return Err(self.cursor.error("statement")),
        };
        Ok(Some(stmt))
    }

    fn definition(&mut self, name: &str, line: usize) -> Result<Option<Statement>, ParseError> {
        if self.values.contains_key(name) {
            return Err(ParseError::Redefinition {
                line,
                name: name.to_string(),
            });
        }
        let op = self.cursor.word("'access', 'load', 'add', 'sub', 'mul' or 'call'")?;
        let expr = match op {
            "call" => return self.call(Some(name), line).map(Some),
            "access" => {
                let base = self.operand()?;
                let mut indices = Vec::new();
                while self.cursor.eat_punct(',') {
                    indices.push(self.operand()?);
                }
                Expression::Access { base, indices }
            }
            "load" => Expression::Load {
                pointer: self.operand()?,
            },
            "add" | "sub" | "mul" => {
                let op = match op {
                    "add" => BinaryOp::Add,
                    "sub" => BinaryOp::Subtract,
                    _ => BinaryOp::Multiply,
                };
                let left = self.operand()?;
                self.cursor.expect_punct(',')?;
                let right = self.operand()?;
                Expression::Binary { op, left, right }
            }
            _ => {
                self.cursor.pos -= 1;
                return Err(self.cursor.error("'access', 'load', 'add', 'sub', 'mul' or 'call'"));
            }
        };
        let handle = self.func.expressions.append(expr);
        self.define(name, handle);
        Ok(None)
    }

    fn define(&mut self, name: &str, handle: Handle<Expression>) {
        self.values.insert(name.to_string(), handle);
        self.func.named_expressions.insert(handle, name.to_string());
    }

    /// `@f(<op>, ...)`, after the `call` keyword.
    fn call(&mut self, result: Option<&str>, line: usize) -> Result<Statement, ParseError> {
        let callee = self.cursor.global()?;
        let function = *self
            .functions
            .get(callee)
            .ok_or_else(|| ParseError::UnknownFunction {
                line,
                name: callee.to_string(),
            })?;
        self.cursor.expect_punct('(')?;
        let mut arguments = Vec::new();
        if !self.cursor.eat_punct(')') {
            loop {
                arguments.push(self.operand()?);
                if self.cursor.eat_punct(')') {
                    break;
                }
                self.cursor.expect_punct(',')?;
            }
        }
        let result = result.map(|name| {
            let handle = self.func.expressions.append(Expression::CallResult(function));
            self.define(name, handle);
            handle
        });
        Ok(Statement::Call {
            function,
            arguments,
            result,
        })
    }

    fn operand(&mut self) -> Result<Handle<Expression>, ParseError> {
        let line = self.cursor.line();
        let literal = match self.cursor.next() {
            Some(Token::Local(name)) => return self.value(name, line),
            Some(Token::Int(v)) => i32::try_from(*v).map(Literal::I32).ok(),
            Some(Token::Uint(v)) => u32::try_from(*v).map(Literal::U32).ok(),
            Some(Token::Float(v)) => Some(Literal::F32(*v)),
            Some(Token::Word(w)) if w == "true" => Some(Literal::Bool(true)),
            Some(Token::Word(w)) if w == "false" => Some(Literal::Bool(false)),
            other => {
                if other.is_some() {
                    self.cursor.pos -= 1;
                }
                return Err(self.cursor.error("operand"));
            }
        };
        let literal = literal.ok_or_else(|| ParseError::InvalidNumber {
            line,
            text: self.cursor.tokens[self.cursor.pos - 1].token.to_string(),
        })?;
        Ok(self.func.literal(literal))
    }

    fn value(&mut self, name: &str, line: usize) -> Result<Handle<Expression>, ParseError> {
        if let Some(&handle) = self.values.get(name) {
            return Ok(handle);
        }
        let index = self
            .func
            .arguments
            .iter()
            .position(|a| a.name.as_deref() == Some(name))
            .ok_or_else(|| ParseError::UndefinedValue {
                line,
                name: name.to_string(),
            })? as u32;
        let func = &mut *self.func;
        Ok(*self
            .arguments
            .entry(index)
            .or_insert_with(|| func.argument_expression(index)))
    }
}
