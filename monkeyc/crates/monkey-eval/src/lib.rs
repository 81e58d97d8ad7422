//! monkey-eval - Tree-walking evaluator.
//!
//! A recursive interpreter over the AST with an explicit environment
//! argument. Two conventions shape every function here:
//!
//! - `return` unwinds through [`Object::ReturnValue`] wrappers, never
//!   through host control flow. Blocks pass the wrapper up untouched; the
//!   call boundary (and the top level) unwraps exactly one layer.
//! - Runtime errors are [`Object::Error`] values. Any sub-expression that
//!   evaluates to an error aborts the enclosing evaluation and propagates
//!   the error object unchanged.
//!
//! Statements may produce no value at all (a `let` has nothing to show),
//! which is distinct from producing `null`; hence the `Option<Object>`
//! returns at statement level. Expressions always produce an object.

use std::rc::Rc;

use indexmap::IndexMap;

use monkey_object::{builtins, Env, Environment, Function, HashPair, Object};
use monkey_par::ast::{
    BlockStatement, Expression, HashLiteral, IfExpression, Program, Statement,
};

/// Evaluates a program. Returns `None` when the program produced no value
/// (empty input, or a trailing statement like `let`).
pub fn eval_program(program: &Program, env: &Env) -> Option<Object> {
    let mut result = None;

    for statement in &program.statements {
        match eval_statement(statement, env) {
            // Unwrap the return at the top level so it never escapes.
            Some(Object::ReturnValue(value)) => return Some(value.as_ref().clone()),
            Some(error @ Object::Error(_)) => return Some(error),
            other => result = other,
        }
    }

    result
}

fn eval_statement(statement: &Statement, env: &Env) -> Option<Object> {
    match statement {
        Statement::Expression(s) => Some(eval_expression(&s.expression, env)),
        Statement::Let(s) => {
            let value = eval_expression(&s.value, env);
            if value.is_error() {
                return Some(value);
            }
            env.borrow_mut().set(s.name.value.clone(), value);
            None
        }
        Statement::Return(s) => {
            let value = eval_expression(&s.return_value, env);
            if value.is_error() {
                return Some(value);
            }
            Some(Object::ReturnValue(Rc::new(value)))
        }
        Statement::Block(s) => eval_block_statement(s, env),
    }
}

fn eval_block_statement(block: &BlockStatement, env: &Env) -> Option<Object> {
    let mut result = None;

    for statement in &block.statements {
        let evaluated = eval_statement(statement, env);
        // ReturnValue stays wrapped here; the caller unwraps it.
        if matches!(
            evaluated,
            Some(Object::ReturnValue(_)) | Some(Object::Error(_))
        ) {
            return evaluated;
        }
        result = evaluated;
    }

    result
}

fn eval_expression(expression: &Expression, env: &Env) -> Object {
    match expression {
        Expression::IntegerLiteral(e) => Object::Integer(e.value),
        Expression::BooleanLiteral(e) => Object::Boolean(e.value),
        Expression::StringLiteral(e) => Object::from(e.value.as_str()),
        Expression::Identifier(e) => eval_identifier(&e.value, env),
        Expression::Prefix(e) => {
            let right = eval_expression(&e.right, env);
            if right.is_error() {
                return right;
            }
            eval_prefix_expression(&e.operator, right)
        }
        Expression::Infix(e) => {
            let left = eval_expression(&e.left, env);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(&e.right, env);
            if right.is_error() {
                return right;
            }
            eval_infix_expression(&e.operator, left, right)
        }
        Expression::If(e) => eval_if_expression(e, env),
        Expression::Function(e) => Object::Function(Rc::new(Function {
            parameters: e.parameters.clone(),
            body: e.body.clone(),
            env: env.clone(),
        })),
        Expression::Call(e) => {
            let function = eval_expression(&e.function, env);
            if function.is_error() {
                return function;
            }
            let arguments = match eval_expressions(&e.arguments, env) {
                Ok(arguments) => arguments,
                Err(error) => return error,
            };
            apply_function(function, arguments)
        }
        Expression::Array(e) => match eval_expressions(&e.elements, env) {
            Ok(elements) => Object::Array(Rc::new(elements)),
            Err(error) => error,
        },
        Expression::Hash(e) => eval_hash_literal(e, env),
        Expression::Index(e) => {
            let left = eval_expression(&e.left, env);
            if left.is_error() {
                return left;
            }
            let index = eval_expression(&e.index, env);
            if index.is_error() {
                return index;
            }
            eval_index_expression(left, index)
        }
    }
}

fn eval_identifier(name: &str, env: &Env) -> Object {
    if let Some(value) = env.borrow().get(name) {
        return value;
    }
    if let Some(builtin) = builtins::lookup(name) {
        return Object::Builtin(builtin);
    }
    new_error(format!("identifier not found: {}", name))
}

fn eval_prefix_expression(operator: &str, right: Object) -> Object {
    match operator {
        "!" => Object::Boolean(!right.is_truthy()),
        "-" => match right {
            Object::Integer(value) => Object::Integer(-value),
            other => new_error(format!("unknown operator: -{}", other.type_name())),
        },
        _ => new_error(format!(
            "unknown operator: {}{}",
            operator,
            right.type_name()
        )),
    }
}

fn eval_infix_expression(operator: &str, left: Object, right: Object) -> Object {
    match (&left, &right) {
        (Object::Integer(l), Object::Integer(r)) => {
            eval_integer_infix_expression(operator, *l, *r)
        }
        (Object::Str(l), Object::Str(r)) => {
            if operator == "+" {
                Object::from(format!("{}{}", l, r))
            } else {
                new_error(format!(
                    "unknown operator: {} {} {}",
                    left.type_name(),
                    operator,
                    right.type_name()
                ))
            }
        }
        _ if left.type_name() != right.type_name() => new_error(format!(
            "type mismatch: {} {} {}",
            left.type_name(),
            operator,
            right.type_name()
        )),
        _ => match operator {
            "==" => Object::Boolean(left == right),
            "!=" => Object::Boolean(left != right),
            _ => new_error(format!(
                "unknown operator: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
        },
    }
}

fn eval_integer_infix_expression(operator: &str, left: i64, right: i64) -> Object {
    match operator {
        "+" => Object::Integer(left + right),
        "-" => Object::Integer(left - right),
        "*" => Object::Integer(left * right),
        "/" => {
            if right == 0 {
                new_error("division by zero".to_string())
            } else {
                Object::Integer(left / right)
            }
        }
        "<" => Object::Boolean(left < right),
        ">" => Object::Boolean(left > right),
        "==" => Object::Boolean(left == right),
        "!=" => Object::Boolean(left != right),
        _ => new_error(format!("unknown operator: INTEGER {} INTEGER", operator)),
    }
}

fn eval_if_expression(expression: &IfExpression, env: &Env) -> Object {
    let condition = eval_expression(&expression.condition, env);
    if condition.is_error() {
        return condition;
    }

    let branch = if condition.is_truthy() {
        Some(&expression.consequence)
    } else {
        expression.alternative.as_ref()
    };

    match branch {
        Some(block) => eval_block_statement(block, env).unwrap_or(Object::Null),
        None => Object::Null,
    }
}

/// Evaluates expressions left to right, aborting on the first error.
fn eval_expressions(expressions: &[Expression], env: &Env) -> Result<Vec<Object>, Object> {
    let mut results = Vec::with_capacity(expressions.len());

    for expression in expressions {
        let evaluated = eval_expression(expression, env);
        if evaluated.is_error() {
            return Err(evaluated);
        }
        results.push(evaluated);
    }

    Ok(results)
}

fn apply_function(function: Object, arguments: Vec<Object>) -> Object {
    match function {
        Object::Function(function) => {
            if arguments.len() != function.parameters.len() {
                return new_error(format!(
                    "wrong number of arguments: want={}, got={}",
                    function.parameters.len(),
                    arguments.len()
                ));
            }

            let env = extend_function_env(&function, arguments);
            let evaluated = eval_block_statement(&function.body, &env);
            unwrap_return_value(evaluated)
        }
        Object::Builtin(builtin) => (builtin.func)(&arguments),
        other => new_error(format!("not a function: {}", other.type_name())),
    }
}

fn extend_function_env(function: &Function, arguments: Vec<Object>) -> Env {
    let env = Environment::new_enclosed(function.env.clone());
    for (parameter, argument) in function.parameters.iter().zip(arguments) {
        env.borrow_mut().set(parameter.value.clone(), argument);
    }
    env
}

fn unwrap_return_value(evaluated: Option<Object>) -> Object {
    match evaluated {
        Some(Object::ReturnValue(value)) => value.as_ref().clone(),
        Some(other) => other,
        None => Object::Null,
    }
}

fn eval_hash_literal(hash: &HashLiteral, env: &Env) -> Object {
    let mut pairs = IndexMap::new();

    for (key_expression, value_expression) in &hash.pairs {
        let key = eval_expression(key_expression, env);
        if key.is_error() {
            return key;
        }

        let Some(hash_key) = key.hash_key() else {
            return new_error(format!("unusable as hash key: {}", key.type_name()));
        };

        let value = eval_expression(value_expression, env);
        if value.is_error() {
            return value;
        }

        pairs.insert(hash_key, HashPair { key, value });
    }

    Object::Hash(Rc::new(pairs))
}

fn eval_index_expression(left: Object, index: Object) -> Object {
    match (&left, &index) {
        (Object::Array(elements), Object::Integer(i)) => {
            let max = elements.len() as i64;
            if *i < 0 || *i >= max {
                Object::Null
            } else {
                elements[*i as usize].clone()
            }
        }
        (Object::Hash(pairs), _) => match index.hash_key() {
            Some(key) => pairs
                .get(&key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Object::Null),
            None => new_error(format!("unusable as hash key: {}", index.type_name())),
        },
        _ => new_error(format!(
            "index operator not supported: {}",
            left.type_name()
        )),
    }
}

fn new_error(message: String) -> Object {
    Object::Error(message)
}
