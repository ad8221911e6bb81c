use serde_json::{json, Map, Value};
use std::borrow::Cow;

use super::ast::{BinOp, Expr, Node, TestKind};
use super::filters;
use super::value::{
    as_number, compare, contains, display, escape_html, is_empty, loose_eq, number_value, truthy,
    Val,
};
use crate::error::{WidgetError, WidgetResult};
use crate::helpers::RenderHelpers;

/// Evaluate a parsed template against `root`.
///
/// Names resolve through `set`/loop scopes first, then the root object. The
/// name `instance` also reaches the whole root unless the root defines it.
pub(crate) fn render_nodes(
    nodes: &[Node],
    root: &Value,
    helpers: &RenderHelpers<'_>,
) -> WidgetResult<String> {
    let mut evaluator = Evaluator {
        root,
        scopes: vec![Map::new()],
        helpers,
    };
    let mut out = String::new();
    evaluator.exec(nodes, &mut out)?;
    Ok(out)
}

struct Evaluator<'a, 'h> {
    root: &'a Value,
    scopes: Vec<Map<String, Value>>,
    helpers: &'a RenderHelpers<'h>,
}

impl Evaluator<'_, '_> {
    fn exec(&mut self, nodes: &[Node], out: &mut String) -> WidgetResult<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Print(expr) => {
                    let val = self.eval(expr)?;
                    let text = display(&val.value);
                    if val.safe {
                        out.push_str(&text);
                    } else {
                        out.push_str(&escape_html(&text));
                    }
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = false;
                    for (condition, body) in branches {
                        if truthy(&self.eval(condition)?.value) {
                            self.exec(body, out)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.exec(otherwise, out)?;
                    }
                }
                Node::For {
                    key,
                    value,
                    iterable,
                    body,
                    otherwise,
                } => {
                    let items = iteration_items(self.eval(iterable)?.value);
                    if items.is_empty() {
                        self.exec(otherwise, out)?;
                        continue;
                    }

                    self.scopes.push(Map::new());
                    let result = self.run_loop(key.as_deref(), value, &items, body, out);
                    self.scopes.pop();
                    result?;
                }
                Node::Set { name, value } => {
                    let value = self.eval(value)?.value;
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert(name.clone(), value);
                    }
                }
            }
        }
        Ok(())
    }

    fn run_loop(
        &mut self,
        key_name: Option<&str>,
        value_name: &str,
        items: &[(Value, Value)],
        body: &[Node],
        out: &mut String,
    ) -> WidgetResult<()> {
        let length = items.len();
        for (index, (key, value)) in items.iter().enumerate() {
            if let Some(scope) = self.scopes.last_mut() {
                if let Some(key_name) = key_name {
                    scope.insert(key_name.to_string(), key.clone());
                }
                scope.insert(value_name.to_string(), value.clone());
                scope.insert(
                    "loop".to_string(),
                    json!({
                        "index": index + 1,
                        "index0": index,
                        "revindex": length - index,
                        "first": index == 0,
                        "last": index + 1 == length,
                        "length": length,
                    }),
                );
            }
            self.exec(body, out)?;
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value);
            }
        }
        if let Some(value) = self.root.get(name) {
            return Some(value);
        }
        (name == "instance").then_some(self.root)
    }

    /// What a name or attribute chain points at, borrowed from the context
    /// when possible. `None` when some step of the path is undefined.
    fn place(&self, expr: &Expr) -> WidgetResult<Option<Cow<'_, Value>>> {
        match expr {
            Expr::Name(name) => Ok(self.lookup(name).map(Cow::Borrowed)),
            Expr::Index(container, key) => {
                let key = self.eval(key)?.value;
                Ok(match self.place(container)? {
                    Some(Cow::Borrowed(container)) => get_item(container, &key).map(Cow::Borrowed),
                    Some(Cow::Owned(container)) => get_item(&container, &key).cloned().map(Cow::Owned),
                    None => None,
                })
            }
            other => Ok(Some(Cow::Owned(self.eval(other)?.value))),
        }
    }

    fn eval(&self, expr: &Expr) -> WidgetResult<Val> {
        Ok(match expr {
            Expr::Literal(value) => Val {
                value: value.clone(),
                safe: value.is_string(),
            },
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?.value);
                }
                Val::plain(Value::Array(values))
            }
            Expr::Name(_) | Expr::Index(..) => Val::plain(
                self.place(expr)?
                    .map(Cow::into_owned)
                    .unwrap_or(Value::Null),
            ),
            Expr::Filter {
                input,
                filter,
                args,
            } => {
                let input = self.eval(input)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?.value);
                }
                filters::apply(*filter, input, &values, self.helpers)?
            }
            Expr::Not(inner) => Val::plain(Value::Bool(!truthy(&self.eval(inner)?.value))),
            Expr::Neg(inner) => {
                let value = self.eval(inner)?.value;
                let n = as_number(&value).ok_or_else(|| {
                    WidgetError::evaluation("cannot negate a non-numeric value")
                })?;
                Val::plain(number_value(-n))
            }
            Expr::Binary(BinOp::And, left, right) => {
                let result = truthy(&self.eval(left)?.value) && truthy(&self.eval(right)?.value);
                Val::plain(Value::Bool(result))
            }
            Expr::Binary(BinOp::Or, left, right) => {
                let result = truthy(&self.eval(left)?.value) || truthy(&self.eval(right)?.value);
                Val::plain(Value::Bool(result))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?.value;
                let right = self.eval(right)?.value;
                Val::plain(binary(*op, &left, &right)?)
            }
            Expr::Test {
                input,
                test,
                negated,
            } => {
                let result = match test {
                    TestKind::Defined => self.is_defined(input)?,
                    TestKind::Empty => is_empty(&self.eval(input)?.value),
                    TestKind::Null => self.eval(input)?.value.is_null(),
                };
                Val::plain(Value::Bool(result != *negated))
            }
        })
    }

    fn is_defined(&self, expr: &Expr) -> WidgetResult<bool> {
        match expr {
            Expr::Name(_) | Expr::Index(..) => Ok(self.place(expr)?.is_some()),
            _ => Ok(true),
        }
    }
}

fn get_item<'v>(container: &'v Value, key: &Value) -> Option<&'v Value> {
    match container {
        Value::Object(map) => map.get(&display(key)),
        Value::Array(items) => {
            let index = match key {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse::<u64>().ok(),
                _ => None,
            }?;
            items.get(usize::try_from(index).ok()?)
        }
        _ => None,
    }
}

fn iteration_items(value: Value) -> Vec<(Value, Value)> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (Value::from(index), item))
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, item)| (Value::String(key), item))
            .collect(),
        Value::Null => Vec::new(),
        other => {
            tracing::debug!(value = %other, "for loop over a non-iterable value");
            Vec::new()
        }
    }
}

fn binary(op: BinOp, left: &Value, right: &Value) -> WidgetResult<Value> {
    use std::cmp::Ordering::{Equal, Greater, Less};

    Ok(match op {
        BinOp::Eq => Value::Bool(loose_eq(left, right)),
        BinOp::Ne => Value::Bool(!loose_eq(left, right)),
        BinOp::Lt => Value::Bool(compare(left, right) == Some(Less)),
        BinOp::Gt => Value::Bool(compare(left, right) == Some(Greater)),
        BinOp::Le => Value::Bool(matches!(compare(left, right), Some(Less | Equal))),
        BinOp::Ge => Value::Bool(matches!(compare(left, right), Some(Greater | Equal))),
        BinOp::In => Value::Bool(contains(right, left)),
        BinOp::NotIn => Value::Bool(!contains(right, left)),
        BinOp::Concat => Value::String(display(left) + &display(right)),
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
            arithmetic(op, left, right)?
        }
        BinOp::And | BinOp::Or => unreachable!("short-circuited in eval"),
    })
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> WidgetResult<Value> {
    let operand = |value: &Value| {
        as_number(value).ok_or_else(|| {
            WidgetError::evaluation(format!(
                "unsupported operand '{}' for arithmetic",
                display(value)
            ))
        })
    };
    let (x, y) = (operand(left)?, operand(right)?);

    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div | BinOp::Rem if y == 0.0 => {
            return Err(WidgetError::evaluation("division by zero"))
        }
        BinOp::Div => x / y,
        _ => x % y,
    };
    Ok(number_value(result))
}
