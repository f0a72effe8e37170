//! Inline function evaluation.
//!
//! `function.exec.code` is opaque source text evaluated against `params`
//! and the current let-bound environment. Rather than embed a full
//! scripting engine, inline bodies are restricted to a small declarative
//! expression language, kept behind the `InlineEvaluator` trait so a host
//! that needs richer semantics can supply its own implementation instead
//! of `DeclarativeEvaluator`.

use composer_core::Json;
use indexmap::IndexMap;

/// A function body evaluator. `code` is the opaque source string carried
/// on a `function` instruction; `params` is the current params value;
/// `env` is every let-bound name currently in scope, collected by
/// scanning the frame stack from the bottom up.
pub trait InlineEvaluator {
    fn evaluate(&self, code: &str, params: &Json, env: &IndexMap<String, Json>) -> Result<EvalOutcome, EvalError>;
}

/// The result of a successful evaluation.
pub struct EvalOutcome {
    /// `None` means the expression evaluated to `undefined` — params are
    /// left unchanged.
    pub value: Option<Json>,
    /// The environment after evaluation; write-backs (e.g. `count--`)
    /// are reflected here for the engine to fold back into the topmost
    /// defining `let` frame.
    pub env: IndexMap<String, Json>,
}

/// A thrown value; the engine turns this into `params = {error: ...}`
/// by wrapping it, not by assuming it's already an object.
#[derive(Debug, Clone)]
pub struct EvalError(pub Json);

impl EvalError {
    fn msg(text: impl Into<String>) -> Self {
        Self(Json::String(text.into()))
    }
}

/// Evaluates the small subset of JS-like expressions needed to express
/// field projection, arithmetic comparison, object construction, and the
/// `count--` idiom `repeat`/`retry` desugar to.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclarativeEvaluator;

impl InlineEvaluator for DeclarativeEvaluator {
    fn evaluate(&self, code: &str, params: &Json, env: &IndexMap<String, Json>) -> Result<EvalOutcome, EvalError> {
        let (binding, body) = split_arrow(code);
        let tokens = lex(body).map_err(EvalError::msg)?;
        let expr = Parser::new(&tokens).parse().map_err(EvalError::msg)?;

        let mut ctx = Context {
            binding,
            params,
            env: env.clone(),
        };
        let result = eval_expr(&expr, &mut ctx).map_err(EvalError::msg)?;

        Ok(EvalOutcome {
            value: result.into_json(),
            env: ctx.env,
        })
    }
}

/// Parses a value off `name => body`, falling back to binding `params`
/// itself when there's no arrow (bare comparisons like `count-- > 0`).
fn split_arrow(code: &str) -> (String, &str) {
    if let Some(idx) = code.find("=>") {
        let name = code[..idx].trim().trim_matches(|c| c == '(' || c == ')').trim();
        (name.to_string(), code[idx + 2..].trim())
    } else {
        ("params".to_string(), code.trim())
    }
}

struct Context<'a> {
    binding: String,
    params: &'a Json,
    env: IndexMap<String, Json>,
}

#[derive(Debug, Clone)]
enum EvalValue {
    Undefined,
    Value(Json),
}

impl EvalValue {
    fn into_json(self) -> Option<Json> {
        match self {
            EvalValue::Undefined => None,
            EvalValue::Value(v) => Some(v),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            EvalValue::Undefined => false,
            EvalValue::Value(v) => is_truthy(v),
        }
    }

    fn as_number(&self) -> Result<f64, String> {
        match self {
            EvalValue::Value(Json::Number(n)) => n.as_f64().ok_or_else(|| "not a finite number".to_string()),
            other => Err(format!("expected a number, got {other:?}")),
        }
    }
}

/// JS-style truthiness for a JSON value.
pub fn is_truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Json::String(s) => !s.is_empty(),
        Json::Array(_) | Json::Object(_) => true,
    }
}

// --- Lexer -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Bang,
    MinusMinus,
    Op(&'static str),
}

fn lex(src: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut out = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '.' => {
                out.push(Tok::Dot);
                i += 1;
            }
            ',' => {
                out.push(Tok::Comma);
                i += 1;
            }
            ':' => {
                out.push(Tok::Colon);
                i += 1;
            }
            '(' => {
                out.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                out.push(Tok::RParen);
                i += 1;
            }
            '{' => {
                out.push(Tok::LBrace);
                i += 1;
            }
            '}' => {
                out.push(Tok::RBrace);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err("unterminated string literal".to_string());
                }
                out.push(Tok::Str(chars[start..i].iter().collect()));
                i += 1;
            }
            '+' => {
                out.push(Tok::Op("+"));
                i += 1;
            }
            '-' => {
                if chars.get(i + 1) == Some(&'-') {
                    out.push(Tok::MinusMinus);
                    i += 2;
                } else {
                    out.push(Tok::Op("-"));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Tok::Op(">="));
                    i += 2;
                } else {
                    out.push(Tok::Op(">"));
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Tok::Op("<="));
                    i += 2;
                } else {
                    out.push(Tok::Op("<"));
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    let len = if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
                    out.push(Tok::Op("=="));
                    i += len;
                } else {
                    return Err("unexpected '=' (assignment is not supported)".to_string());
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    let len = if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
                    out.push(Tok::Op("!="));
                    i += len;
                } else {
                    out.push(Tok::Bang);
                    i += 1;
                }
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                out.push(Tok::Op("&&"));
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                out.push(Tok::Op("||"));
                i += 2;
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                out.push(Tok::Number(text.parse().map_err(|_| format!("bad number literal {text:?}"))?));
            }
            _ if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                out.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character {other:?}")),
        }
    }
    Ok(out)
}

// --- Parser ------------------------------------------------------------

#[derive(Debug, Clone)]
enum Expr {
    Ident(String),
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Member(Box<Expr>, String),
    PostDec(String),
    Not(Box<Expr>),
    Bin(&'static str, Box<Expr>, Box<Expr>),
    Object(Vec<(String, Expr)>),
}

struct Parser<'a> {
    toks: &'a [Tok],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(toks: &'a [Tok]) -> Self {
        Self { toks, pos: 0 }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Tok> {
        let t = self.toks.get(self.pos);
        self.pos += 1;
        t
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), String> {
        if self.peek() == Some(tok) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected {tok:?}, got {:?}", self.peek()))
        }
    }

    fn parse(&mut self) -> Result<Expr, String> {
        let expr = self.parse_or()?;
        if self.pos != self.toks.len() {
            return Err(format!("unexpected trailing tokens at {}", self.pos));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Tok::Op("||"))) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Bin("||", Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), Some(Tok::Op("&&"))) {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Expr::Bin("&&", Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op(op @ ("==" | "!="))) => *op,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op(op @ (">" | "<" | ">=" | "<="))) => *op,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op(op @ ("+" | "-"))) => *op,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if matches!(self.peek(), Some(Tok::Bang)) {
            self.bump();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.bump();
                    let field = match self.bump() {
                        Some(Tok::Ident(name)) => name.clone(),
                        other => return Err(format!("expected field name after '.', got {other:?}")),
                    };
                    expr = Expr::Member(Box::new(expr), field);
                }
                Some(Tok::MinusMinus) => {
                    self.bump();
                    let Expr::Ident(name) = expr else {
                        return Err("'--' may only follow a bare identifier".to_string());
                    };
                    expr = Expr::PostDec(name);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.bump().cloned() {
            Some(Tok::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                "undefined" => Expr::Undefined,
                _ => Expr::Ident(name),
            }),
            Some(Tok::Number(n)) => Ok(Expr::Number(n)),
            Some(Tok::Str(s)) => Ok(Expr::Str(s)),
            Some(Tok::LParen) => {
                let expr = self.parse_or()?;
                self.expect(&Tok::RParen)?;
                Ok(expr)
            }
            Some(Tok::LBrace) => self.parse_object(),
            other => Err(format!("unexpected token {other:?}")),
        }
    }

    fn parse_object(&mut self) -> Result<Expr, String> {
        let mut fields = Vec::new();
        if matches!(self.peek(), Some(Tok::RBrace)) {
            self.bump();
            return Ok(Expr::Object(fields));
        }
        loop {
            let key = match self.bump() {
                Some(Tok::Ident(name)) => name.clone(),
                Some(Tok::Str(name)) => name.clone(),
                other => return Err(format!("expected object key, got {other:?}")),
            };
            self.expect(&Tok::Colon)?;
            let value = self.parse_or()?;
            fields.push((key, value));
            match self.peek() {
                Some(Tok::Comma) => {
                    self.bump();
                }
                Some(Tok::RBrace) => {
                    self.bump();
                    break;
                }
                other => return Err(format!("expected ',' or '}}' in object literal, got {other:?}")),
            }
        }
        Ok(Expr::Object(fields))
    }
}

// --- Evaluator -----------------------------------------------------------

fn eval_expr(expr: &Expr, ctx: &mut Context<'_>) -> Result<EvalValue, String> {
    Ok(match expr {
        Expr::Ident(name) => resolve(name, ctx),
        Expr::Number(n) => EvalValue::Value(serde_json::json!(n)),
        Expr::Str(s) => EvalValue::Value(Json::String(s.clone())),
        Expr::Bool(b) => EvalValue::Value(Json::Bool(*b)),
        Expr::Null => EvalValue::Value(Json::Null),
        Expr::Undefined => EvalValue::Undefined,
        Expr::Member(base, field) => {
            let base = eval_expr(base, ctx)?;
            match base {
                EvalValue::Value(Json::Object(map)) => match map.get(field) {
                    Some(v) => EvalValue::Value(v.clone()),
                    None => EvalValue::Undefined,
                },
                _ => EvalValue::Undefined,
            }
        }
        Expr::PostDec(name) => {
            let current = ctx
                .env
                .get(name)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| format!("{name} is not a numeric variable"))?;
            ctx.env.insert(name.clone(), serde_json::json!(current - 1.0));
            EvalValue::Value(serde_json::json!(current))
        }
        Expr::Not(inner) => {
            let v = eval_expr(inner, ctx)?;
            EvalValue::Value(Json::Bool(!v.is_truthy()))
        }
        Expr::Bin("&&", lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            if !l.is_truthy() { l } else { eval_expr(rhs, ctx)? }
        }
        Expr::Bin("||", lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            if l.is_truthy() { l } else { eval_expr(rhs, ctx)? }
        }
        Expr::Bin(op @ ("==" | "!="), lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            let eq = match (&l, &r) {
                (EvalValue::Undefined, EvalValue::Undefined) => true,
                (EvalValue::Undefined, _) | (_, EvalValue::Undefined) => false,
                (EvalValue::Value(a), EvalValue::Value(b)) => a == b,
            };
            EvalValue::Value(Json::Bool(if *op == "==" { eq } else { !eq }))
        }
        Expr::Bin(op @ ("+" | "-"), lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?.as_number()?;
            let r = eval_expr(rhs, ctx)?.as_number()?;
            let result = if *op == "+" { l + r } else { l - r };
            EvalValue::Value(serde_json::json!(result))
        }
        Expr::Bin(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?.as_number()?;
            let r = eval_expr(rhs, ctx)?.as_number()?;
            let result = match *op {
                ">" => l > r,
                "<" => l < r,
                ">=" => l >= r,
                "<=" => l <= r,
                other => return Err(format!("unsupported operator {other:?}")),
            };
            EvalValue::Value(Json::Bool(result))
        }
        Expr::Object(fields) => {
            let mut map = serde_json::Map::new();
            for (key, value_expr) in fields {
                let value = eval_expr(value_expr, ctx)?.into_json().unwrap_or(Json::Null);
                map.insert(key.clone(), value);
            }
            EvalValue::Value(Json::Object(map))
        }
    })
}

fn resolve(name: &str, ctx: &Context<'_>) -> EvalValue {
    if name == ctx.binding {
        return EvalValue::Value(ctx.params.clone());
    }
    if name == "params" {
        return EvalValue::Value(ctx.params.clone());
    }
    match ctx.env.get(name) {
        Some(v) => EvalValue::Value(v.clone()),
        None => EvalValue::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, Json)]) -> IndexMap<String, Json> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn projects_and_adds_one() {
        let evaluator = DeclarativeEvaluator;
        let params = serde_json::json!({"value": 3});
        let out = evaluator
            .evaluate("x => ({value: x.value+1})", &params, &IndexMap::new())
            .unwrap();
        assert_eq!(out.value, Some(serde_json::json!({"value": 4.0})));
    }

    #[test]
    fn tests_truthiness_of_projected_field() {
        let evaluator = DeclarativeEvaluator;
        let out = evaluator
            .evaluate("p => ({value: p.n>0})", &serde_json::json!({"n": 5}), &IndexMap::new())
            .unwrap();
        assert_eq!(out.value, Some(serde_json::json!({"value": true})));
    }

    #[test]
    fn builds_error_object() {
        let evaluator = DeclarativeEvaluator;
        let out = evaluator
            .evaluate("p => ({error:'x'})", &serde_json::json!({}), &IndexMap::new())
            .unwrap();
        assert_eq!(out.value, Some(serde_json::json!({"error": "x"})));
    }

    #[test]
    fn decrements_and_compares() {
        let evaluator = DeclarativeEvaluator;
        let e = env(&[("count", serde_json::json!(2))]);
        let out = evaluator.evaluate("count-- > 0", &Json::Null, &e).unwrap();
        assert_eq!(out.value, Some(serde_json::json!(true)));
        assert_eq!(out.env.get("count"), Some(&serde_json::json!(1.0)));
    }

    #[test]
    fn short_circuits_before_decrementing() {
        let evaluator = DeclarativeEvaluator;
        let e = env(&[("count", serde_json::json!(0))]);
        let params = serde_json::json!({"result": {"value": 1}});
        let out = evaluator
            .evaluate("params.result.error !== undefined && count-- > 0", &params, &e)
            .unwrap();
        assert_eq!(out.value, Some(serde_json::json!(false)));
        // left side was false, so count-- never ran
        assert_eq!(out.env.get("count"), Some(&serde_json::json!(0)));
    }

    #[test]
    fn evaluates_loop_condition_when_error_present() {
        let evaluator = DeclarativeEvaluator;
        let e = env(&[("count", serde_json::json!(2))]);
        let params = serde_json::json!({"result": {"error": "no"}});
        let out = evaluator
            .evaluate("params.result.error !== undefined && count-- > 0", &params, &e)
            .unwrap();
        assert_eq!(out.value, Some(serde_json::json!(true)));
        assert_eq!(out.env.get("count"), Some(&serde_json::json!(1.0)));
    }

    #[test]
    fn identity_function_returns_params_unchanged() {
        let evaluator = DeclarativeEvaluator;
        let params = serde_json::json!({"error": "x"});
        let out = evaluator.evaluate("p => p", &params, &IndexMap::new()).unwrap();
        assert_eq!(out.value, Some(params));
    }
}
