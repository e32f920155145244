//! XML-RPC codec
//!
//! Converts between `serde_json::Value` and XML-RPC documents. Covers the
//! value types the Odoo endpoints exchange: int/i4/i8, boolean, string,
//! double, nil, array and struct. `dateTime.iso8601` and `base64` values
//! are decoded as plain strings.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Number, Value};

use super::RpcError;

// == Encoding ==

/// Builds a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from(r#"<?xml version="1.0"?><methodCall><methodName>"#);
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Builds a successful `methodResponse` document.
pub fn encode_response(value: &Value) -> String {
    let mut out = String::from(r#"<?xml version="1.0"?><methodResponse><params><param>"#);
    encode_value(value, &mut out);
    out.push_str("</param></params></methodResponse>");
    out
}

/// Builds a fault `methodResponse` document.
pub fn encode_fault(code: i64, message: &str) -> String {
    let fault = serde_json::json!({ "faultCode": code, "faultString": message });
    let mut out = String::from(r#"<?xml version="1.0"?><methodResponse><fault>"#);
    encode_value(&fault, &mut out);
    out.push_str("</fault></methodResponse>");
    out
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Null => out.push_str("<nil/>"),
        Value::Bool(b) => {
            out.push_str("<boolean>");
            out.push(if *b { '1' } else { '0' });
            out.push_str("</boolean>");
        }
        Value::Number(n) => encode_number(n, out),
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Object(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn encode_number(n: &Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        let tag = if i32::try_from(i).is_ok() { "int" } else { "i8" };
        out.push_str(&format!("<{tag}>{i}</{tag}>"));
    } else if let Some(u) = n.as_u64() {
        // only reached above i64::MAX
        out.push_str(&format!("<double>{}</double>", u as f64));
    } else {
        out.push_str(&format!("<double>{}</double>", n.as_f64().unwrap_or(0.0)));
    }
}

// == Decoding ==

/// Minimal element tree; XML-RPC documents are small.
#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn named(name: &[u8]) -> Self {
        Node {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Default::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn require(&self, name: &str) -> Result<&Node, RpcError> {
        self.child(name)
            .ok_or_else(|| protocol(format!("<{}> without <{}>", self.name, name)))
    }
}

fn protocol(msg: impl Into<String>) -> RpcError {
    RpcError::Protocol(msg.into())
}

fn parse_tree(xml: &str) -> Result<Node, RpcError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Node::default()];

    loop {
        match reader.read_event().map_err(|e| protocol(e.to_string()))? {
            Event::Start(e) => stack.push(Node::named(e.name().as_ref())),
            Event::Empty(e) => {
                let node = Node::named(e.name().as_ref());
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| protocol("unbalanced document"))?;
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| protocol("unbalanced document"))?;
                parent.children.push(node);
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| protocol(e.to_string()))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(protocol("unterminated element")),
    }
}

fn decode_value(node: &Node) -> Result<Value, RpcError> {
    let Some(typed) = node.children.first() else {
        // untyped <value>text</value> is a string
        return Ok(Value::String(node.text.clone()));
    };
    let text = typed.text.trim();

    match typed.name.as_str() {
        "int" | "i4" | "i8" => text
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| protocol(format!("invalid integer '{}'", text))),
        "boolean" => match text {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            other => Err(protocol(format!("invalid boolean '{}'", other))),
        },
        "double" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| protocol(format!("invalid double '{}'", text))),
        "string" => Ok(Value::String(typed.text.clone())),
        "dateTime.iso8601" | "base64" => Ok(Value::String(text.to_string())),
        "nil" => Ok(Value::Null),
        "array" => typed
            .require("data")?
            .children
            .iter()
            .filter(|c| c.name == "value")
            .map(decode_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "struct" => {
            let mut map = Map::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member.require("name")?.text.clone();
                let value = decode_value(member.require("value")?)?;
                map.insert(name, value);
            }
            Ok(Value::Object(map))
        }
        other => Err(protocol(format!("unsupported type <{}>", other))),
    }
}

/// Parses a `methodResponse`, turning a `<fault>` into [`RpcError::Fault`].
pub fn decode_response(xml: &str) -> Result<Value, RpcError> {
    let root = parse_tree(xml)?;
    let response = root.require("methodResponse")?;

    if let Some(fault) = response.child("fault") {
        let detail = decode_value(fault.require("value")?)?;
        let code = detail.get("faultCode").and_then(Value::as_i64).unwrap_or(0);
        let message = match detail.get("faultString") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "unknown fault".to_string(),
        };
        return Err(RpcError::Fault { code, message });
    }

    let param = response.require("params")?.require("param")?;
    decode_value(param.require("value")?)
}

/// Parses a `methodCall` into its method name and positional params.
pub fn decode_call(xml: &str) -> Result<(String, Vec<Value>), RpcError> {
    let root = parse_tree(xml)?;
    let call = root.require("methodCall")?;
    let method = call.require("methodName")?.text.trim().to_string();

    let params = match call.child("params") {
        Some(params) => params
            .children
            .iter()
            .filter(|c| c.name == "param")
            .map(|p| p.require("value").and_then(decode_value))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok((method, params))
}
