//! XML-RPC wire format: `methodCall` encoding and `methodResponse` decoding.

use crate::error::{ConnectionError, Fault};
use crate::types::Value;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDateTime;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::BTreeMap;

/// Wire format of `dateTime.iso8601` values.
const ISO8601_FORMAT: &str = "%Y%m%dT%H:%M:%S";

/// Alternate `dateTime.iso8601` spellings accepted when decoding.
const ISO8601_ALTERNATES: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y%m%dT%H%M%S"];

fn protocol_err(err: impl std::fmt::Display) -> ConnectionError {
    ConnectionError::Protocol(err.to_string())
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> Result<String, ConnectionError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(protocol_err)?;
    open(&mut writer, "methodCall")?;
    text_element(&mut writer, "methodName", method)?;
    open(&mut writer, "params")?;
    for param in params {
        open(&mut writer, "param")?;
        write_value(&mut writer, param)?;
        close(&mut writer, "param")?;
    }
    close(&mut writer, "params")?;
    close(&mut writer, "methodCall")?;

    String::from_utf8(writer.into_inner()).map_err(protocol_err)
}

fn open(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), ConnectionError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(protocol_err)
}

fn close(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), ConnectionError> {
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(protocol_err)
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), ConnectionError> {
    open(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(protocol_err)?;
    close(writer, name)
}

fn write_value(writer: &mut Writer<Vec<u8>>, value: &Value) -> Result<(), ConnectionError> {
    open(writer, "value")?;
    match value {
        Value::Nil => writer
            .write_event(Event::Empty(BytesStart::new("nil")))
            .map_err(protocol_err)?,
        Value::Bool(b) => text_element(writer, "boolean", if *b { "1" } else { "0" })?,
        Value::Int(i) => {
            let tag = if i32::try_from(*i).is_ok() { "int" } else { "i8" };
            text_element(writer, tag, &i.to_string())?
        }
        Value::Double(d) => text_element(writer, "double", &d.to_string())?,
        Value::String(s) => text_element(writer, "string", s)?,
        Value::DateTime(dt) => text_element(writer, "dateTime.iso8601", &dt.format(ISO8601_FORMAT).to_string())?,
        Value::Base64(bytes) => text_element(writer, "base64", &STANDARD.encode(bytes))?,
        Value::Array(items) => {
            open(writer, "array")?;
            open(writer, "data")?;
            for item in items {
                write_value(writer, item)?;
            }
            close(writer, "data")?;
            close(writer, "array")?;
        }
        Value::Struct(members) => {
            open(writer, "struct")?;
            for (name, member) in members {
                open(writer, "member")?;
                text_element(writer, "name", name)?;
                write_value(writer, member)?;
                close(writer, "member")?;
            }
            close(writer, "struct")?;
        }
    }
    close(writer, "value")
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a `methodResponse` document.
///
/// A `<fault>` response becomes [`ConnectionError::Fault`].
pub fn decode_response(xml: &str) -> Result<Value, ConnectionError> {
    let mut parser = Parser::new(xml);
    parser.expect_start("methodResponse")?;

    match parser.next()? {
        Event::Start(e) if e.name().as_ref() == b"params" => {
            parser.expect_start("param")?;
            parser.expect_start("value")?;
            let value = parser.parse_value()?;
            parser.expect_end("param")?;
            parser.expect_end("params")?;
            parser.expect_end("methodResponse")?;
            Ok(value)
        }
        Event::Start(e) if e.name().as_ref() == b"fault" => {
            parser.expect_start("value")?;
            let value = parser.parse_value()?;
            parser.expect_end("fault")?;
            Err(ConnectionError::Fault(fault_from_value(&value)?))
        }
        other => Err(protocol_err(format!("unexpected content in methodResponse: {:?}", other))),
    }
}

fn fault_from_value(value: &Value) -> Result<Fault, ConnectionError> {
    let members = value
        .as_struct()
        .ok_or_else(|| protocol_err("fault is not a struct"))?;
    let code = match members.get("faultCode") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => return Err(protocol_err("fault without faultCode")),
    };
    let message = match members.get("faultString") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Ok(Fault { code, message })
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> Parser<'a> {
    fn new(xml: &'a str) -> Self {
        Self {
            reader: Reader::from_str(xml),
        }
    }

    /// Next event, skipping prolog, comments and whitespace between elements.
    fn next(&mut self) -> Result<Event<'a>, ConnectionError> {
        loop {
            match self.next_raw()? {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
                Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => continue,
                event => return Ok(event),
            }
        }
    }

    fn next_raw(&mut self) -> Result<Event<'a>, ConnectionError> {
        match self.reader.read_event().map_err(protocol_err)? {
            Event::Eof => Err(protocol_err("unexpected end of document")),
            event => Ok(event),
        }
    }

    fn expect_start(&mut self, name: &str) -> Result<(), ConnectionError> {
        match self.next()? {
            Event::Start(e) if e.name().as_ref() == name.as_bytes() => Ok(()),
            other => Err(protocol_err(format!("expected <{}>, found {:?}", name, other))),
        }
    }

    fn expect_end(&mut self, name: &str) -> Result<(), ConnectionError> {
        match self.next()? {
            Event::End(e) if e.name().as_ref() == name.as_bytes() => Ok(()),
            other => Err(protocol_err(format!("expected </{}>, found {:?}", name, other))),
        }
    }

    /// Collect character data up to the closing `name` tag.
    fn read_text(&mut self, name: &[u8]) -> Result<String, ConnectionError> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                Event::Text(t) => text.push_str(&t.unescape().map_err(protocol_err)?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::Comment(_) => continue,
                Event::End(e) if e.name().as_ref() == name => return Ok(text),
                other => {
                    return Err(protocol_err(format!(
                        "unexpected {:?} inside <{}>",
                        other,
                        String::from_utf8_lossy(name)
                    )));
                }
            }
        }
    }

    /// Parse the content of a `<value>` whose start tag was already consumed.
    fn parse_value(&mut self) -> Result<Value, ConnectionError> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                Event::Text(t) => text.push_str(&t.unescape().map_err(protocol_err)?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::Comment(_) => continue,
                // untyped value: plain string
                Event::End(e) if e.name().as_ref() == b"value" => return Ok(Value::String(text)),
                Event::Start(e) => {
                    let value = self.parse_typed(e.name().as_ref())?;
                    self.expect_end("value")?;
                    return Ok(value);
                }
                Event::Empty(e) => {
                    let value = match e.name().as_ref() {
                        b"nil" => Value::Nil,
                        b"string" => Value::String(String::new()),
                        b"array" => Value::Array(Vec::new()),
                        b"struct" => Value::Struct(BTreeMap::new()),
                        b"base64" => Value::Base64(Vec::new()),
                        other => {
                            return Err(protocol_err(format!(
                                "empty <{}/> is not a value",
                                String::from_utf8_lossy(other)
                            )));
                        }
                    };
                    self.expect_end("value")?;
                    return Ok(value);
                }
                other => return Err(protocol_err(format!("unexpected {:?} inside <value>", other))),
            }
        }
    }

    fn parse_typed(&mut self, tag: &[u8]) -> Result<Value, ConnectionError> {
        match tag {
            b"int" | b"i4" | b"i8" => {
                let text = self.read_text(tag)?;
                text.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| protocol_err(format!("invalid integer '{}'", text)))
            }
            b"boolean" => match self.read_text(tag)?.trim() {
                "1" | "true" => Ok(Value::Bool(true)),
                "0" | "false" => Ok(Value::Bool(false)),
                other => Err(protocol_err(format!("invalid boolean '{}'", other))),
            },
            b"double" => {
                let text = self.read_text(tag)?;
                text.trim()
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| protocol_err(format!("invalid double '{}'", text)))
            }
            b"string" => self.read_text(tag).map(Value::String),
            b"dateTime.iso8601" => {
                let text = self.read_text(tag)?;
                parse_iso8601(text.trim())
                    .map(Value::DateTime)
                    .ok_or_else(|| protocol_err(format!("invalid dateTime '{}'", text)))
            }
            b"base64" => {
                let text = self.read_text(tag)?;
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD.decode(compact).map(Value::Base64).map_err(protocol_err)
            }
            b"nil" => {
                self.read_text(tag)?;
                Ok(Value::Nil)
            }
            b"array" => self.parse_array(),
            b"struct" => self.parse_struct(),
            other => Err(protocol_err(format!("unknown value type <{}>", String::from_utf8_lossy(other)))),
        }
    }

    fn parse_array(&mut self) -> Result<Value, ConnectionError> {
        let mut items = Vec::new();
        match self.next()? {
            Event::Empty(e) if e.name().as_ref() == b"data" => {}
            Event::Start(e) if e.name().as_ref() == b"data" => loop {
                match self.next()? {
                    Event::Start(e) if e.name().as_ref() == b"value" => items.push(self.parse_value()?),
                    Event::Empty(e) if e.name().as_ref() == b"value" => items.push(Value::String(String::new())),
                    Event::End(e) if e.name().as_ref() == b"data" => break,
                    other => return Err(protocol_err(format!("unexpected {:?} inside <data>", other))),
                }
            },
            other => return Err(protocol_err(format!("expected <data>, found {:?}", other))),
        }
        self.expect_end("array")?;
        Ok(Value::Array(items))
    }

    fn parse_struct(&mut self) -> Result<Value, ConnectionError> {
        let mut members = BTreeMap::new();
        loop {
            match self.next()? {
                Event::Start(e) if e.name().as_ref() == b"member" => {
                    self.expect_start("name")?;
                    let name = self.read_text(b"name")?;
                    let value = match self.next()? {
                        Event::Start(e) if e.name().as_ref() == b"value" => self.parse_value()?,
                        Event::Empty(e) if e.name().as_ref() == b"value" => Value::String(String::new()),
                        other => return Err(protocol_err(format!("expected member <value>, found {:?}", other))),
                    };
                    self.expect_end("member")?;
                    members.insert(name, value);
                }
                Event::End(e) if e.name().as_ref() == b"struct" => return Ok(Value::Struct(members)),
                other => return Err(protocol_err(format!("unexpected {:?} inside <struct>", other))),
            }
        }
    }
}

fn parse_iso8601(text: &str) -> Option<NaiveDateTime> {
    std::iter::once(ISO8601_FORMAT)
        .chain(ISO8601_ALTERNATES)
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}
