//! Object serialization for values that have no literal form.
//!
//! [`Pickle`] writes the host's standard object-serialization format. It
//! tries the human-readable text protocol (0) first and falls back to the
//! highest binary protocol (5) when a value cannot be written as text. Like
//! the host's optimizer, it keeps memo entries only for objects that are
//! referenced again, so an unshared value carries no memo at all.
//!
//! The matching [`Unpickler`] reads both protocols back into values.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use formcast_foundation::repr::float_repr;
use formcast_foundation::{Construction, Error, HostObject, Result, Value};
use thiserror::Error;

/// Text protocol.
pub const TEXT_PROTOCOL: u8 = 0;
/// Highest binary protocol.
pub const HIGHEST_PROTOCOL: u8 = 5;

/// Serialized bytes and the protocol that produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Serialized {
    /// The serialized stream.
    pub data: Vec<u8>,
    /// Protocol number.
    pub protocol: u8,
}

/// Turns values into bytes the host runtime can load back, and names the
/// host expression that does the loading.
pub trait ObjectSerializer {
    /// Serializes a value.
    ///
    /// # Errors
    /// Returns an error if no supported protocol can represent the value.
    fn serialize(&self, value: &Value) -> Result<Serialized>;

    /// Reads a value back.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid stream.
    fn deserialize(&self, data: &[u8]) -> Result<Value>;

    /// Host expression that, called with the bytes, rebuilds the value.
    fn loader(&self) -> &str;
}

/// The host's standard object-serialization format.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pickle;

impl ObjectSerializer for Pickle {
    fn serialize(&self, value: &Value) -> Result<Serialized> {
        match dumps(value, TEXT_PROTOCOL) {
            Ok(data) => Ok(Serialized {
                data,
                protocol: TEXT_PROTOCOL,
            }),
            Err(PicklingError::Unsupported { what, .. }) => {
                tracing::debug!(%what, "falling back to binary protocol");
                let data = dumps(value, HIGHEST_PROTOCOL)?;
                Ok(Serialized {
                    data,
                    protocol: HIGHEST_PROTOCOL,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn deserialize(&self, data: &[u8]) -> Result<Value> {
        Unpickler::new(data).load()
    }

    fn loader(&self) -> &str {
        "__import__('pickle').loads"
    }
}

/// Failure to write a value with a given protocol.
#[derive(Debug, Error)]
pub enum PicklingError {
    /// The protocol cannot express the value.
    #[error("cannot pickle {what} with protocol {protocol}")]
    Unsupported {
        /// Description of the value.
        what: String,
        /// The protocol that was attempted.
        protocol: u8,
    },
    /// The value nests too deeply (or refers to itself through a constructor).
    #[error("maximum recursion depth exceeded while pickling")]
    Recursion,
}

impl From<PicklingError> for Error {
    fn from(e: PicklingError) -> Self {
        Error::serialization(e.to_string())
    }
}

/// Serializes a value with one protocol, keeping only referenced memo entries.
///
/// # Errors
/// Returns [`PicklingError::Unsupported`] if the protocol cannot express the
/// value.
pub fn dumps(value: &Value, protocol: u8) -> std::result::Result<Vec<u8>, PicklingError> {
    let mut pickler = Pickler::new(protocol);
    pickler.save(value)?;
    pickler.emit(&[op::STOP]);
    Ok(pickler.finish())
}

// =============================================================================
// Opcodes
// =============================================================================

mod op {
    pub const MARK: u8 = b'(';
    pub const STOP: u8 = b'.';
    pub const POP: u8 = b'0';
    pub const POP_MARK: u8 = b'1';
    pub const DUP: u8 = b'2';
    pub const FLOAT: u8 = b'F';
    pub const INT: u8 = b'I';
    pub const BININT: u8 = b'J';
    pub const BININT1: u8 = b'K';
    pub const LONG: u8 = b'L';
    pub const BININT2: u8 = b'M';
    pub const NONE: u8 = b'N';
    pub const REDUCE: u8 = b'R';
    pub const UNICODE: u8 = b'V';
    pub const BINUNICODE: u8 = b'X';
    pub const APPEND: u8 = b'a';
    pub const GLOBAL: u8 = b'c';
    pub const DICT: u8 = b'd';
    pub const EMPTY_DICT: u8 = b'}';
    pub const APPENDS: u8 = b'e';
    pub const GET: u8 = b'g';
    pub const BINGET: u8 = b'h';
    pub const LONG_BINGET: u8 = b'j';
    pub const LIST: u8 = b'l';
    pub const EMPTY_LIST: u8 = b']';
    pub const PUT: u8 = b'p';
    pub const BINPUT: u8 = b'q';
    pub const LONG_BINPUT: u8 = b'r';
    pub const SETITEM: u8 = b's';
    pub const TUPLE: u8 = b't';
    pub const EMPTY_TUPLE: u8 = b')';
    pub const SETITEMS: u8 = b'u';
    pub const BINFLOAT: u8 = b'G';
    pub const BINBYTES: u8 = b'B';
    pub const SHORT_BINBYTES: u8 = b'C';

    pub const PROTO: u8 = 0x80;
    pub const NEWOBJ: u8 = 0x81;
    pub const TUPLE1: u8 = 0x85;
    pub const TUPLE2: u8 = 0x86;
    pub const TUPLE3: u8 = 0x87;
    pub const NEWTRUE: u8 = 0x88;
    pub const NEWFALSE: u8 = 0x89;
    pub const LONG1: u8 = 0x8a;
    pub const LONG4: u8 = 0x8b;
    pub const SHORT_BINUNICODE: u8 = 0x8c;
    pub const BINUNICODE8: u8 = 0x8d;
    pub const BINBYTES8: u8 = 0x8e;
    pub const EMPTY_SET: u8 = 0x8f;
    pub const ADDITEMS: u8 = 0x90;
    pub const FROZENSET: u8 = 0x91;
    pub const STACK_GLOBAL: u8 = 0x93;
    pub const MEMOIZE: u8 = 0x94;
    pub const FRAME: u8 = 0x95;
    pub const BYTEARRAY8: u8 = 0x96;
}

const BATCH_SIZE: usize = 1000;
const FRAME_SIZE_MIN: usize = 4;
const FRAME_SIZE_TARGET: usize = 64 * 1024;
const MAX_DEPTH: usize = 1000;

// =============================================================================
// Pickler
// =============================================================================

/// One emitted opcode, or a memo operation still to be renumbered.
enum Op {
    Data(Vec<u8>),
    Put(usize),
    Get(usize),
}

/// Identity of a memoizable object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum MemoKey {
    Object(usize),
    Global(String, String),
    Name(String),
}

struct Pickler {
    protocol: u8,
    memo: HashMap<MemoKey, usize>,
    ops: Vec<Op>,
    depth: usize,
}

type Saved = std::result::Result<(), PicklingError>;

impl Pickler {
    fn new(protocol: u8) -> Self {
        Self {
            protocol,
            memo: HashMap::new(),
            ops: Vec::new(),
            depth: 0,
        }
    }

    const fn binary(&self) -> bool {
        self.protocol >= 1
    }

    fn emit(&mut self, data: &[u8]) {
        self.ops.push(Op::Data(data.to_vec()));
    }

    fn emit_with(&mut self, opcode: u8, arg: &[u8]) {
        let mut data = Vec::with_capacity(arg.len() + 1);
        data.push(opcode);
        data.extend_from_slice(arg);
        self.ops.push(Op::Data(data));
    }

    fn emit_line(&mut self, opcode: u8, text: &str) {
        let mut data = Vec::with_capacity(text.len() + 2);
        data.push(opcode);
        data.extend_from_slice(text.as_bytes());
        data.push(b'\n');
        self.ops.push(Op::Data(data));
    }

    fn memoize(&mut self, key: MemoKey) {
        let idx = self.memo.len();
        self.memo.insert(key, idx);
        self.ops.push(Op::Put(idx));
    }

    /// Emits a memo reference if the object was already written.
    fn recall(&mut self, key: &MemoKey) -> bool {
        match self.memo.get(key) {
            Some(&idx) => {
                self.ops.push(Op::Get(idx));
                true
            }
            None => false,
        }
    }

    fn save(&mut self, value: &Value) -> Saved {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(PicklingError::Recursion);
        }
        let saved = self.save_value(value);
        self.depth -= 1;
        saved
    }

    fn save_value(&mut self, value: &Value) -> Saved {
        if let Some(key) = identity(value) {
            if self.recall(&key) {
                return Ok(());
            }
        }
        match value {
            Value::None => self.emit(&[op::NONE]),
            Value::Bool(b) => {
                if self.binary() {
                    self.emit(&[if *b { op::NEWTRUE } else { op::NEWFALSE }]);
                } else {
                    self.emit_line(op::INT, if *b { "01" } else { "00" });
                }
            }
            Value::Int(n) => self.save_int(*n),
            Value::Float(x) => {
                if self.binary() {
                    self.emit_with(op::BINFLOAT, &x.to_be_bytes());
                } else {
                    self.emit_line(op::FLOAT, &float_repr(*x));
                }
            }
            Value::Complex(c) => {
                self.save_global("builtins", "complex")?;
                self.save_tuple(&[Value::Float(c.re), Value::Float(c.im)])?;
                self.emit(&[op::REDUCE]);
            }
            Value::Str(s) => self.save_text(s),
            Value::Bytes(b) => self.save_bytes(b)?,
            Value::Tuple(items) => self.save_tuple(items)?,
            Value::List(cell) => {
                if self.binary() {
                    self.emit(&[op::EMPTY_LIST]);
                } else {
                    self.emit(&[op::MARK, op::LIST]);
                }
                self.memoize(MemoKey::Object(address(cell)));
                let items = cell.borrow().clone();
                self.save_appends(&items)?;
            }
            Value::Dict(cell) => {
                if self.binary() {
                    self.emit(&[op::EMPTY_DICT]);
                } else {
                    self.emit(&[op::MARK, op::DICT]);
                }
                self.memoize(MemoKey::Object(address(cell)));
                let entries = cell.borrow().clone();
                self.save_setitems(&entries)?;
            }
            Value::Set(items) => self.save_set(items)?,
            Value::Ellipsis => self.save_global("builtins", "Ellipsis")?,
            Value::Object(object) => self.save_object(object)?,
        }
        Ok(())
    }

    fn save_int(&mut self, n: i64) {
        if !self.binary() {
            if i32::try_from(n).is_ok() {
                self.emit_line(op::INT, &n.to_string());
            } else {
                self.emit_line(op::LONG, &format!("{n}L"));
            }
            return;
        }
        if let Ok(small) = u8::try_from(n) {
            self.emit_with(op::BININT1, &[small]);
        } else if let Ok(short) = u16::try_from(n) {
            self.emit_with(op::BININT2, &short.to_le_bytes());
        } else if let Ok(word) = i32::try_from(n) {
            self.emit_with(op::BININT, &word.to_le_bytes());
        } else {
            let encoded = encode_long(n);
            let mut arg = Vec::with_capacity(encoded.len() + 1);
            arg.push(u8::try_from(encoded.len()).unwrap_or(u8::MAX));
            arg.extend_from_slice(&encoded);
            self.emit_with(op::LONG1, &arg);
        }
    }

    fn save_text(&mut self, s: &str) {
        if !self.binary() {
            let mut data = vec![op::UNICODE];
            data.extend(raw_unicode_escape(s));
            data.push(b'\n');
            self.ops.push(Op::Data(data));
            return;
        }
        let encoded = s.as_bytes();
        self.save_sized(
            encoded,
            (op::SHORT_BINUNICODE, op::BINUNICODE, op::BINUNICODE8),
        );
    }

    /// Writes a length-prefixed payload with the smallest opcode that fits.
    fn save_sized(&mut self, payload: &[u8], (short, word, long): (u8, u8, u8)) {
        let n = payload.len();
        let mut data = Vec::with_capacity(n + 9);
        if let Ok(len) = u8::try_from(n) {
            data.push(short);
            data.push(len);
        } else if let Ok(len) = u32::try_from(n) {
            data.push(word);
            data.extend_from_slice(&len.to_le_bytes());
        } else {
            data.push(long);
            data.extend_from_slice(&(n as u64).to_le_bytes());
        }
        data.extend_from_slice(payload);
        self.ops.push(Op::Data(data));
    }

    /// Writes a module or attribute name, shared like an interned string.
    fn save_name(&mut self, name: &str) {
        let key = MemoKey::Name(name.to_string());
        if self.recall(&key) {
            return;
        }
        self.save_text(name);
        self.memoize(key);
    }

    fn save_bytes(&mut self, b: &[u8]) -> Saved {
        if self.binary() {
            self.save_sized(b, (op::SHORT_BINBYTES, op::BINBYTES, op::BINBYTES8));
            return Ok(());
        }
        if b.is_empty() {
            self.save_global("builtins", "bytes")?;
            self.save_tuple(&[])?;
        } else {
            self.save_global("_codecs", "encode")?;
            self.emit(&[op::MARK]);
            let latin1: String = b.iter().map(|&byte| char::from(byte)).collect();
            self.save_text(&latin1);
            self.save_name("latin1");
            self.emit(&[op::TUPLE]);
        }
        self.emit(&[op::REDUCE]);
        Ok(())
    }

    fn save_tuple(&mut self, items: &[Value]) -> Saved {
        if items.is_empty() {
            if self.binary() {
                self.emit(&[op::EMPTY_TUPLE]);
            } else {
                self.emit(&[op::MARK, op::TUPLE]);
            }
            return Ok(());
        }
        if self.binary() && items.len() <= 3 {
            for item in items {
                self.save(item)?;
            }
            let opcode = [op::TUPLE1, op::TUPLE2, op::TUPLE3][items.len() - 1];
            self.emit(&[opcode]);
            return Ok(());
        }
        self.emit(&[op::MARK]);
        for item in items {
            self.save(item)?;
        }
        self.emit(&[op::TUPLE]);
        Ok(())
    }

    fn save_appends(&mut self, items: &[Value]) -> Saved {
        if !self.binary() {
            for item in items {
                self.save(item)?;
                self.emit(&[op::APPEND]);
            }
            return Ok(());
        }
        for batch in items.chunks(BATCH_SIZE) {
            if let [only] = batch {
                self.save(only)?;
                self.emit(&[op::APPEND]);
            } else {
                self.emit(&[op::MARK]);
                for item in batch {
                    self.save(item)?;
                }
                self.emit(&[op::APPENDS]);
            }
        }
        Ok(())
    }

    fn save_setitems(&mut self, entries: &[(Value, Value)]) -> Saved {
        if !self.binary() {
            for (k, v) in entries {
                self.save(k)?;
                self.save(v)?;
                self.emit(&[op::SETITEM]);
            }
            return Ok(());
        }
        for batch in entries.chunks(BATCH_SIZE) {
            if let [(k, v)] = batch {
                self.save(k)?;
                self.save(v)?;
                self.emit(&[op::SETITEM]);
            } else {
                self.emit(&[op::MARK]);
                for (k, v) in batch {
                    self.save(k)?;
                    self.save(v)?;
                }
                self.emit(&[op::SETITEMS]);
            }
        }
        Ok(())
    }

    fn save_set(&mut self, items: &[Value]) -> Saved {
        if self.protocol < 4 {
            // Rebuilt as `set([...])`.
            self.save_global("builtins", "set")?;
            self.emit(&[op::MARK]);
            self.emit(&[op::MARK, op::LIST]);
            self.save_appends(items)?;
            self.emit(&[op::TUPLE]);
            self.emit(&[op::REDUCE]);
            return Ok(());
        }
        self.emit(&[op::EMPTY_SET]);
        for batch in items.chunks(BATCH_SIZE) {
            self.emit(&[op::MARK]);
            for item in batch {
                self.save(item)?;
            }
            self.emit(&[op::ADDITEMS]);
        }
        Ok(())
    }

    fn save_object(&mut self, object: &Rc<HostObject>) -> Saved {
        let opcode = match object.construction {
            Construction::Call => op::REDUCE,
            Construction::New if self.protocol >= 2 => op::NEWOBJ,
            Construction::New => {
                return Err(PicklingError::Unsupported {
                    what: format!("{} object", object.name),
                    protocol: self.protocol,
                });
            }
        };
        self.save_global(&object.module, &object.name)?;
        self.save_tuple(&object.args)?;
        self.emit(&[opcode]);
        self.memoize(MemoKey::Object(Rc::as_ptr(object).cast::<()>() as usize));
        Ok(())
    }

    fn save_global(&mut self, module: &str, name: &str) -> Saved {
        let key = MemoKey::Global(module.to_string(), name.to_string());
        if self.recall(&key) {
            return Ok(());
        }
        if self.protocol >= 4 {
            self.save_name(module);
            self.save_name(name);
            self.emit(&[op::STACK_GLOBAL]);
        } else if let Some((parent, last)) = name.rsplit_once('.') {
            // Nested names are fetched with `getattr(parent, last)`.
            self.save_global("builtins", "getattr")?;
            self.emit(&[op::MARK]);
            self.save_global(module, parent)?;
            self.save_text(last);
            self.emit(&[op::TUPLE]);
            self.emit(&[op::REDUCE]);
        } else {
            let module = if module == "builtins" {
                "__builtin__"
            } else {
                module
            };
            let mut data = vec![op::GLOBAL];
            data.extend_from_slice(module.as_bytes());
            data.push(b'\n');
            data.extend_from_slice(name.as_bytes());
            data.push(b'\n');
            self.ops.push(Op::Data(data));
        }
        self.memoize(key);
        Ok(())
    }

    /// Drops memo entries nobody reads, renumbers the rest, and frames the
    /// binary protocols.
    fn finish(self) -> Vec<u8> {
        let read: HashSet<usize> = self
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Get(idx) => Some(*idx),
                _ => None,
            })
            .collect();
        let mut renumbered: HashMap<usize, usize> = HashMap::new();
        let mut body: Vec<Vec<u8>> = Vec::with_capacity(self.ops.len());
        for op in self.ops {
            match op {
                Op::Data(data) => body.push(data),
                Op::Put(idx) if read.contains(&idx) => {
                    let new = renumbered.len();
                    renumbered.insert(idx, new);
                    body.push(put_op(self.protocol, new));
                }
                Op::Put(_) => {}
                Op::Get(idx) => {
                    let new = renumbered.get(&idx).copied().unwrap_or(idx);
                    body.push(get_op(self.protocol, new));
                }
            }
        }

        if self.protocol < 4 {
            let mut out = Vec::new();
            if self.protocol >= 2 {
                out.extend_from_slice(&[op::PROTO, self.protocol]);
            }
            for data in body {
                out.extend(data);
            }
            return out;
        }

        let mut out = vec![op::PROTO, self.protocol];
        let mut frame = Vec::new();
        for data in body {
            let frameless = data.len() > FRAME_SIZE_TARGET;
            if !frame.is_empty() && (frameless || frame.len() >= FRAME_SIZE_TARGET) {
                commit_frame(&mut out, &mut frame);
            }
            if frameless {
                out.extend(data);
            } else {
                frame.extend(data);
            }
        }
        commit_frame(&mut out, &mut frame);
        out
    }
}

fn commit_frame(out: &mut Vec<u8>, frame: &mut Vec<u8>) {
    if frame.len() >= FRAME_SIZE_MIN {
        out.push(op::FRAME);
        out.extend_from_slice(&(frame.len() as u64).to_le_bytes());
    }
    out.append(frame);
}

fn put_op(protocol: u8, idx: usize) -> Vec<u8> {
    if protocol >= 4 {
        vec![op::MEMOIZE]
    } else if protocol >= 1 {
        match u8::try_from(idx) {
            Ok(small) => vec![op::BINPUT, small],
            Err(_) => long_index(op::LONG_BINPUT, idx),
        }
    } else {
        format!("p{idx}\n").into_bytes()
    }
}

fn get_op(protocol: u8, idx: usize) -> Vec<u8> {
    if protocol >= 1 {
        match u8::try_from(idx) {
            Ok(small) => vec![op::BINGET, small],
            Err(_) => long_index(op::LONG_BINGET, idx),
        }
    } else {
        format!("g{idx}\n").into_bytes()
    }
}

fn long_index(opcode: u8, idx: usize) -> Vec<u8> {
    let mut data = vec![opcode];
    data.extend_from_slice(&u32::try_from(idx).unwrap_or(u32::MAX).to_le_bytes());
    data
}

fn address<T>(cell: &Rc<T>) -> usize {
    Rc::as_ptr(cell).cast::<()>() as usize
}

fn identity(value: &Value) -> Option<MemoKey> {
    match value {
        Value::List(cell) => Some(MemoKey::Object(address(cell))),
        Value::Dict(cell) => Some(MemoKey::Object(address(cell))),
        Value::Object(object) => Some(MemoKey::Object(address(object))),
        Value::Ellipsis => Some(MemoKey::Global("builtins".into(), "Ellipsis".into())),
        _ => None,
    }
}

/// Minimal little-endian two's-complement bytes of an integer.
fn encode_long(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let bits = 64 - n.unsigned_abs().leading_zeros() as usize;
    let len = (bits >> 3) + 1;
    let mut bytes = i128::from(n).to_le_bytes()[..len].to_vec();
    if n < 0 && len > 1 && bytes[len - 1] == 0xff && bytes[len - 2] & 0x80 != 0 {
        bytes.pop();
    }
    bytes
}

fn decode_long(bytes: &[u8]) -> Result<i64> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 8 {
        return Err(Error::serialization("integer out of range"));
    }
    let fill = if bytes[bytes.len() - 1] & 0x80 == 0 { 0 } else { 0xff };
    let mut buf = [fill; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(i64::from_le_bytes(buf))
}

/// Text-protocol string body: Latin-1 bytes with `\uXXXX` escapes, and the
/// characters that would end the line escaped as well.
fn raw_unicode_escape(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        let code = u32::from(c);
        match c {
            '\\' | '\0' | '\n' | '\r' | '\u{1a}' => {
                out.extend_from_slice(format!("\\u{code:04x}").as_bytes());
            }
            _ => match u8::try_from(code) {
                Ok(byte) => out.push(byte),
                Err(_) if code <= 0xffff => {
                    out.extend_from_slice(format!("\\u{code:04x}").as_bytes());
                }
                Err(_) => out.extend_from_slice(format!("\\U{code:08x}").as_bytes()),
            },
        }
    }
    out
}

fn raw_unicode_unescape(bytes: &[u8]) -> Result<String> {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let width = match (bytes[i], bytes.get(i + 1)) {
            (b'\\', Some(b'u')) => 4,
            (b'\\', Some(b'U')) => 8,
            (byte, _) => {
                out.push(char::from(byte));
                i += 1;
                continue;
            }
        };
        let digits = bytes
            .get(i + 2..i + 2 + width)
            .and_then(|d| std::str::from_utf8(d).ok())
            .ok_or_else(|| Error::serialization("truncated \\u escape"))?;
        let c = u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| Error::serialization(format!("invalid escape \\u{digits}")))?;
        out.push(c);
        i += 2 + width;
    }
    Ok(out)
}

// =============================================================================
// Unpickler
// =============================================================================

/// A stack entry while loading.
#[derive(Clone, Debug)]
enum Item {
    Value(Value),
    Global(String, String),
    /// A tuple that holds something other than plain values.
    Args(Vec<Item>),
}

impl Item {
    fn into_value(self) -> Result<Value> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Global(module, name) if module == "builtins" && name == "Ellipsis" => {
                Ok(Value::Ellipsis)
            }
            Self::Global(module, name) => Err(Error::serialization(format!(
                "cannot load bare reference to {module}.{name}"
            ))),
            Self::Args(items) => Ok(Value::Tuple(
                items
                    .into_iter()
                    .map(Self::into_value)
                    .collect::<Result<_>>()?,
            )),
        }
    }
}

/// Reads a serialized stream back into a value.
pub struct Unpickler<'a> {
    data: &'a [u8],
    pos: usize,
    stack: Vec<Item>,
    metastack: Vec<Vec<Item>>,
    memo: HashMap<usize, Item>,
}

impl<'a> Unpickler<'a> {
    /// Creates an unpickler over a stream.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            stack: Vec::new(),
            metastack: Vec::new(),
            memo: HashMap::new(),
        }
    }

    /// Loads the value.
    ///
    /// # Errors
    /// Returns an error on malformed input or unsupported opcodes.
    pub fn load(mut self) -> Result<Value> {
        loop {
            let opcode = self.read_byte()?;
            match opcode {
                op::STOP => return self.pop()?.into_value(),
                op::MARK => {
                    let stack = std::mem::take(&mut self.stack);
                    self.metastack.push(stack);
                }
                op::POP => {
                    self.pop()?;
                }
                op::POP_MARK => {
                    self.pop_mark()?;
                }
                op::DUP => {
                    let top = self.top()?.clone();
                    self.stack.push(top);
                }
                op::PROTO => {
                    let protocol = self.read_byte()?;
                    if protocol > HIGHEST_PROTOCOL {
                        return Err(Error::serialization(format!(
                            "unsupported protocol: {protocol}"
                        )));
                    }
                }
                op::FRAME => {
                    self.read(8)?;
                }
                op::NONE => self.push(Value::None),
                op::NEWTRUE => self.push(Value::Bool(true)),
                op::NEWFALSE => self.push(Value::Bool(false)),
                op::INT => {
                    let line = self.read_line()?;
                    let value = match line.as_str() {
                        "01" => Value::Bool(true),
                        "00" => Value::Bool(false),
                        text => Value::Int(parse_int(text)?),
                    };
                    self.push(value);
                }
                op::LONG => {
                    let line = self.read_line()?;
                    let n = parse_int(line.trim_end_matches('L'))?;
                    self.push(Value::Int(n));
                }
                op::BININT1 => {
                    let n = self.read_byte()?;
                    self.push(Value::Int(i64::from(n)));
                }
                op::BININT2 => {
                    let n = u16::from_le_bytes(self.read_array()?);
                    self.push(Value::Int(i64::from(n)));
                }
                op::BININT => {
                    let n = i32::from_le_bytes(self.read_array()?);
                    self.push(Value::Int(i64::from(n)));
                }
                op::LONG1 => {
                    let len = usize::from(self.read_byte()?);
                    let n = decode_long(self.read(len)?)?;
                    self.push(Value::Int(n));
                }
                op::LONG4 => {
                    let len = self.read_u32_len()?;
                    let n = decode_long(self.read(len)?)?;
                    self.push(Value::Int(n));
                }
                op::FLOAT => {
                    let line = self.read_line()?;
                    let x = line
                        .parse::<f64>()
                        .map_err(|_| Error::serialization(format!("invalid float: {line}")))?;
                    self.push(Value::Float(x));
                }
                op::BINFLOAT => {
                    let x = f64::from_be_bytes(self.read_array()?);
                    self.push(Value::Float(x));
                }
                op::UNICODE => {
                    let raw = self.read_raw_line()?;
                    let s = raw_unicode_unescape(raw)?;
                    self.push(Value::Str(s));
                }
                op::SHORT_BINUNICODE => {
                    let len = usize::from(self.read_byte()?);
                    self.push_text(len)?;
                }
                op::BINUNICODE => {
                    let len = self.read_u32_len()?;
                    self.push_text(len)?;
                }
                op::BINUNICODE8 => {
                    let len = self.read_u64_len()?;
                    self.push_text(len)?;
                }
                op::SHORT_BINBYTES => {
                    let len = usize::from(self.read_byte()?);
                    let bytes = self.read(len)?.to_vec();
                    self.push(Value::Bytes(bytes));
                }
                op::BINBYTES => {
                    let len = self.read_u32_len()?;
                    let bytes = self.read(len)?.to_vec();
                    self.push(Value::Bytes(bytes));
                }
                op::BINBYTES8 | op::BYTEARRAY8 => {
                    let len = self.read_u64_len()?;
                    let bytes = self.read(len)?.to_vec();
                    self.push(Value::Bytes(bytes));
                }
                op::EMPTY_TUPLE => self.push(Value::Tuple(Vec::new())),
                op::TUPLE => {
                    let items = self.pop_mark()?;
                    self.stack.push(tuple(items));
                }
                op::TUPLE1 | op::TUPLE2 | op::TUPLE3 => {
                    let n = usize::from(opcode - op::TUPLE1) + 1;
                    if self.stack.len() < n {
                        return Err(Error::serialization("stack underflow"));
                    }
                    let items = self.stack.split_off(self.stack.len() - n);
                    self.stack.push(tuple(items));
                }
                op::EMPTY_LIST => self.push(Value::list(Vec::new())),
                op::LIST => {
                    let items = into_values(self.pop_mark()?)?;
                    self.push(Value::list(items));
                }
                op::APPEND => {
                    let item = self.pop()?.into_value()?;
                    self.top_list()?.borrow_mut().push(item);
                }
                op::APPENDS => {
                    let items = into_values(self.pop_mark()?)?;
                    self.top_list()?.borrow_mut().extend(items);
                }
                op::EMPTY_DICT => self.push(Value::dict(Vec::new())),
                op::DICT => {
                    let items = into_values(self.pop_mark()?)?;
                    let dict = Value::dict(Vec::new());
                    if let Value::Dict(cell) = &dict {
                        set_items(cell, items)?;
                    }
                    self.push(dict);
                }
                op::SETITEM => {
                    let value = self.pop()?.into_value()?;
                    let key = self.pop()?.into_value()?;
                    let cell = self.top_dict()?;
                    set_items(&cell, vec![key, value])?;
                }
                op::SETITEMS => {
                    let items = into_values(self.pop_mark()?)?;
                    let cell = self.top_dict()?;
                    set_items(&cell, items)?;
                }
                op::EMPTY_SET => self.push(Value::Set(Vec::new())),
                op::ADDITEMS => {
                    let items = into_values(self.pop_mark()?)?;
                    match self.stack.last_mut() {
                        Some(Item::Value(Value::Set(set))) => {
                            for item in items {
                                if !set.contains(&item) {
                                    set.push(item);
                                }
                            }
                        }
                        _ => return Err(Error::serialization("ADDITEMS target is not a set")),
                    }
                }
                op::FROZENSET => {
                    let items = into_values(self.pop_mark()?)?;
                    self.push(Value::set(items));
                }
                op::GLOBAL => {
                    let module = self.read_line()?;
                    let name = self.read_line()?;
                    self.stack.push(Item::Global(modern_module(module), name));
                }
                op::STACK_GLOBAL => {
                    let name = self.pop_text()?;
                    let module = self.pop_text()?;
                    self.stack.push(Item::Global(module, name));
                }
                op::REDUCE => {
                    let args = self.pop()?;
                    let func = self.pop()?;
                    let result = reduce(func, args)?;
                    self.stack.push(result);
                }
                op::NEWOBJ => {
                    let args = into_values(args_of(self.pop()?)?)?;
                    let Item::Global(module, name) = self.pop()? else {
                        return Err(Error::serialization("NEWOBJ class is not a global"));
                    };
                    let object =
                        HostObject::new(module, name, args).with_construction(Construction::New);
                    self.push(Value::object(object));
                }
                op::PUT => {
                    let idx = parse_index(&self.read_line()?)?;
                    self.memo.insert(idx, self.top()?.clone());
                }
                op::BINPUT => {
                    let idx = usize::from(self.read_byte()?);
                    self.memo.insert(idx, self.top()?.clone());
                }
                op::LONG_BINPUT => {
                    let idx = self.read_u32_len()?;
                    self.memo.insert(idx, self.top()?.clone());
                }
                op::MEMOIZE => {
                    let idx = self.memo.len();
                    self.memo.insert(idx, self.top()?.clone());
                }
                op::GET => {
                    let idx = parse_index(&self.read_line()?)?;
                    self.push_memo(idx)?;
                }
                op::BINGET => {
                    let idx = usize::from(self.read_byte()?);
                    self.push_memo(idx)?;
                }
                op::LONG_BINGET => {
                    let idx = self.read_u32_len()?;
                    self.push_memo(idx)?;
                }
                other => {
                    return Err(Error::serialization(format!(
                        "unsupported opcode {other:#04x} at offset {}",
                        self.pos - 1
                    )));
                }
            }
        }
    }

    fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        let data = self.data;
        let bytes = data
            .get(self.pos..self.pos + n)
            .ok_or_else(|| Error::serialization("unexpected end of stream"))?;
        self.pos += n;
        Ok(bytes)
    }

    fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0; N];
        buf.copy_from_slice(self.read(N)?);
        Ok(buf)
    }

    fn read_u32_len(&mut self) -> Result<usize> {
        let n = u32::from_le_bytes(self.read_array()?);
        usize::try_from(n).map_err(|_| Error::serialization("length out of range"))
    }

    fn read_u64_len(&mut self) -> Result<usize> {
        let n = u64::from_le_bytes(self.read_array()?);
        usize::try_from(n).map_err(|_| Error::serialization("length out of range"))
    }

    fn read_raw_line(&mut self) -> Result<&'a [u8]> {
        let data = self.data;
        let rest = data
            .get(self.pos..)
            .ok_or_else(|| Error::serialization("unexpected end of stream"))?;
        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| Error::serialization("unterminated line"))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    fn read_line(&mut self) -> Result<String> {
        let raw = self.read_raw_line()?;
        String::from_utf8(raw.to_vec()).map_err(|e| Error::serialization(e.to_string()))
    }

    fn push(&mut self, value: Value) {
        self.stack.push(Item::Value(value));
    }

    fn push_text(&mut self, len: usize) -> Result<()> {
        let bytes = self.read(len)?;
        let s = std::str::from_utf8(bytes).map_err(|e| Error::serialization(e.to_string()))?;
        self.push(Value::str(s));
        Ok(())
    }

    fn push_memo(&mut self, idx: usize) -> Result<()> {
        let item = self
            .memo
            .get(&idx)
            .cloned()
            .ok_or_else(|| Error::serialization(format!("memo key {idx} not found")))?;
        self.stack.push(item);
        Ok(())
    }

    fn pop(&mut self) -> Result<Item> {
        self.stack
            .pop()
            .ok_or_else(|| Error::serialization("stack underflow"))
    }

    fn pop_text(&mut self) -> Result<String> {
        match self.pop()? {
            Item::Value(Value::Str(s)) => Ok(s),
            _ => Err(Error::serialization("STACK_GLOBAL requires text")),
        }
    }

    fn pop_mark(&mut self) -> Result<Vec<Item>> {
        let outer = self
            .metastack
            .pop()
            .ok_or_else(|| Error::serialization("could not find MARK"))?;
        Ok(std::mem::replace(&mut self.stack, outer))
    }

    fn top(&self) -> Result<&Item> {
        self.stack
            .last()
            .ok_or_else(|| Error::serialization("stack underflow"))
    }

    fn top_list(&self) -> Result<formcast_foundation::List> {
        match self.top()? {
            Item::Value(Value::List(cell)) => Ok(Rc::clone(cell)),
            _ => Err(Error::serialization("APPEND target is not a list")),
        }
    }

    fn top_dict(&self) -> Result<formcast_foundation::Dict> {
        match self.top()? {
            Item::Value(Value::Dict(cell)) => Ok(Rc::clone(cell)),
            _ => Err(Error::serialization("SETITEM target is not a dict")),
        }
    }
}

fn parse_int(text: &str) -> Result<i64> {
    text.parse()
        .map_err(|_| Error::serialization(format!("invalid integer: {text}")))
}

fn parse_index(text: &str) -> Result<usize> {
    text.parse()
        .map_err(|_| Error::serialization(format!("invalid memo index: {text}")))
}

fn modern_module(module: String) -> String {
    match module.as_str() {
        "__builtin__" => "builtins".to_string(),
        "copy_reg" => "copyreg".to_string(),
        _ => module,
    }
}

fn tuple(items: Vec<Item>) -> Item {
    if items.iter().all(|item| matches!(item, Item::Value(_))) {
        let values = items
            .into_iter()
            .filter_map(|item| match item {
                Item::Value(v) => Some(v),
                _ => None,
            })
            .collect();
        Item::Value(Value::Tuple(values))
    } else {
        Item::Args(items)
    }
}

fn into_values(items: Vec<Item>) -> Result<Vec<Value>> {
    items.into_iter().map(Item::into_value).collect()
}

fn args_of(item: Item) -> Result<Vec<Item>> {
    match item {
        Item::Value(Value::Tuple(values)) => Ok(values.into_iter().map(Item::Value).collect()),
        Item::Args(items) => Ok(items),
        _ => Err(Error::serialization("arguments are not a tuple")),
    }
}

fn set_items(cell: &formcast_foundation::Dict, items: Vec<Value>) -> Result<()> {
    if items.len() % 2 != 0 {
        return Err(Error::serialization("odd number of dict items"));
    }
    let mut entries = cell.borrow_mut();
    let mut items = items.into_iter();
    while let (Some(key), Some(value)) = (items.next(), items.next()) {
        if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            entries.push((key, value));
        }
    }
    Ok(())
}

/// Applies a loaded global to its arguments.
fn reduce(func: Item, args: Item) -> Result<Item> {
    let Item::Global(module, name) = func else {
        return Err(Error::serialization("REDUCE target is not a global"));
    };
    let args = args_of(args)?;
    if module == "builtins" && name == "getattr" {
        if let [Item::Global(m, parent), Item::Value(Value::Str(last))] = args.as_slice() {
            return Ok(Item::Global(m.clone(), format!("{parent}.{last}")));
        }
    }
    let args = into_values(args)?;
    let value = match (module.as_str(), name.as_str(), args.as_slice()) {
        ("builtins", "complex", [re, im]) => match (re, im) {
            (Value::Float(re), Value::Float(im)) => Value::complex(*re, *im),
            _ => Value::object(HostObject::new(module, name, args)),
        },
        ("builtins", "set" | "frozenset", []) => Value::Set(Vec::new()),
        ("builtins", "set" | "frozenset", [Value::List(items)]) => {
            let items = items.borrow().clone();
            Value::set(items)
        }
        ("builtins", "set" | "frozenset", [Value::Tuple(items)]) => Value::set(items.clone()),
        ("builtins", "bytes", []) => Value::Bytes(Vec::new()),
        ("_codecs", "encode", [Value::Str(text), Value::Str(encoding)])
            if encoding == "latin1" || encoding == "latin-1" =>
        {
            let bytes = text
                .chars()
                .map(|c| u8::try_from(u32::from(c)))
                .collect::<std::result::Result<Vec<u8>, _>>()
                .map_err(|_| Error::serialization("text is not Latin-1"))?;
            Value::Bytes(bytes)
        }
        _ => Value::object(HostObject::new(module, name, args)),
    };
    Ok(Item::Value(value))
}
