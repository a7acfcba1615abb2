//! Display and Debug implementations for Value
//!
//! Rendering walks composites recursively and keeps the addresses of the
//! composites currently being printed; meeting one again prints `…`
//! instead of recursing forever.

use std::fmt::{self, Write};
use std::sync::Arc;

use super::*;
use crate::runtime::PromiseState;

/// Format a number the way programs see it: integral values without a
/// fractional part, IEEE specials as `Infinity` / `NaN`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn addr<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

struct Renderer {
    out: String,
    visiting: Vec<usize>,
}

impl Renderer {
    fn new() -> Self {
        Self {
            out: String::new(),
            visiting: Vec::new(),
        }
    }

    /// Render `value`; strings are quoted when `quoted` (inside composites).
    fn value(&mut self, value: &Value, quoted: bool) -> fmt::Result {
        match value {
            Value::Null => self.out.write_str("無"),
            Value::Bool(true) => self.out.write_str("真"),
            Value::Bool(false) => self.out.write_str("偽"),
            Value::Number(n) => self.out.write_str(&format_number(*n)),
            Value::String(s) if quoted => write!(self.out, "{:?}", s.as_ref()),
            Value::String(s) => self.out.write_str(s),

            Value::Array(items) => self.guarded(addr(items), |r| {
                r.out.write_char('[')?;
                for (i, item) in items.read().iter().enumerate() {
                    if i > 0 {
                        r.out.write_str(", ")?;
                    }
                    r.value(item, true)?;
                }
                r.out.write_char(']')
            }),

            Value::Map(map) => self.guarded(addr(map), |r| {
                r.out.write_char('{')?;
                for (i, (k, v)) in map.read().iter().enumerate() {
                    if i > 0 {
                        r.out.write_str(", ")?;
                    }
                    write!(r.out, "{}: ", k)?;
                    r.value(v, true)?;
                }
                r.out.write_char('}')
            }),

            Value::Instance(instance) => self.guarded(addr(instance), |r| {
                write!(r.out, "{} {{", instance.class.name)?;
                for (i, (k, v)) in instance.fields.read().iter().enumerate() {
                    if i > 0 {
                        r.out.write_str(", ")?;
                    }
                    write!(r.out, "{}: ", k)?;
                    r.value(v, true)?;
                }
                r.out.write_char('}')
            }),

            Value::Function(c) => write!(self.out, "<関数 {}>", c.name()),
            Value::Builtin(b) => write!(self.out, "<組み込み関数 {}>", b.name),
            Value::Native(n) => write!(self.out, "<ネイティブ関数 {}>", n.name),
            Value::Class(c) => write!(self.out, "<型 {}>", c.name),
            Value::BoundMethod(m) => match &m.method {
                Value::Function(c) => write!(self.out, "<メソッド {}>", c.name()),
                Value::Builtin(b) => write!(self.out, "<メソッド {}>", b.name),
                _ => self.out.write_str("<メソッド>"),
            },

            Value::Promise(p) => match p.state() {
                PromiseState::Pending => self.out.write_str("<Promise 待機中>"),
                PromiseState::Fulfilled(v) => {
                    self.out.write_str("<Promise 成功: ")?;
                    self.value(&v, true)?;
                    self.out.write_char('>')
                }
                PromiseState::Rejected(e) => write!(self.out, "<Promise 失敗: {}>", e),
            },
            Value::Channel(ch) => write!(self.out, "<チャネル 容量={}>", ch.capacity()),
            Value::Mutex(_) => self.out.write_str("<ミューテックス>"),
            Value::RwLock(_) => self.out.write_str("<読み書きロック>"),
            Value::Semaphore(s) => write!(self.out, "<セマフォ 残り={}>", s.available()),
            Value::Atomic(a) => write!(self.out, "<アトミック {}>", a.get()),
            Value::Thread(_) => self.out.write_str("<スレッド>"),
            Value::WaitGroup(w) => write!(self.out, "<待機グループ {}>", w.count()),
            Value::Error(e) => write!(self.out, "{}", e),
        }
    }

    fn guarded(
        &mut self,
        id: usize,
        render: impl FnOnce(&mut Self) -> fmt::Result,
    ) -> fmt::Result {
        if self.visiting.contains(&id) {
            return self.out.write_char('…');
        }
        self.visiting.push(id);
        let result = render(self);
        self.visiting.pop();
        result
    }
}

fn render(value: &Value, quoted: bool) -> String {
    let mut renderer = Renderer::new();
    // Writing into a String cannot fail
    let _ = renderer.value(value, quoted);
    renderer.out
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, true))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display is what `表示` prints, Debug quotes strings
        f.write_str(&render(self, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(3628800.0), "3628800");
    }

    #[test]
    fn test_display_composites() {
        let v = Value::array(vec![Value::Number(1.0), Value::string("a"), Value::Null]);
        assert_eq!(v.to_string(), "[1, \"a\", 無]");
        assert_eq!(Value::string("a").to_string(), "a");
        assert_eq!(format!("{:?}", Value::string("a")), "\"a\"");
    }

    #[test]
    fn test_display_cycle_prints_ellipsis() {
        let v = Value::array(vec![Value::Number(1.0)]);
        if let Value::Array(items) = &v {
            items.write().push(v.clone());
        }
        assert_eq!(v.to_string(), "[1, …]");
    }
}
