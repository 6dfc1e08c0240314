//! Serial text representation of an [`LduMatrix`]
//!
//! Format: three switch words `hasLower hasDiag hasUpper` followed by the
//! allocated arrays in lower, diag, upper order. Each array is written as a
//! counted list `N(v0 v1 ... vN-1)`; on input a uniform list `N{v}` is also
//! accepted. Unallocated arrays contribute nothing, so a symmetric matrix
//! only carries its upper coefficients.
//!
//! ```text
//! false true true 3(4 4 4) 2(-1 -1)
//! ```

use super::LduMatrix;
use crate::addressing::LduAddressing;
use crate::error::{LduError, Result};
use crate::traits::Scalar;
use ndarray::Array1;
use std::fmt::{self, Write as _};
use std::io::{Read, Write};
use std::sync::Arc;

fn switch_word(on: bool) -> &'static str {
    if on { "true" } else { "false" }
}

fn write_list<T: Scalar>(f: &mut impl fmt::Write, values: &Array1<T>) -> fmt::Result {
    write!(f, "{}(", values.len())?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_char(' ')?;
        }
        write!(f, "{v}")?;
    }
    f.write_char(')')
}

impl<T: Scalar> fmt::Display for LduMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            switch_word(self.has_lower()),
            switch_word(self.has_diag()),
            switch_word(self.has_upper())
        )?;
        for array in [&self.lower, &self.diag, &self.upper].into_iter().flatten() {
            f.write_char(' ')?;
            write_list(f, array)?;
        }
        Ok(())
    }
}

impl<T: Scalar> LduMatrix<T> {
    /// Write the serial representation to `writer`
    pub fn write_stream(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writeln!(writer, "{self}")
    }

    /// Read a matrix written by [`write_stream`](Self::write_stream) against `addressing`
    pub fn read_stream(addressing: Arc<LduAddressing>, reader: &mut impl Read) -> Result<Self> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| LduError::Stream {
                reason: e.to_string(),
            })?;
        Self::from_stream(addressing, &text)
    }

    /// Parse the serial representation against `addressing`
    pub fn from_stream(addressing: Arc<LduAddressing>, text: &str) -> Result<Self> {
        let mut tokens = Tokenizer::new(text);
        let has_lower = tokens.switch()?;
        let has_diag = tokens.switch()?;
        let has_upper = tokens.switch()?;

        let (n_cells, n_faces) = (addressing.size(), addressing.n_faces());
        let mut matrix = Self::new(addressing);
        if has_lower {
            let lower = tokens.list("lower", n_faces)?;
            matrix.set_lower(lower)?;
        }
        if has_diag {
            let diag = tokens.list("diag", n_cells)?;
            matrix.set_diag(diag)?;
        }
        if has_upper {
            let upper = tokens.list("upper", n_faces)?;
            matrix.set_upper(upper)?;
        }
        tokens.expect_end()?;
        Ok(matrix)
    }
}

struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> LduError {
        LduError::Stream {
            reason: format!("{} (at byte {})", reason.into(), self.pos),
        }
    }

    fn skip_ws(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.text[self.pos..].chars().next()
    }

    fn expect_char(&mut self, c: char) -> Result<()> {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    /// Next run of characters up to whitespace or a list delimiter
    fn word(&mut self) -> Result<&'a str> {
        self.skip_ws();
        let rest = &self.text[self.pos..];
        let len = rest
            .find(|c: char| c.is_whitespace() || "(){}".contains(c))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("unexpected end of stream"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn switch(&mut self) -> Result<bool> {
        match self.word()? {
            "true" | "on" | "yes" | "y" | "1" => Ok(true),
            "false" | "off" | "no" | "n" | "none" | "0" => Ok(false),
            other => Err(self.error(format!("bad switch value '{other}'"))),
        }
    }

    fn number<T: Scalar>(&mut self) -> Result<T> {
        let word = self.word()?;
        word.parse::<f64>()
            .map(T::from_f64_lossy)
            .map_err(|_| self.error(format!("bad number '{word}'")))
    }

    /// Counted list of `expected` values; the count is checked before reading
    fn list<T: Scalar>(&mut self, what: &str, expected: usize) -> Result<Array1<T>> {
        let word = self.word()?;
        let n: usize = word
            .parse()
            .map_err(|_| self.error(format!("bad list size '{word}'")))?;
        if n != expected {
            return Err(LduError::SizeMismatch {
                what: format!("{what} list"),
                expected,
                got: n,
            });
        }

        match self.peek() {
            Some('{') => {
                self.expect_char('{')?;
                let v = self.number()?;
                self.expect_char('}')?;
                Ok(Array1::from_elem(n, v))
            }
            _ => {
                self.expect_char('(')?;
                let mut values = Vec::with_capacity(n);
                for _ in 0..n {
                    values.push(self.number()?);
                }
                self.expect_char(')')?;
                Ok(Array1::from_vec(values))
            }
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error("trailing data")),
        }
    }
}
