//! Byte-level incremental JSON scanner
//!
//! `ByteScanner` pulls fixed-size chunks from an `AsyncRead` and exposes
//! byte-at-a-time consumption with absolute offsets. `DocumentScanner`
//! layers JSON structure on top: walk the keys of the root object, skip or
//! capture whole values, and iterate the elements of one array value at a
//! time. Captured values are complete JSON texts, handed to `serde_json`
//! for materialization.

use tokio::io::{AsyncRead, AsyncReadExt};

use super::ParseError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Chunked reader with absolute byte offsets.
pub(crate) struct ByteScanner<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
    consumed: u64,
    eof: bool,
}

impl<R: AsyncRead + Unpin> ByteScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0u8; CHUNK_SIZE],
            pos: 0,
            len: 0,
            consumed: 0,
            eof: false,
        }
    }

    /// Absolute offset of the next unconsumed byte.
    pub fn offset(&self) -> u64 {
        self.consumed + self.pos as u64
    }

    async fn fill(&mut self) -> Result<(), ParseError> {
        if self.pos < self.len || self.eof {
            return Ok(());
        }
        self.consumed += self.len as u64;
        self.pos = 0;
        self.len = 0;
        loop {
            match self.reader.read(&mut self.buf).await {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.len = n;
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(ParseError::Io {
                        offset: self.offset(),
                        source,
                    })
                }
            }
        }
    }

    pub async fn peek(&mut self) -> Result<Option<u8>, ParseError> {
        self.fill().await?;
        Ok((self.pos < self.len).then(|| self.buf[self.pos]))
    }

    pub async fn next_byte(&mut self) -> Result<Option<u8>, ParseError> {
        self.fill().await?;
        if self.pos < self.len {
            let b = self.buf[self.pos];
            self.pos += 1;
            Ok(Some(b))
        } else {
            Ok(None)
        }
    }

    pub async fn skip_whitespace(&mut self) -> Result<(), ParseError> {
        while let Some(b) = self.peek().await? {
            if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(())
    }

    pub async fn expect(&mut self, expected: u8) -> Result<(), ParseError> {
        match self.next_byte().await? {
            Some(b) if b == expected => Ok(()),
            Some(b) => Err(ParseError::unexpected(b, self.offset() - 1)),
            None => Err(ParseError::UnexpectedEof {
                offset: self.offset(),
            }),
        }
    }

    /// Consume a string with the cursor on the opening quote.
    pub async fn consume_string(
        &mut self,
        mut capture: Option<&mut Vec<u8>>,
    ) -> Result<(), ParseError> {
        self.expect(b'"').await?;
        if let Some(out) = capture.as_deref_mut() {
            out.push(b'"');
        }
        self.finish_string(capture).await
    }

    /// Consume the remainder of a string whose opening quote is already
    /// consumed. Escapes only matter for finding the closing quote; the
    /// captured text is decoded later by serde_json.
    async fn finish_string(&mut self, mut capture: Option<&mut Vec<u8>>) -> Result<(), ParseError> {
        let mut escaped = false;
        loop {
            let b = self.next_byte().await?.ok_or(ParseError::UnexpectedEof {
                offset: self.offset(),
            })?;
            if let Some(out) = capture.as_deref_mut() {
                out.push(b);
            }
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                return Ok(());
            }
        }
    }

    /// Consume one complete JSON value of any kind.
    pub async fn consume_value(
        &mut self,
        mut capture: Option<&mut Vec<u8>>,
    ) -> Result<(), ParseError> {
        self.skip_whitespace().await?;
        match self.peek().await? {
            None => Err(ParseError::UnexpectedEof {
                offset: self.offset(),
            }),
            Some(b'"') => self.consume_string(capture).await,
            Some(b'{') | Some(b'[') => {
                let mut depth = 0usize;
                loop {
                    let b = self.next_byte().await?.ok_or(ParseError::UnexpectedEof {
                        offset: self.offset(),
                    })?;
                    if let Some(out) = capture.as_deref_mut() {
                        out.push(b);
                    }
                    match b {
                        b'"' => self.finish_string(capture.as_deref_mut()).await?,
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(());
                            }
                        }
                        _ => {}
                    }
                }
            }
            Some(_) => {
                // number, true, false, null
                loop {
                    match self.peek().await? {
                        None => return Ok(()),
                        Some(b)
                            if b == b','
                                || b == b']'
                                || b == b'}'
                                || b == b' '
                                || b == b'\t'
                                || b == b'\n'
                                || b == b'\r' =>
                        {
                            return Ok(())
                        }
                        Some(b) => {
                            if let Some(out) = capture.as_deref_mut() {
                                out.push(b);
                            }
                            self.pos += 1;
                        }
                    }
                }
            }
        }
    }
}

/// Structural scanner over a root JSON object.
pub struct DocumentScanner<R> {
    bytes: ByteScanner<R>,
    first_entry: bool,
    first_element: bool,
}

impl<R: AsyncRead + Unpin> DocumentScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            bytes: ByteScanner::new(reader),
            first_entry: true,
            first_element: true,
        }
    }

    /// Absolute offset of the next unconsumed byte.
    pub fn offset(&self) -> u64 {
        self.bytes.offset()
    }

    /// Consume the opening brace of the root object.
    pub async fn begin_document(&mut self) -> Result<(), ParseError> {
        self.bytes.skip_whitespace().await?;
        self.bytes.expect(b'{').await?;
        self.first_entry = true;
        Ok(())
    }

    /// Advance to the next key of the root object; `None` at the closing
    /// brace. Leaves the cursor on the first byte of the key's value.
    pub async fn next_key(&mut self) -> Result<Option<String>, ParseError> {
        self.bytes.skip_whitespace().await?;
        match self.bytes.peek().await? {
            Some(b'}') => {
                self.bytes.next_byte().await?;
                return Ok(None);
            }
            Some(b',') if !self.first_entry => {
                self.bytes.next_byte().await?;
                self.bytes.skip_whitespace().await?;
            }
            Some(b'"') if self.first_entry => {}
            Some(b) => return Err(ParseError::unexpected(b, self.offset())),
            None => {
                return Err(ParseError::UnexpectedEof {
                    offset: self.offset(),
                })
            }
        }
        self.first_entry = false;

        let key_offset = self.offset();
        let mut raw = Vec::with_capacity(32);
        self.bytes.consume_string(Some(&mut raw)).await?;
        let key: String = super::parse_slice(&raw, key_offset)?;

        self.bytes.skip_whitespace().await?;
        self.bytes.expect(b':').await?;
        self.bytes.skip_whitespace().await?;
        Ok(Some(key))
    }

    /// Skip the value of the current key.
    pub async fn skip_value(&mut self) -> Result<(), ParseError> {
        self.bytes.consume_value(None).await
    }

    /// Capture the complete JSON text of the current key's value.
    pub async fn capture_value(&mut self) -> Result<Vec<u8>, ParseError> {
        let mut out = Vec::with_capacity(64);
        self.bytes.consume_value(Some(&mut out)).await?;
        Ok(out)
    }

    /// Enter the array value of the current key.
    pub async fn begin_array(&mut self) -> Result<(), ParseError> {
        self.bytes.skip_whitespace().await?;
        self.bytes.expect(b'[').await?;
        self.first_element = true;
        Ok(())
    }

    /// Capture the next element of the active array; `None` at the closing
    /// bracket, after which root-object key iteration may resume.
    pub async fn next_element(&mut self) -> Result<Option<Vec<u8>>, ParseError> {
        self.bytes.skip_whitespace().await?;
        match self.bytes.peek().await? {
            Some(b']') => {
                self.bytes.next_byte().await?;
                return Ok(None);
            }
            Some(b',') if !self.first_element => {
                self.bytes.next_byte().await?;
            }
            Some(_) if self.first_element => {}
            Some(b) => return Err(ParseError::unexpected(b, self.offset())),
            None => {
                return Err(ParseError::UnexpectedEof {
                    offset: self.offset(),
                })
            }
        }
        self.first_element = false;

        let mut out = Vec::with_capacity(256);
        self.bytes.consume_value(Some(&mut out)).await?;
        Ok(Some(out))
    }
}
