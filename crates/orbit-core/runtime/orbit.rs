//! Cell runtime: rich display and input through the kernel sideband.
//!
//! Frames are a 4-byte little-endian length followed by a JSON object.

use std::fmt::Debug;
use std::io::{self, BufRead, Write};
use std::time::Duration;

/// Print a cell's trailing value; unit values print nothing.
pub fn show<T: Debug + ?Sized>(value: &T) {
    let text = format!("{value:?}");
    if text != "()" {
        println!("{text}");
    }
}

/// Display `payload` with the given MIME type.
pub fn display(mime_type: &str, payload: &str) {
    // Flush so earlier text lands before the display.
    let _ = io::stdout().flush();
    let frame = format!(
        "{{\"kind\":\"display\",\"mime_type\":{},\"payload\":{}}}",
        json_string(mime_type),
        json_string(payload)
    );
    if channel::send(&frame).is_err() {
        println!("{payload}");
    }
}

/// Display HTML.
pub fn display_html(html: &str) {
    display("text/html", html);
}

/// Display Markdown.
pub fn display_markdown(markdown: &str) {
    display("text/markdown", markdown);
}

/// Display plain text.
pub fn display_text(text: &str) {
    display("text/plain", text);
}

/// Display a PNG image.
pub fn display_png(png: &[u8]) {
    display("image/png", &base64(png));
}

/// Ask the user for a line of input.
pub fn input(prompt: &str) -> io::Result<String> {
    request_input(prompt, false)
}

/// Ask the user for a password; the reply is not echoed.
pub fn input_password(prompt: &str) -> io::Result<String> {
    request_input(prompt, true)
}

/// Check the kernel answers within `timeout`.
pub fn heartbeat(timeout: Duration) -> bool {
    channel::exchange("{\"kind\":\"heartbeat\",\"ack\":false}", Some(timeout))
        .map(|reply| reply.contains("\"ack\":true"))
        .unwrap_or(false)
}

fn request_input(prompt: &str, masked: bool) -> io::Result<String> {
    let _ = io::stdout().flush();
    let frame = format!(
        "{{\"kind\":\"input-request\",\"prompt\":{},\"masked\":{masked}}}",
        json_string(prompt)
    );
    if masked {
        let reply = channel::exchange(&frame, None)?;
        return reply_payload(&reply)
            .ok_or_else(|| io::Error::new(io::ErrorKind::PermissionDenied, "input not allowed"));
    }
    channel::send(&frame)?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input not allowed"));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

#[cfg(unix)]
mod channel {
    use std::io::{self, Read, Write};
    use std::os::unix::net::UnixStream;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    static STREAM: OnceLock<Option<Mutex<UnixStream>>> = OnceLock::new();

    fn stream() -> io::Result<&'static Mutex<UnixStream>> {
        STREAM
            .get_or_init(|| {
                let path = std::env::var_os("ORBIT_SIDEBAND")?;
                UnixStream::connect(path).ok().map(Mutex::new)
            })
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no orbit sideband"))
    }

    fn write_frame(stream: &mut UnixStream, json: &str) -> io::Result<()> {
        let len = u32::try_from(json.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
        stream.write_all(&len.to_le_bytes())?;
        stream.write_all(json.as_bytes())?;
        stream.flush()
    }

    pub fn send(json: &str) -> io::Result<()> {
        let mut stream = stream()?
            .lock()
            .map_err(|_| io::Error::other("sideband poisoned"))?;
        write_frame(&mut stream, json)
    }

    pub fn exchange(json: &str, timeout: Option<Duration>) -> io::Result<String> {
        let mut stream = stream()?
            .lock()
            .map_err(|_| io::Error::other("sideband poisoned"))?;
        write_frame(&mut stream, json)?;
        stream.set_read_timeout(timeout)?;
        let mut len = [0u8; 4];
        let read = stream.read_exact(&mut len).and_then(|_| {
            let mut body = vec![0u8; u32::from_le_bytes(len) as usize];
            stream.read_exact(&mut body)?;
            Ok(body)
        });
        stream.set_read_timeout(None)?;
        String::from_utf8(read?).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(not(unix))]
mod channel {
    use std::io;
    use std::time::Duration;

    pub fn send(_json: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "no orbit sideband"))
    }

    pub fn exchange(_json: &str, _timeout: Option<Duration>) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "no orbit sideband"))
    }
}

/// Encode a JSON string literal.
fn json_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// The `payload` string of an `input-reply` frame; `None` when refused.
fn reply_payload(frame: &str) -> Option<String> {
    let at = frame.find("\"payload\":")? + "\"payload\":".len();
    let mut chars = frame[at..].trim_start().chars();
    if chars.next()? != '"' {
        return None;
    }
    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'u' => {
                    let hex: String = chars.by_ref().take(4).collect();
                    out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?).unwrap_or('\u{fffd}'));
                }
                other => out.push(other),
            },
            c => out.push(c),
        }
    }
    None
}

fn base64(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let n = (chunk[0] as u32) << 16
            | (*chunk.get(1).unwrap_or(&0) as u32) << 8
            | *chunk.get(2).unwrap_or(&0) as u32;
        for (i, shift) in [18, 12, 6, 0].into_iter().enumerate() {
            if i <= chunk.len() {
                out.push(TABLE[(n >> shift & 63) as usize] as char);
            } else {
                out.push('=');
            }
        }
    }
    out
}
