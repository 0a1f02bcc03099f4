/// Pop the first complete line out of `buf`, if any.
///
/// The `\n` terminator and an optional preceding `\r` are stripped; invalid
/// UTF-8 is replaced rather than rejected so a noisy line cannot wedge the
/// reader. Bytes after the terminator stay in `buf`.
pub fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buf.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}
