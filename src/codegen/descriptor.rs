//! Field and method descriptor helpers

/// Operand-stack slots taken by a value of the given field descriptor.
pub fn field_slots(descriptor: &str) -> Option<u16> {
    match descriptor.as_bytes().first()? {
        b'J' | b'D' => Some(2),
        b'V' => Some(0),
        b'B' | b'C' | b'F' | b'I' | b'S' | b'Z' | b'L' | b'[' => Some(1),
        _ => None,
    }
}

/// Argument and return slots of a method descriptor such as `(IJ)Ljava/lang/String;`.
pub fn method_slots(descriptor: &str) -> Option<(u16, u16)> {
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return None;
    }
    let mut args = 0u16;
    let mut i = 1;
    loop {
        match *bytes.get(i)? {
            b')' => break,
            b'J' | b'D' => {
                args += 2;
                i += 1;
            }
            b'B' | b'C' | b'F' | b'I' | b'S' | b'Z' => {
                args += 1;
                i += 1;
            }
            b'L' => {
                args += 1;
                i = skip_class_name(bytes, i)?;
            }
            b'[' => {
                args += 1;
                while *bytes.get(i)? == b'[' {
                    i += 1;
                }
                if bytes[i] == b'L' {
                    i = skip_class_name(bytes, i)?;
                } else {
                    i += 1;
                }
            }
            _ => return None,
        }
    }
    let ret = return_descriptor(descriptor)?;
    Some((args, field_slots(ret)?))
}

fn skip_class_name(bytes: &[u8], start: usize) -> Option<usize> {
    let end = bytes[start..].iter().position(|b| *b == b';')?;
    Some(start + end + 1)
}

/// The part of a method descriptor after `)`.
pub fn return_descriptor(descriptor: &str) -> Option<&str> {
    let close = descriptor.rfind(')')?;
    let ret = &descriptor[close + 1..];
    if ret.is_empty() {
        None
    } else {
        Some(ret)
    }
}
