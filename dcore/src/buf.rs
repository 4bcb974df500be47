use std::io::{Read, Write};

/// Fill `buf` from `data`, returning `(eof, bytes read)`.
pub fn fill_buf<R: Read>(data: &mut R, buf: &mut [u8]) -> std::io::Result<(bool, usize)> {
    let mut buf_read = 0;

    while buf_read < buf.len() {
        match data.read(&mut buf[buf_read..]) {
            Ok(0) => return Ok((true, buf_read)),
            Ok(x) => buf_read += x,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => (),
            Err(e) => return Err(e),
        };
    }
    Ok((false, buf_read))
}

/// Copy everything from `reader` into `writer` in `block` sized pieces,
/// reporting the fraction of `total` copied after every piece.
pub fn copy_with_progress<R: Read, W: Write, F: FnMut(f32)>(
    reader: &mut R,
    writer: &mut W,
    block: usize,
    total: u64,
    mut progress: F,
) -> std::io::Result<u64> {
    let mut in_buf = vec![0u8; block.max(1)];
    let mut copied: u64 = 0;

    loop {
        let (eof, len) = fill_buf(reader, &mut in_buf)?;
        writer.write_all(&in_buf[..len])?;
        copied += len as u64;

        if total > 0 {
            progress(copied as f32 / total as f32);
        }
        if eof {
            break;
        }
    }
    writer.flush()?;

    Ok(copied)
}

#[cfg(test)]
mod test_fill_buf {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn big_buf_small_vec() {
        let mut in_buf: Cursor<Vec<u8>> = Cursor::new(vec![1, 2]);
        let mut buf: [u8; 4] = [0; 4];

        assert_eq!(fill_buf(&mut in_buf, &mut buf).unwrap(), (true, 2));
        assert_eq!(&buf, &[1, 2, 0, 0]);
    }

    #[test]
    fn small_buf_big_vec() {
        let mut in_buf: Cursor<Vec<u8>> = Cursor::new(vec![1, 2, 3, 4]);
        let mut buf: [u8; 2] = [0; 2];

        assert_eq!(fill_buf(&mut in_buf, &mut buf).unwrap(), (false, 2));
        assert_eq!(&buf, &[1, 2]);
    }

    #[test]
    fn same_buf_same_vec() {
        let mut in_buf: Cursor<Vec<u8>> = Cursor::new(vec![1, 2, 3, 4]);
        let mut buf: [u8; 4] = [0; 4];

        assert_eq!(fill_buf(&mut in_buf, &mut buf).unwrap(), (false, 4));
        assert_eq!(&buf, &[1, 2, 3, 4]);
    }
}
