//! Minimal NumPy `.npy` reader and writer for dense 2-D matrices.
//!
//! Writes format version 1.0 with `<f4` little-endian C-order data. Reads
//! versions 1.x/2.x with `<f4` or `<f8` payloads, converting to `f32`.

use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

/// Write a matrix to `path` in `.npy` format.
pub fn write_matrix(path: impl AsRef<Path>, matrix: &Array2<f32>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, matrix).map_err(|e| Error::io(path, e))?;
    writer.flush().map_err(|e| Error::io(path, e))
}

fn write_to<W: Write>(writer: &mut W, matrix: &Array2<f32>) -> std::io::Result<()> {
    let (rows, cols) = matrix.dim();
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    // magic(6) + version(2) + header_len(2) + header + '\n' must be aligned
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_u16::<LittleEndian>(header.len() as u16)?;
    writer.write_all(header.as_bytes())?;

    for value in matrix.iter() {
        writer.write_f32::<LittleEndian>(*value)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Dtype {
    F32,
    F64,
}

/// Read a 2-D `.npy` matrix from `path`.
pub fn read_matrix(path: impl AsRef<Path>) -> Result<Array2<f32>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);
    read_from(&mut reader, path)
}

fn read_from<R: Read>(reader: &mut R, path: &Path) -> Result<Array2<f32>> {
    let invalid = |reason: &str| Error::Npy {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let io = |e: std::io::Error| Error::io(path, e);

    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic).map_err(io)?;
    if magic != MAGIC {
        return Err(invalid("bad magic string"));
    }

    let major = reader.read_u8().map_err(io)?;
    let _minor = reader.read_u8().map_err(io)?;
    let header_len = match major {
        1 => reader.read_u16::<LittleEndian>().map_err(io)? as usize,
        2 | 3 => reader.read_u32::<LittleEndian>().map_err(io)? as usize,
        _ => return Err(invalid("unsupported format version")),
    };

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header).map_err(io)?;
    let header = String::from_utf8(header).map_err(|_| invalid("header is not UTF-8"))?;
    let (dtype, rows, cols) = parse_header(&header).map_err(|reason| invalid(&reason))?;

    let len = rows
        .checked_mul(cols)
        .ok_or_else(|| invalid("shape overflows"))?;
    // Grows with the payload; the header alone does not size the buffer
    let mut data = Vec::new();
    match dtype {
        Dtype::F32 => {
            for _ in 0..len {
                data.push(reader.read_f32::<LittleEndian>().map_err(io)?);
            }
        }
        Dtype::F64 => {
            for _ in 0..len {
                data.push(reader.read_f64::<LittleEndian>().map_err(io)? as f32);
            }
        }
    }

    Array2::from_shape_vec((rows, cols), data).map_err(|e| invalid(&e.to_string()))
}

fn parse_header(header: &str) -> std::result::Result<(Dtype, usize, usize), String> {
    let dtype = if header.contains("'<f4'") {
        Dtype::F32
    } else if header.contains("'<f8'") {
        Dtype::F64
    } else {
        return Err(format!("unsupported dtype in header {header:?}"));
    };

    if header.contains("'fortran_order': True") {
        return Err("fortran-ordered arrays are not supported".to_string());
    }

    let start = header
        .find("'shape':")
        .and_then(|i| header[i..].find('(').map(|j| i + j + 1))
        .ok_or("missing shape")?;
    let end = header[start..]
        .find(')')
        .map(|j| start + j)
        .ok_or("unterminated shape")?;

    let dims: Vec<usize> = header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|e| format!("bad dimension {s:?}: {e}")))
        .collect::<std::result::Result<_, _>>()?;

    match dims.as_slice() {
        [rows, cols] => Ok((dtype, *rows, *cols)),
        [rows] => Ok((dtype, *rows, 1)),
        _ => Err(format!("expected a 2-D array, got shape {dims:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_header_is_aligned() {
        let mut buf = Vec::new();
        write_to(&mut buf, &array![[1.0f32, 2.0], [3.0, 4.0]]).unwrap();
        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        assert_eq!((10 + header_len) % HEADER_ALIGN, 0);
        assert_eq!(buf[10 + header_len - 1], b'\n');
        assert_eq!(buf.len(), 10 + header_len + 4 * 4);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.npy");
        let matrix = array![[0.5f32, -1.25, 3.0], [7.0, 0.0, -0.125]];
        write_matrix(&path, &matrix).unwrap();
        assert_eq!(read_matrix(&path).unwrap(), matrix);
    }

    #[test]
    fn test_reads_f64_payload() {
        let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (2, 1), }\n";
        let mut buf = MAGIC.to_vec();
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(&1.5f64.to_le_bytes());
        buf.extend_from_slice(&(-2.0f64).to_le_bytes());

        let matrix = read_from(&mut buf.as_slice(), Path::new("mem.npy")).unwrap();
        assert_eq!(matrix, array![[1.5f32], [-2.0]]);
    }

    #[test]
    fn test_rejects_bad_magic_and_dtype() {
        let err = read_from(&mut &b"NOTNPY...."[..], Path::new("x.npy")).unwrap_err();
        assert!(matches!(err, Error::Npy { .. }));

        assert!(parse_header("{'descr': '<i8', 'fortran_order': False, 'shape': (2, 2), }").is_err());
        assert!(parse_header("{'descr': '<f4', 'fortran_order': False, 'shape': (2, 2, 2), }").is_err());
    }

    #[test]
    fn test_rejects_overflowing_or_truncated_shape() {
        let mut buf = Vec::new();
        let header = "{'descr': '<f4', 'fortran_order': False, 'shape': (4611686018427387904, 8), }\n";
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&[1, 0]);
        buf.write_u16::<LittleEndian>(header.len() as u16).unwrap();
        buf.extend_from_slice(header.as_bytes());
        let err = read_from(&mut &buf[..], Path::new("huge.npy")).unwrap_err();
        assert!(matches!(err, Error::Npy { ref reason, .. } if reason.contains("overflow")));

        // A large but representable shape with no payload fails on read, not on allocation
        let mut buf = Vec::new();
        let header = "{'descr': '<f4', 'fortran_order': False, 'shape': (1000000000, 1000), }\n";
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&[1, 0]);
        buf.write_u16::<LittleEndian>(header.len() as u16).unwrap();
        buf.extend_from_slice(header.as_bytes());
        let err = read_from(&mut &buf[..], Path::new("short.npy")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
